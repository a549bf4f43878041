pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{PasswordResetRequest, User};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug)]
pub enum StoreError {
    DuplicateEmail,
    NotFound,
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::DuplicateEmail => write!(f, "email is already registered"),
            StoreError::NotFound => write!(f, "record not found"),
            StoreError::Backend(msg) => write!(f, "store backend error: {msg}"),
        }
    }
}

/// Fields for a store-level user insert. Role and approval are decided by the
/// caller; signup goes through `create_signup_user` instead so the bootstrap
/// decision stays atomic.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub is_approved: bool,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

/// Persistence capability injected into the app state. The store is the sole
/// arbiter of email uniqueness and of the first-user bootstrap decision.
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError>;

    /// Create a user as part of signup. The count check and the insert are a
    /// single serialized decision point: at most one concurrent caller ever
    /// gets `true` (bootstrap admin) back.
    async fn create_signup_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<(User, bool), StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_by_name(&self, name: &str) -> Result<Vec<User>, StoreError>;

    async fn count_users(&self) -> Result<i64, StoreError>;

    async fn update_user(&self, id: Uuid, patch: UserPatch) -> Result<User, StoreError>;

    /// Mark a user approved with the given role.
    async fn set_approved(&self, id: Uuid, role: &str) -> Result<User, StoreError>;

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError>;

    async fn delete_by_id(&self, id: Uuid) -> Result<User, StoreError>;

    async fn delete_by_email(&self, email: &str) -> Result<User, StoreError>;

    async fn create_reset(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<PasswordResetRequest, StoreError>;

    /// Look up a live, unexpired reset request matching the user and token.
    async fn find_valid_reset(
        &self,
        user_id: Uuid,
        token: &str,
    ) -> Result<Option<PasswordResetRequest>, StoreError>;

    async fn delete_reset(&self, id: Uuid) -> Result<(), StoreError>;
}
