use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::user::{ROLE_ADMIN, ROLE_PENDING};
use crate::models::{PasswordResetRequest, User};
use crate::store::{NewUser, Store, StoreError, UserPatch};

/// In-memory store with the same semantics as the Postgres backend.
/// Used as the injected test double; a single mutex stands in for the
/// database's uniqueness constraints and the bootstrap advisory lock.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    resets: HashMap<Uuid, PasswordResetRequest>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Inner {
    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|u| u.email == email && Some(u.id) != except)
    }

    fn insert_user(
        &mut self,
        name: &str,
        email: &str,
        password_hash: &str,
        role: &str,
        is_approved: bool,
    ) -> Result<User, StoreError> {
        if self.email_taken(email, None) {
            return Err(StoreError::DuplicateEmail);
        }
        let user = User {
            id: Uuid::now_v7(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            role: role.to_string(),
            is_approved,
            created_at: Utc::now(),
        };
        self.users.insert(user.id, user.clone());
        Ok(user)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.insert_user(
            &new_user.name,
            &new_user.email,
            &new_user.password_hash,
            &new_user.role,
            new_user.is_approved,
        )
    }

    async fn create_signup_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<(User, bool), StoreError> {
        // Count check and insert happen under one lock, so only a single
        // concurrent signup can observe an empty store.
        let mut inner = self.inner.lock().unwrap();
        let is_first = inner.users.is_empty();
        let (role, is_approved) = if is_first {
            (ROLE_ADMIN, true)
        } else {
            (ROLE_PENDING, false)
        };
        let user = inner.insert_user(name, email, password_hash, role, is_approved)?;
        Ok((user, is_first))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.get(&id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Vec<User>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut users: Vec<User> = inner
            .users
            .values()
            .filter(|u| u.name == name)
            .cloned()
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn count_users(&self) -> Result<i64, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.len() as i64)
    }

    async fn update_user(&self, id: Uuid, patch: UserPatch) -> Result<User, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        // Existence first, then the collision check, matching the order the
        // Postgres backend reports these errors in.
        if !inner.users.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        if let Some(email) = &patch.email {
            if inner.email_taken(email, Some(id)) {
                return Err(StoreError::DuplicateEmail);
            }
        }
        let user = inner.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        if let Some(name) = patch.name {
            user.name = name;
        }
        if let Some(email) = patch.email {
            user.email = email;
        }
        if let Some(password_hash) = patch.password_hash {
            user.password_hash = password_hash;
        }
        Ok(user.clone())
    }

    async fn set_approved(&self, id: Uuid, role: &str) -> Result<User, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let user = inner.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.is_approved = true;
        user.role = role.to_string();
        Ok(user.clone())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let user = inner.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<User, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let user = inner.users.remove(&id).ok_or(StoreError::NotFound)?;
        inner.resets.retain(|_, r| r.user_id != user.id);
        Ok(user)
    }

    async fn delete_by_email(&self, email: &str) -> Result<User, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner
            .users
            .values()
            .find(|u| u.email == email)
            .map(|u| u.id)
            .ok_or(StoreError::NotFound)?;
        let user = inner.users.remove(&id).ok_or(StoreError::NotFound)?;
        inner.resets.retain(|_, r| r.user_id != user.id);
        Ok(user)
    }

    async fn create_reset(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<PasswordResetRequest, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.users.contains_key(&user_id) {
            return Err(StoreError::NotFound);
        }
        let reset = PasswordResetRequest {
            id: Uuid::now_v7(),
            user_id,
            token: token.to_string(),
            expires_at,
            created_at: Utc::now(),
        };
        inner.resets.insert(reset.id, reset.clone());
        Ok(reset)
    }

    async fn find_valid_reset(
        &self,
        user_id: Uuid,
        token: &str,
    ) -> Result<Option<PasswordResetRequest>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .resets
            .values()
            .find(|r| r.user_id == user_id && r.token == token && r.expires_at > Utc::now())
            .cloned())
    }

    async fn delete_reset(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.resets.remove(&id);
        Ok(())
    }
}
