use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::user::{ROLE_ADMIN, ROLE_PENDING};
use crate::models::{PasswordResetRequest, User};
use crate::store::{NewUser, Store, StoreError, UserPatch};

/// Postgres-backed store. Email uniqueness rides on the UNIQUE constraint;
/// the bootstrap decision is serialized with an advisory transaction lock.
pub struct PgStore {
    pool: PgPool,
}

const BOOTSTRAP_LOCK_KEY: i64 = 1;

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_sqlx(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        // 23505 = unique_violation
        if db_err.code().as_deref() == Some("23505") {
            return StoreError::DuplicateEmail;
        }
    }
    StoreError::Backend(err.to_string())
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (name, email, password_hash, role, is_approved)
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(&new_user.name)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(&new_user.role)
        .bind(new_user.is_approved)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)
    }

    async fn create_signup_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<(User, bool), StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        // Advisory lock prevents two concurrent first signups from both
        // becoming the bootstrap admin.
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(BOOTSTRAP_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx)?;

        let is_first = count == 0;
        let (role, is_approved) = if is_first {
            (ROLE_ADMIN, true)
        } else {
            (ROLE_PENDING, false)
        };

        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (name, email, password_hash, role, is_approved)
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .bind(is_approved)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        tx.commit().await.map_err(map_sqlx)?;

        Ok((user, is_first))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)
    }

    async fn find_by_name(&self, name: &str) -> Result<Vec<User>, StoreError> {
        sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE name = $1 ORDER BY created_at DESC",
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)
    }

    async fn count_users(&self) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(count)
    }

    async fn update_user(&self, id: Uuid, patch: UserPatch) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET
                 name = COALESCE($2, name),
                 email = COALESCE($3, email),
                 password_hash = COALESCE($4, password_hash)
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(patch.name)
        .bind(patch.email)
        .bind(patch.password_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?
        .ok_or(StoreError::NotFound)
    }

    async fn set_approved(&self, id: Uuid, role: &str) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET is_approved = true, role = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(role)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?
        .ok_or(StoreError::NotFound)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>("DELETE FROM users WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?
            .ok_or(StoreError::NotFound)
    }

    async fn delete_by_email(&self, email: &str) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>("DELETE FROM users WHERE email = $1 RETURNING *")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?
            .ok_or(StoreError::NotFound)
    }

    async fn create_reset(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<PasswordResetRequest, StoreError> {
        sqlx::query_as::<_, PasswordResetRequest>(
            "INSERT INTO password_reset_requests (user_id, token, expires_at)
             VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)
    }

    async fn find_valid_reset(
        &self,
        user_id: Uuid,
        token: &str,
    ) -> Result<Option<PasswordResetRequest>, StoreError> {
        sqlx::query_as::<_, PasswordResetRequest>(
            "SELECT * FROM password_reset_requests
             WHERE user_id = $1 AND token = $2 AND expires_at > now()",
        )
        .bind(user_id)
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)
    }

    async fn delete_reset(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM password_reset_requests WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }
}
