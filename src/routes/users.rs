use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::auth::password;
use crate::error::AppError;
use crate::models::UserView;
use crate::models::user::{ROLE_ADMIN, ROLE_USER};
use crate::state::SharedState;
use crate::store::{NewUser, StoreError, UserPatch};
use crate::validate;

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct ApproveRequest {
    pub role: Option<String>,
}

#[derive(Deserialize)]
pub struct GetUsersQuery {
    pub name: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
pub struct DeleteUserRequest {
    pub id: Option<Uuid>,
    pub email: Option<String>,
}

#[derive(Serialize)]
pub struct UserDataResponse {
    pub message: String,
    pub data: UserView,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListResponse {
    pub message: String,
    pub total_users: i64,
    pub data: Vec<UserView>,
}

#[derive(Serialize)]
pub struct DeletedUserResponse {
    pub message: String,
    pub user: UserView,
}

/// Admin pre-creates an account. Unlike signup, the user count is never
/// consulted: the new user is always an unapproved `user`.
pub async fn create(
    State(state): State<SharedState>,
    auth: AuthUser,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserDataResponse>), AppError> {
    auth.require_admin()?;

    let (name, email, password) = match (req.name, req.email, req.password) {
        (Some(name), Some(email), Some(password)) => (name, email, password),
        _ => {
            return Err(AppError::Validation(vec![
                "Name, email, and password are required".to_string(),
            ]));
        }
    };

    let email = validate::normalize_email(&email);
    validate::validate_new_user(&name, &email, &password)?;

    if state.store.find_by_email(&email).await?.is_some() {
        return Err(AppError::DuplicateEmail);
    }

    let password_hash = password::hash(&password).await.map_err(AppError::Internal)?;

    let user = state
        .store
        .create_user(NewUser {
            name,
            email,
            password_hash,
            role: ROLE_USER.to_string(),
            is_approved: false,
        })
        .await?;

    tracing::info!(user_id = %user.id, created_by = %auth.user_id, "admin created user");

    Ok((
        StatusCode::CREATED,
        Json(UserDataResponse {
            message: "User created successfully".to_string(),
            data: user.into(),
        }),
    ))
}

/// Approve a pending user, optionally assigning a role (defaults to `user`).
/// Approval is one-way; nothing ever returns a user to pending.
pub async fn approve(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
    Json(req): Json<ApproveRequest>,
) -> Result<Json<UserDataResponse>, AppError> {
    auth.require_admin()?;

    let role = match req.role.as_deref() {
        None => ROLE_USER,
        Some(ROLE_USER) => ROLE_USER,
        Some(ROLE_ADMIN) => ROLE_ADMIN,
        Some(other) => {
            return Err(AppError::Validation(vec![format!(
                "Invalid role '{other}': must be 'admin' or 'user'"
            )]));
        }
    };

    let user = state
        .store
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if user.is_approved {
        return Err(AppError::AlreadyApproved);
    }

    let user = state.store.set_approved(user_id, role).await?;

    tracing::info!(user_id = %user.id, role = %user.role, approved_by = %auth.user_id, "user approved");

    Ok(Json(UserDataResponse {
        message: "User approved successfully".to_string(),
        data: user.into(),
    }))
}

pub async fn get(
    State(state): State<SharedState>,
    Query(query): Query<GetUsersQuery>,
) -> Result<Json<UserListResponse>, AppError> {
    let name = match query.name {
        Some(name) if !name.trim().is_empty() => name,
        _ => {
            return Err(AppError::Validation(vec![
                "Query parameter 'name' is required".to_string(),
            ]));
        }
    };

    let users = state.store.find_by_name(&name).await?;
    if users.is_empty() {
        return Err(AppError::NotFound(
            "No users found with the specified username".to_string(),
        ));
    }

    let total_users = state.store.count_users().await?;

    Ok(Json(UserListResponse {
        message: "Users fetched successfully".to_string(),
        total_users,
        data: users.iter().map(UserView::from).collect(),
    }))
}

pub async fn update(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<UserDataResponse>, AppError> {
    let mut issues = Vec::new();
    if let Some(name) = &req.name {
        validate::check_name(name, &mut issues);
    }
    if let Some(email) = &req.email {
        validate::check_email(email, &mut issues);
    }
    if let Some(password) = &req.password {
        validate::check_password(password, &mut issues);
    }
    if !issues.is_empty() {
        return Err(AppError::Validation(issues));
    }

    let email = req.email.as_deref().map(validate::normalize_email);
    if let Some(email) = &email {
        if let Some(existing) = state.store.find_by_email(email).await? {
            if existing.id != id {
                return Err(AppError::DuplicateEmail);
            }
        }
    }

    let password_hash = match req.password {
        Some(password) => Some(password::hash(&password).await.map_err(AppError::Internal)?),
        None => None,
    };

    let patch = UserPatch {
        name: req.name,
        email,
        password_hash,
    };

    let user = state.store.update_user(id, patch).await.map_err(|err| match err {
        StoreError::NotFound => AppError::NotFound("User not found".to_string()),
        other => other.into(),
    })?;

    Ok(Json(UserDataResponse {
        message: "User updated successfully".to_string(),
        data: user.into(),
    }))
}

/// Delete a user keyed by id or by email; both lookups are supported.
pub async fn delete(
    State(state): State<SharedState>,
    Json(req): Json<DeleteUserRequest>,
) -> Result<Json<DeletedUserResponse>, AppError> {
    let result = match (req.id, req.email) {
        (Some(id), _) => state.store.delete_by_id(id).await,
        (None, Some(email)) => {
            state
                .store
                .delete_by_email(&validate::normalize_email(&email))
                .await
        }
        (None, None) => {
            return Err(AppError::Validation(vec![
                "Either 'id' or 'email' is required".to_string(),
            ]));
        }
    };

    let user = result.map_err(|err| match err {
        StoreError::NotFound => AppError::NotFound("User not found".to_string()),
        other => other.into(),
    })?;

    tracing::info!(user_id = %user.id, "user deleted");

    Ok(Json(DeletedUserResponse {
        message: "User deleted successfully".to_string(),
        user: user.into(),
    }))
}
