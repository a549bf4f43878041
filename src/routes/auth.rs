use std::net::SocketAddr;
use std::time::Duration;

use axum::Json;
use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::Cookie;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::jwt;
use crate::auth::password;
use crate::error::AppError;
use crate::models::UserView;
use crate::state::SharedState;
use crate::validate;

const EMAIL_SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Deserialize)]
pub struct SignupRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub token: Option<String>,
    #[serde(rename = "newPassword")]
    pub new_password: Option<String>,
}

#[derive(Serialize)]
pub struct SignupResponse {
    pub message: String,
    pub user: UserView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub notification: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub user: UserView,
    pub token: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

fn require(field: Option<String>, name: &str, issues: &mut Vec<String>) -> String {
    match field {
        Some(value) if !value.trim().is_empty() => value,
        _ => {
            issues.push(format!("{name} is required"));
            String::new()
        }
    }
}

pub async fn signup(
    State(state): State<SharedState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>), AppError> {
    if let Err(retry) = state.limiter.check("signup", addr.ip()) {
        return Err(AppError::RateLimited(retry));
    }

    let mut issues = Vec::new();
    let name = require(req.name, "Name", &mut issues);
    let email = require(req.email, "Email", &mut issues);
    let password = require(req.password, "Password", &mut issues);
    if !issues.is_empty() {
        return Err(AppError::Validation(issues));
    }

    let email = validate::normalize_email(&email);

    // Clean error before the store's own uniqueness constraint kicks in.
    if state.store.find_by_email(&email).await?.is_some() {
        return Err(AppError::DuplicateEmail);
    }

    let password_hash = password::hash(&password).await.map_err(AppError::Internal)?;

    // The store serializes the count check and the insert, so at most one
    // concurrent signup becomes the bootstrap admin.
    let (user, is_first) = state
        .store
        .create_signup_user(&name, &email, &password_hash)
        .await?;

    let token = if is_first {
        Some(
            jwt::issue_access(user.id, &user.email, &user.role, &state.config.jwt_secret)
                .map_err(AppError::Internal)?,
        )
    } else {
        None
    };

    let notification = if is_first {
        format!(
            "Hello {name}, you are the first user and have been automatically approved as an admin."
        )
    } else {
        format!("Hello {name}, your account has been created and is awaiting admin approval.")
    };

    tracing::info!(user_id = %user.id, bootstrap = is_first, "user signed up");

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            message: "User created successfully.".to_string(),
            user: (&user).into(),
            token,
            notification,
        }),
    ))
}

pub async fn login(
    State(state): State<SharedState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    if let Err(retry) = state.limiter.check("login", addr.ip()) {
        return Err(AppError::RateLimited(retry));
    }

    let mut issues = Vec::new();
    let email = require(req.email, "Email", &mut issues);
    let password = require(req.password, "Password", &mut issues);
    if !issues.is_empty() {
        return Err(AppError::Validation(issues));
    }

    let email = validate::normalize_email(&email);

    let user = state
        .store
        .find_by_email(&email)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let valid = password::verify(&password, &user.password_hash)
        .await
        .map_err(AppError::Internal)?;
    if !valid {
        return Err(AppError::InvalidCredential);
    }

    // Approval is not checked here: a pending user gets a token carrying
    // role=pending and is turned away at the admin gate instead.
    let token = jwt::issue_access(user.id, &user.email, &user.role, &state.config.jwt_secret)
        .map_err(AppError::Internal)?;

    tracing::info!(user_id = %user.id, "user logged in");

    Ok(Json(LoginResponse {
        message: "Login successful".to_string(),
        user: (&user).into(),
        token,
    }))
}

/// Stateless logout: the server holds no session, so this just expires the
/// client-side cookie and always succeeds.
pub async fn logout() -> (CookieJar, Json<MessageResponse>) {
    let expired = Cookie::build(("access_token", ""))
        .path("/")
        .max_age(time::Duration::ZERO)
        .build();

    (
        CookieJar::new().add(expired),
        Json(MessageResponse {
            message: "Logout successful".to_string(),
        }),
    )
}

pub async fn forgot_password(
    State(state): State<SharedState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    if let Err(retry) = state.limiter.check("forgetPassword", addr.ip()) {
        return Err(AppError::RateLimited(retry));
    }

    let email = match req.email {
        Some(email) if !email.trim().is_empty() => validate::normalize_email(&email),
        _ => return Err(AppError::Validation(vec!["Email is required".to_string()])),
    };

    let user = state
        .store
        .find_by_email(&email)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    // Defensive re-check of startup configuration.
    if state.config.jwt_secret.is_empty() {
        return Err(AppError::Misconfiguration("JWT secret is not set".to_string()));
    }
    let frontend_url = state.config.frontend_url.as_deref().ok_or_else(|| {
        AppError::Misconfiguration("FRONTEND_URL is not set".to_string())
    })?;
    let mailer = state.mailer.as_ref().ok_or_else(|| {
        AppError::Misconfiguration("Email transport is not configured".to_string())
    })?;

    let token = jwt::issue_reset(user.id, &state.config.jwt_secret).map_err(AppError::Internal)?;
    let expires_at = Utc::now() + chrono::Duration::minutes(jwt::RESET_TOKEN_MINUTES);

    // The persisted record mirrors the token; it is not rolled back if
    // delivery fails, since the token is useless without the link.
    state.store.create_reset(user.id, &token, expires_at).await?;

    let reset_url = format!("{frontend_url}/reset-password?token={token}");

    send_with_retry(mailer.as_ref(), &user.email, &reset_url)
        .await
        .map_err(AppError::EmailDelivery)?;

    tracing::info!(user_id = %user.id, "password reset link sent");

    Ok(Json(MessageResponse {
        message: "Password reset link sent to email".to_string(),
    }))
}

/// Bounded delivery: each attempt is capped so a slow provider cannot hang
/// the request, and a single retry covers transient failures.
async fn send_with_retry(
    mailer: &dyn crate::email::Mailer,
    to_email: &str,
    reset_url: &str,
) -> Result<(), String> {
    for attempt in 0..2 {
        match tokio::time::timeout(
            EMAIL_SEND_TIMEOUT,
            mailer.send_password_reset(to_email, reset_url),
        )
        .await
        {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) if attempt == 0 => {
                tracing::warn!("reset email attempt failed, retrying: {e}");
            }
            Ok(Err(e)) => return Err(e),
            Err(_) if attempt == 0 => {
                tracing::warn!("reset email attempt timed out, retrying");
            }
            Err(_) => return Err("email send timed out".to_string()),
        }
    }
    unreachable!("send loop always returns within two attempts")
}

pub async fn reset_password(
    State(state): State<SharedState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let mut issues = Vec::new();
    let token = require(req.token, "Token", &mut issues);
    let new_password = require(req.new_password, "New password", &mut issues);
    if !issues.is_empty() {
        return Err(AppError::Validation(issues));
    }

    let claims = jwt::verify_reset(&token, &state.config.jwt_secret)
        .map_err(|_| AppError::Unauthorized("Invalid or expired reset token".to_string()))?;

    // The signed token must also match a live, unexpired record; a consumed
    // token has no record and is rejected here.
    let reset = state
        .store
        .find_valid_reset(claims.sub, &token)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired reset token".to_string()))?;

    let mut password_issues = Vec::new();
    validate::check_password(&new_password, &mut password_issues);
    if !password_issues.is_empty() {
        return Err(AppError::Validation(password_issues));
    }

    let password_hash = password::hash(&new_password).await.map_err(AppError::Internal)?;
    state.store.update_password(reset.user_id, &password_hash).await?;

    // Single use: consume the record.
    state.store.delete_reset(reset.id).await?;

    tracing::info!(user_id = %reset.user_id, "password reset completed");

    Ok(Json(MessageResponse {
        message: "Password has been reset successfully".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::email::Mailer;

    struct HangingMailer {
        attempts: AtomicU32,
    }

    #[async_trait]
    impl Mailer for HangingMailer {
        async fn send_password_reset(&self, _to: &str, _url: &str) -> Result<(), String> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn send_times_out_twice_then_gives_up() {
        let mailer = HangingMailer {
            attempts: AtomicU32::new(0),
        };

        let err = send_with_retry(&mailer, "someone@x.com", "http://x/reset")
            .await
            .unwrap_err();
        assert_eq!(err, "email send timed out");
        assert_eq!(mailer.attempts.load(Ordering::SeqCst), 2);
    }
}
