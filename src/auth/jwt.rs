use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const ACCESS_TOKEN_HOURS: i64 = 1;
pub const REFRESH_TOKEN_DAYS: i64 = 7;
pub const RESET_TOKEN_MINUTES: i64 = 15;

const RESET_PURPOSE: &str = "password_reset";

/// Access-token claims: the sole source of truth for downstream
/// role checks; no store re-query happens after verification.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: String,
    pub exp: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RefreshClaims {
    pub sub: Uuid,
    pub email: String,
    pub exp: i64,
}

/// Claims for the password-reset capability. The `purpose` field keeps an
/// access token from ever being replayed as a reset token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResetClaims {
    pub sub: Uuid,
    pub purpose: String,
    pub exp: i64,
}

pub fn issue_access(user_id: Uuid, email: &str, role: &str, secret: &str) -> Result<String, String> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        role: role.to_string(),
        exp: (Utc::now() + Duration::hours(ACCESS_TOKEN_HOURS)).timestamp(),
    };
    sign(&claims, secret)
}

pub fn issue_refresh(user_id: Uuid, email: &str, secret: &str) -> Result<String, String> {
    let claims = RefreshClaims {
        sub: user_id,
        email: email.to_string(),
        exp: (Utc::now() + Duration::days(REFRESH_TOKEN_DAYS)).timestamp(),
    };
    sign(&claims, secret)
}

pub fn issue_reset(user_id: Uuid, secret: &str) -> Result<String, String> {
    let claims = ResetClaims {
        sub: user_id,
        purpose: RESET_PURPOSE.to_string(),
        exp: (Utc::now() + Duration::minutes(RESET_TOKEN_MINUTES)).timestamp(),
    };
    sign(&claims, secret)
}

pub fn verify_access(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| format!("invalid or expired access token: {e}"))
}

pub fn verify_refresh(token: &str, secret: &str) -> Result<RefreshClaims, String> {
    decode::<RefreshClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| format!("invalid or expired refresh token: {e}"))
}

pub fn verify_reset(token: &str, secret: &str) -> Result<ResetClaims, String> {
    let claims = decode::<ResetClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| format!("invalid or expired reset token: {e}"))?;

    if claims.purpose != RESET_PURPOSE {
        return Err("token is not a password reset token".to_string());
    }
    Ok(claims)
}

fn sign<T: Serialize>(claims: &T, secret: &str) -> Result<String, String> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| format!("JWT encode failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-that-is-long-enough";

    #[test]
    fn access_token_roundtrip() {
        let id = Uuid::now_v7();
        let token = issue_access(id, "ann@x.com", "admin", SECRET).unwrap();
        let claims = verify_access(&token, SECRET).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.email, "ann@x.com");
        assert_eq!(claims.role, "admin");
        assert!(claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_access(Uuid::now_v7(), "a@x.com", "user", SECRET).unwrap();
        assert!(verify_access(&token, "other-secret").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        // Past the default 60s validation leeway.
        let claims = Claims {
            sub: Uuid::now_v7(),
            email: "a@x.com".to_string(),
            role: "user".to_string(),
            exp: (Utc::now() - Duration::minutes(5)).timestamp(),
        };
        let token = sign(&claims, SECRET).unwrap();
        assert!(verify_access(&token, SECRET).is_err());
    }

    #[test]
    fn refresh_token_roundtrip() {
        let id = Uuid::now_v7();
        let token = issue_refresh(id, "bo@x.com", SECRET).unwrap();
        let claims = verify_refresh(&token, SECRET).unwrap();
        assert_eq!(claims.sub, id);
        let week = (Utc::now() + Duration::days(REFRESH_TOKEN_DAYS)).timestamp();
        assert!((claims.exp - week).abs() < 5);
    }

    #[test]
    fn reset_token_roundtrip_and_purpose_check() {
        let id = Uuid::now_v7();
        let token = issue_reset(id, SECRET).unwrap();
        let claims = verify_reset(&token, SECRET).unwrap();
        assert_eq!(claims.sub, id);

        // An access token must not pass reset verification.
        let access = issue_access(id, "a@x.com", "user", SECRET).unwrap();
        assert!(verify_reset(&access, SECRET).is_err());
    }

    #[test]
    fn expired_reset_token_is_rejected() {
        let claims = ResetClaims {
            sub: Uuid::now_v7(),
            purpose: "password_reset".to_string(),
            exp: (Utc::now() - Duration::minutes(20)).timestamp(),
        };
        let token = sign(&claims, SECRET).unwrap();
        assert!(verify_reset(&token, SECRET).is_err());
    }
}
