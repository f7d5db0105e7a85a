use axum::http::HeaderMap;
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Claims carried by the admin session token. The admin gate is a static
/// credential compare by design; the token only avoids re-sending the
/// password on every dashboard request.
#[derive(Debug, Serialize, Deserialize)]
struct AdminClaims {
    sub: String,
    role: String,
    iat: i64,
    exp: i64,
}

const ADMIN_ROLE: &str = "admin";

pub fn check_admin_credentials(config: &AppConfig, username: &str, password: &str) -> bool {
    let (Some(expected_user), Some(expected_pass)) =
        (config.admin_username.as_deref(), config.admin_password.as_deref())
    else {
        return false;
    };
    username.trim() == expected_user && password == expected_pass
}

pub fn issue_admin_token(config: &AppConfig, username: &str) -> AppResult<String> {
    let secret = token_secret(config)?;
    let now = Utc::now();
    let claims = AdminClaims {
        sub: username.trim().to_string(),
        role: ADMIN_ROLE.to_string(),
        iat: now.timestamp(),
        exp: (now + chrono::Duration::hours(config.admin_token_ttl_hours.max(1))).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|error| AppError::Internal(format!("Could not issue admin token: {error}")))
}

pub fn verify_admin_token(config: &AppConfig, token: &str) -> AppResult<String> {
    let secret = token_secret(config)?;
    let decoded = decode::<AdminClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthorized("Invalid or expired admin token.".to_string()))?;

    if decoded.claims.role != ADMIN_ROLE {
        return Err(AppError::Forbidden("Admin role required.".to_string()));
    }
    Ok(decoded.claims.sub)
}

/// Resolve the admin identity from an `Authorization: Bearer` header.
pub fn require_admin(state: &AppState, headers: &HeaderMap) -> AppResult<String> {
    let token = bearer_token(headers).ok_or_else(|| {
        AppError::Unauthorized("Missing Authorization bearer token.".to_string())
    })?;
    verify_admin_token(&state.config, token)
}

/// Non-failing variant for endpoints that merely behave differently for
/// admins (e.g. unfiltered booking lists).
pub fn is_admin(state: &AppState, headers: &HeaderMap) -> bool {
    bearer_token(headers)
        .map(|token| verify_admin_token(&state.config, token).is_ok())
        .unwrap_or(false)
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn token_secret(config: &AppConfig) -> AppResult<&str> {
    config.admin_token_secret.as_deref().ok_or_else(|| {
        AppError::ServiceUnavailable(
            "Admin login is not configured. Set ADMIN_USERNAME, ADMIN_PASSWORD and ADMIN_TOKEN_SECRET.".to_string(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::{check_admin_credentials, issue_admin_token, verify_admin_token};
    use crate::config::AppConfig;

    fn test_config() -> AppConfig {
        let mut config = AppConfig::from_env();
        config.admin_username = Some("admin".to_string());
        config.admin_password = Some("s3cret".to_string());
        config.admin_token_secret = Some("unit-test-secret".to_string());
        config
    }

    #[test]
    fn credential_compare_is_exact() {
        let config = test_config();
        assert!(check_admin_credentials(&config, "admin", "s3cret"));
        assert!(check_admin_credentials(&config, " admin ", "s3cret"));
        assert!(!check_admin_credentials(&config, "admin", "wrong"));
        assert!(!check_admin_credentials(&config, "other", "s3cret"));
    }

    #[test]
    fn token_round_trips() {
        let config = test_config();
        let token = issue_admin_token(&config, "admin").expect("token issued");
        let subject = verify_admin_token(&config, &token).expect("token verified");
        assert_eq!(subject, "admin");
        assert!(verify_admin_token(&config, "garbage").is_err());
    }
}
