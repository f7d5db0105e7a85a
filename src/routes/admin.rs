use axum::{extract::State, http::HeaderMap, Json};
use serde_json::{json, Value};

use crate::{
    auth::{check_admin_credentials, issue_admin_token, require_admin},
    error::{AppError, AppResult},
    schemas::AdminLoginInput,
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/admin/login", axum::routing::post(login))
        .route("/admin/session", axum::routing::get(session))
}

/// Static credential compare against the env-configured admin account.
/// Deliberately not an account system; see the deployment notes.
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<AdminLoginInput>,
) -> AppResult<Json<Value>> {
    if !state.config.admin_login_enabled() {
        return Err(AppError::ServiceUnavailable(
            "Admin login is not configured. Set ADMIN_USERNAME, ADMIN_PASSWORD and ADMIN_TOKEN_SECRET.".to_string(),
        ));
    }

    if !check_admin_credentials(&state.config, &payload.username, &payload.password) {
        return Err(AppError::Unauthorized(
            "Invalid username or password.".to_string(),
        ));
    }

    let token = issue_admin_token(&state.config, &payload.username)?;
    tracing::info!(username = %payload.username.trim(), "Admin login succeeded");
    Ok(Json(json!({
        "token": token,
        "token_type": "bearer",
        "expires_in_hours": state.config.admin_token_ttl_hours,
    })))
}

async fn session(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Value>> {
    let username = require_admin(&state, &headers)?;
    Ok(Json(json!({ "username": username, "role": "admin" })))
}
