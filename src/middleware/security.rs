use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::AppError;
use crate::state::AppState;

/// Reject requests whose Host header is not in the configured allowlist.
/// A `*` entry disables the check entirely.
pub async fn enforce_trusted_hosts(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let trusted = &state.config.trusted_hosts;
    if trusted.iter().any(|host| host.trim() == "*") {
        return Ok(next.run(request).await);
    }

    let host = request
        .headers()
        .get(axum::http::header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.split(':').next().unwrap_or(value).trim().to_ascii_lowercase())
        .unwrap_or_default();

    let allowed = trusted
        .iter()
        .any(|candidate| candidate.trim().eq_ignore_ascii_case(&host));

    if !allowed {
        return Err(AppError::BadRequest(format!(
            "Host '{host}' is not a trusted host."
        )));
    }

    Ok(next.run(request).await)
}
