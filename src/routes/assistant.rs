use axum::{extract::State, Json};
use serde_json::Value;

use crate::{
    error::{AppError, AppResult},
    schemas::AssistantChatInput,
    services::assistant::run_assistant_chat,
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route("/assistant/chat", axum::routing::post(chat))
}

/// One turn of the guided-booking dialogue. The model may answer in text,
/// ask the client to render a widget, or finalize the booking through the
/// same pipeline the form uses.
async fn chat(
    State(state): State<AppState>,
    Json(payload): Json<AssistantChatInput>,
) -> AppResult<Json<Value>> {
    if payload.message.trim().is_empty() {
        return Err(AppError::BadRequest("Message cannot be empty.".to_string()));
    }

    let result = run_assistant_chat(&state, &payload.message, &payload.conversation).await?;
    Ok(Json(Value::Object(result)))
}
