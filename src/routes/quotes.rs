use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::{
    error::AppResult,
    schemas::{LineItem, QuotePreviewInput},
    services::{catalog::load_catalog, pricing},
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route("/quotes/preview", axum::routing::post(preview_quote))
}

/// Price the current cart without creating anything — backs the booking
/// form's live totals panel and the chat assistant's quote step.
async fn preview_quote(
    State(state): State<AppState>,
    Json(payload): Json<QuotePreviewInput>,
) -> AppResult<Json<Value>> {
    let catalog = load_catalog(&state).await?;

    let mut items: Vec<LineItem> = Vec::with_capacity(payload.services.len());
    for line in &payload.services {
        let item = pricing::add_service(
            &catalog,
            &items,
            &line.service_id,
            &line.raw_quantity(),
            state.config.minimum_area,
        )?;
        items.push(item);
    }

    let quote = pricing::compute_quote(
        &items,
        payload.payment_method,
        state.config.electronic_discount_rate(),
        state.config.advance_payment_rate(),
    );

    Ok(Json(json!({ "items": items, "quote": quote })))
}
