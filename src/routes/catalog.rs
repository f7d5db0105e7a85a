use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

use crate::{
    auth::require_admin,
    error::{AppError, AppResult},
    repository::table_service::{create_row, delete_row, update_row},
    schemas::{
        remove_nulls, serialize_to_map, validate_input, CreateServiceInput, ServicePath,
        UpdateServiceInput,
    },
    services::catalog::{invalidate_catalog, load_catalog},
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/services",
            axum::routing::get(list_services).post(create_service),
        )
        .route(
            "/services/{service_id}",
            axum::routing::patch(update_service).delete(delete_service),
        )
}

/// Public catalog listing plus the pricing configuration the booking form
/// needs (minimum area, discount and advance percentages, payment number).
async fn list_services(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let catalog = load_catalog(&state).await?;
    Ok(Json(json!({
        "data": catalog.as_slice(),
        "config": {
            "minimum_area": state.config.minimum_area,
            "electronic_discount_percent": state.config.electronic_discount_percent,
            "advance_payment_percent": state.config.advance_payment_percent,
            "payment_number": state.config.payment_number,
            "booking_time_slots": state.config.booking_time_slots,
        },
    })))
}

async fn create_service(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateServiceInput>,
) -> AppResult<impl IntoResponse> {
    require_admin(&state, &headers)?;
    validate_input(&payload)?;
    let pool = db_pool(&state)?;

    let mut record = remove_nulls(serialize_to_map(&payload));
    let id = payload
        .id
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| slugify(&payload.name));
    record.insert("id".to_string(), Value::String(id));
    record.insert("is_active".to_string(), Value::Bool(true));

    let created = create_row(pool, "services", &record).await?;
    invalidate_catalog(&state).await;

    Ok((axum::http::StatusCode::CREATED, Json(created)))
}

async fn update_service(
    State(state): State<AppState>,
    Path(path): Path<ServicePath>,
    headers: HeaderMap,
    Json(payload): Json<UpdateServiceInput>,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    let pool = db_pool(&state)?;

    let patch = remove_nulls(serialize_to_map(&payload));
    if patch.is_empty() {
        return Err(AppError::BadRequest("No fields to update.".to_string()));
    }

    let updated = update_row(pool, "services", &path.service_id, &patch, "id").await?;
    invalidate_catalog(&state).await;
    Ok(Json(updated))
}

async fn delete_service(
    State(state): State<AppState>,
    Path(path): Path<ServicePath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    let pool = db_pool(&state)?;

    let deleted = delete_row(pool, "services", &path.service_id, "id").await?;
    invalidate_catalog(&state).await;
    Ok(Json(json!({ "ok": true, "deleted": deleted })))
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for character in name.trim().to_ascii_lowercase().chars() {
        if character.is_ascii_alphanumeric() {
            slug.push(character);
        } else if !slug.ends_with('_') && !slug.is_empty() {
            slug.push('_');
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    slug
}

fn db_pool(state: &AppState) -> AppResult<&sqlx::PgPool> {
    state.db_pool.as_ref().ok_or_else(|| {
        AppError::Dependency("Database is not configured. Set DATABASE_URL.".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::slugify;

    #[test]
    fn slugs_are_lowercase_underscore_identifiers() {
        assert_eq!(slugify("Sofa Steam Cleaning"), "sofa_steam_cleaning");
        assert_eq!(slugify("  Marble -- polishing  "), "marble_polishing");
        assert_eq!(slugify("A&B"), "a_b");
    }
}
