use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Map, Value};

use crate::{
    auth::{is_admin, require_admin},
    error::{AppError, AppResult},
    repository::table_service::{count_rows, get_row, list_rows, update_row},
    schemas::{
        clamp_limit_in_range, validate_input, BookingPath, BookingsQuery, CreateBookingInput,
        UpdateBookingStatusInput,
    },
    services::{
        booking::{booking_from_row, booking_response_value, create_booking_from_input},
        invoice::render_invoice,
        whatsapp,
    },
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/bookings",
            axum::routing::get(list_bookings).post(create_booking),
        )
        .route("/bookings/{booking_id}", axum::routing::get(get_booking))
        .route(
            "/bookings/{booking_id}/status",
            axum::routing::put(update_booking_status),
        )
        .route(
            "/bookings/{booking_id}/invoice",
            axum::routing::get(get_booking_invoice),
        )
}

/// The submission flow: validate, price against the current catalog, freeze
/// the quote snapshot, persist, and hand back the invoice plus the WhatsApp
/// share link.
async fn create_booking(
    State(state): State<AppState>,
    Json(payload): Json<CreateBookingInput>,
) -> AppResult<impl IntoResponse> {
    validate_input(&payload)?;

    let booking = create_booking_from_input(&state, &payload).await?;
    let invoice_text = render_invoice(&booking);
    let whatsapp_url = whatsapp::share_link(&state.config, &invoice_text);

    Ok((
        axum::http::StatusCode::CREATED,
        Json(json!({
            "booking": booking_response_value(&booking),
            "invoice_text": invoice_text,
            "whatsapp_url": whatsapp_url,
        })),
    ))
}

/// Timestamp-descending booking list. Admins see everything; everyone else
/// must pass the phone used at submission time — the orders page looks up
/// the customer's own bookings with it.
async fn list_bookings(
    State(state): State<AppState>,
    Query(query): Query<BookingsQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let pool = db_pool(&state)?;

    let phone = query
        .phone
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty());

    let mut filters = Map::new();
    if let Some(phone) = phone {
        filters.insert("phone".to_string(), Value::String(phone.to_string()));
    } else if !is_admin(&state, &headers) {
        return Err(AppError::Unauthorized(
            "Pass ?phone= or authenticate as admin to list bookings.".to_string(),
        ));
    }

    let limit = clamp_limit_in_range(query.limit.unwrap_or(200), 1, 1000);
    let rows = list_rows(pool, "bookings", Some(&filters), limit, 0, "timestamp", false).await?;
    let total = count_rows(pool, "bookings", Some(&filters)).await?;

    let data = rows
        .into_iter()
        .filter_map(|row| booking_from_row(row).ok())
        .map(|booking| booking_response_value(&booking))
        .collect::<Vec<_>>();

    Ok(Json(json!({ "data": data, "total": total })))
}

async fn get_booking(
    State(state): State<AppState>,
    Path(path): Path<BookingPath>,
) -> AppResult<Json<Value>> {
    let pool = db_pool(&state)?;
    let row = get_row(pool, "bookings", &path.booking_id, "booking_id").await?;
    let booking = booking_from_row(row)?;
    Ok(Json(booking_response_value(&booking)))
}

/// Admin-driven status update. Transitions are deliberately unconstrained:
/// any known status may follow any other.
async fn update_booking_status(
    State(state): State<AppState>,
    Path(path): Path<BookingPath>,
    headers: HeaderMap,
    Json(payload): Json<UpdateBookingStatusInput>,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    let pool = db_pool(&state)?;

    let mut patch = Map::new();
    patch.insert(
        "status".to_string(),
        Value::String(payload.status.as_str().to_string()),
    );

    let updated = update_row(pool, "bookings", &path.booking_id, &patch, "booking_id").await?;
    let booking = booking_from_row(updated)?;
    tracing::info!(
        booking_id = %booking.booking_id,
        status = booking.status.as_str(),
        "Booking status updated"
    );
    Ok(Json(booking_response_value(&booking)))
}

/// Re-render the invoice for an existing booking from its stored snapshot.
async fn get_booking_invoice(
    State(state): State<AppState>,
    Path(path): Path<BookingPath>,
) -> AppResult<Json<Value>> {
    let pool = db_pool(&state)?;
    let row = get_row(pool, "bookings", &path.booking_id, "booking_id").await?;
    let booking = booking_from_row(row)?;

    let invoice_text = render_invoice(&booking);
    let whatsapp_url = whatsapp::share_link(&state.config, &invoice_text);
    Ok(Json(json!({
        "booking_id": booking.booking_id,
        "invoice_text": invoice_text,
        "whatsapp_url": whatsapp_url,
    })))
}

fn db_pool(state: &AppState) -> AppResult<&sqlx::PgPool> {
    state.db_pool.as_ref().ok_or_else(|| {
        AppError::Dependency("Database is not configured. Set DATABASE_URL.".to_string())
    })
}
