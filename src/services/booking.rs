use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::repository::table_service::create_row;
use crate::schemas::{
    remove_nulls, serialize_to_map, Booking, BookingStatus, CreateBookingInput, GeoPoint,
    LineItem, PaymentMethod, Quote,
};
use crate::services::{catalog, pricing};
use crate::state::AppState;

/// Submission-time validation failures, checked fail-fast in a fixed order
/// before any external call is made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionError {
    #[error("Select at least one service before booking.")]
    EmptyCart,
    #[error("The field '{0}' is required.")]
    MissingRequiredField(&'static str),
    #[error("Electronic payment requires an uploaded payment proof.")]
    MissingPaymentProof,
    #[error("The visit date '{0}' is invalid or in the past.")]
    InvalidVisitDate(String),
}

impl From<SubmissionError> for AppError {
    fn from(error: SubmissionError) -> Self {
        match &error {
            SubmissionError::MissingRequiredField(_) => {
                AppError::UnprocessableEntity(error.to_string())
            }
            _ => AppError::BadRequest(error.to_string()),
        }
    }
}

/// Human-shareable booking identifier: a second-resolution time prefix plus
/// a short random suffix. Uniqueness is probabilistic, not guaranteed.
pub fn generate_booking_id(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..6].to_uppercase();
    format!("CM-{}-{}", now.format("%y%m%d%H%M%S"), suffix)
}

pub fn maps_url(latitude: f64, longitude: f64) -> String {
    format!("https://maps.google.com/?q={latitude},{longitude}")
}

/// Assemble the canonical booking record from the submitted form, the built
/// cart and the computed quote.
///
/// Validation order: empty cart, then blank required fields (name, phone,
/// address, date, time), then the payment proof rule. The visit-date check
/// runs last so the earlier rules keep their documented precedence. The
/// quote values are frozen into the record; they are never recomputed after
/// submission.
pub fn assemble_booking(
    input: &CreateBookingInput,
    items: Vec<LineItem>,
    quote: &Quote,
    now: DateTime<Utc>,
    today: NaiveDate,
) -> Result<Booking, SubmissionError> {
    if items.is_empty() {
        return Err(SubmissionError::EmptyCart);
    }

    let required: [(&'static str, &str); 5] = [
        ("customer_name", &input.customer_name),
        ("phone", &input.phone),
        ("address", &input.address),
        ("date", &input.date),
        ("time", &input.time),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(SubmissionError::MissingRequiredField(field));
        }
    }

    if input.payment_method == PaymentMethod::Electronic && input.payment_proof.is_none() {
        return Err(SubmissionError::MissingPaymentProof);
    }

    let date = input.date.trim();
    match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        Ok(parsed) if parsed >= today => {}
        _ => return Err(SubmissionError::InvalidVisitDate(date.to_string())),
    }

    let location = input.location.as_ref().map(|point| GeoPoint {
        latitude: point.latitude,
        longitude: point.longitude,
        accuracy_meters: point.accuracy_meters,
        map_url: maps_url(point.latitude, point.longitude),
    });

    Ok(Booking {
        booking_id: generate_booking_id(now),
        timestamp: now,
        status: BookingStatus::New,
        services: items,
        payment_method: input.payment_method,
        customer_name: input.customer_name.trim().to_string(),
        phone: input.phone.trim().to_string(),
        address: input.address.trim().to_string(),
        date: date.to_string(),
        time: input.time.trim().to_string(),
        email: trimmed_opt(input.email.as_deref()),
        notes: trimmed_opt(input.notes.as_deref()),
        location,
        photos: input.photos.clone(),
        payment_proof: input.payment_proof.clone(),
        base_price: quote.base_price,
        final_price: quote.net_price,
        discount_amount: quote.discount_amount,
        advance_payment: quote.advance_payment,
    })
}

fn trimmed_opt(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned)
}

/// Full submission pipeline: price the cart against the current catalog,
/// compute the quote, assemble the canonical record and persist it. All
/// validation happens before the persistence call.
pub async fn create_booking_from_input(
    state: &AppState,
    input: &CreateBookingInput,
) -> AppResult<Booking> {
    let catalog = catalog::load_catalog(state).await?;

    let mut items: Vec<LineItem> = Vec::with_capacity(input.services.len());
    for line in &input.services {
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
        input.payment_method,
        state.config.electronic_discount_rate(),
        state.config.advance_payment_rate(),
    );

    let now = Utc::now();
    let today = now.with_timezone(&state.config.company_tz()).date_naive();
    let booking = assemble_booking(input, items, &quote, now, today)?;

    persist_booking(state, booking).await
}

pub async fn persist_booking(state: &AppState, booking: Booking) -> AppResult<Booking> {
    let pool = state.db_pool.as_ref().ok_or_else(|| {
        AppError::Dependency("Database is not configured. Set DATABASE_URL.".to_string())
    })?;

    let payload = remove_nulls(serialize_to_map(&booking));
    let created = create_row(pool, "bookings", &payload).await?;
    booking_from_row(created)
}

// ---------------------------------------------------------------------------
// Legacy-shape tolerance at the persistence boundary
// ---------------------------------------------------------------------------

/// Normalize a stored booking row to the canonical shape before the core
/// ever sees it. Older rows carry a single `service` object instead of the
/// `services` array, and line items under their old key names.
pub fn normalize_booking_row(row: Value) -> Value {
    let Value::Object(mut obj) = row else {
        return row;
    };

    // NULL columns arrive as JSON nulls; drop them so serde defaults apply.
    obj.retain(|_, value| !value.is_null());

    let mut services: Vec<Value> = obj
        .get("services")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    if services.is_empty() {
        if let Some(legacy) = obj.get("service").filter(|value| value.is_object()) {
            services = vec![legacy.clone()];
        }
    }

    let services: Vec<Value> = services.into_iter().map(normalize_line_item_value).collect();
    obj.insert("services".to_string(), Value::Array(services));
    obj.remove("service");

    if obj
        .get("status")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|status| !status.is_empty())
        .is_none()
    {
        obj.insert("status".to_string(), Value::String("new".to_string()));
    }

    let timestamp_ok = obj
        .get("timestamp")
        .and_then(Value::as_str)
        .map(|raw| DateTime::parse_from_rfc3339(raw).is_ok())
        .unwrap_or(false);
    if !timestamp_ok {
        obj.insert(
            "timestamp".to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );
    }

    for money_field in ["base_price", "final_price", "discount_amount", "advance_payment"] {
        if !obj.get(money_field).map(Value::is_number).unwrap_or(false) {
            obj.insert(money_field.to_string(), Value::from(0.0));
        }
    }

    Value::Object(obj)
}

/// Map a legacy line-item object onto the canonical field names. Canonical
/// keys win when both spellings are present.
fn normalize_line_item_value(item: Value) -> Value {
    let Value::Object(mut obj) = item else {
        return item;
    };

    let aliases = [
        ("service_id", "id"),
        ("name", "name_ar"),
        ("unit_price", "price"),
        ("pricing_type", "type"),
        ("line_total", "totalPrice"),
    ];
    for (canonical, legacy) in aliases {
        if !obj.contains_key(canonical) {
            if let Some(value) = obj.get(legacy).cloned() {
                obj.insert(canonical.to_string(), value);
            }
        }
        obj.remove(legacy);
    }

    if !obj.get("quantity").map(Value::is_number).unwrap_or(false) {
        obj.insert("quantity".to_string(), Value::from(1));
    }

    Value::Object(obj)
}

/// Decode a stored row into the canonical [`Booking`], tolerating legacy
/// shapes.
pub fn booking_from_row(row: Value) -> AppResult<Booking> {
    serde_json::from_value(normalize_booking_row(row))
        .map_err(|error| AppError::Internal(format!("Stored booking is unreadable: {error}")))
}

/// Response shape for clients: canonical booking plus the legacy `service`
/// field (first line item) older clients still read.
pub fn booking_response_value(booking: &Booking) -> Value {
    let mut value = serde_json::to_value(booking).unwrap_or(Value::Object(Map::new()));
    if let Some(obj) = value.as_object_mut() {
        if let Some(first) = booking.services.first() {
            obj.insert(
                "service".to_string(),
                serde_json::to_value(first).unwrap_or(Value::Null),
            );
        }
    }
    value
}
