use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use crate::error::AppError;

pub fn validate_input<T: Validate>(input: &T) -> Result<(), AppError> {
    input
        .validate()
        .map_err(|errors| AppError::UnprocessableEntity(format!("Validation failed: {errors}")))
}

/// How a catalog service is priced.
///
/// Wire names match the stored catalog data: `meter` is priced per square
/// meter, `fixed` per piece, `consultation` has no upfront price at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PricingType {
    #[serde(rename = "meter")]
    PerUnit,
    #[serde(rename = "fixed")]
    Fixed,
    #[serde(rename = "consultation")]
    Consultation,
}

impl PricingType {
    pub fn unit_label(self) -> &'static str {
        match self {
            Self::PerUnit => "meter",
            Self::Fixed | Self::Consultation => "piece",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Electronic,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Electronic => "electronic",
        }
    }
}

impl Default for PaymentMethod {
    fn default() -> Self {
        Self::Cash
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    #[serde(rename = "new")]
    New,
    #[serde(rename = "confirmed")]
    Confirmed,
    #[serde(rename = "in-progress")]
    InProgress,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "cancelled")]
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Confirmed => "confirmed",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// A service as offered in the catalog. Immutable from the booking engine's
/// perspective; line items embed copies of these fields, never references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub id: String,
    pub name: String,
    pub pricing_type: PricingType,
    pub unit_price: f64,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub includes: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// One priced, quantified service selection within a booking session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub service_id: String,
    pub name: String,
    pub pricing_type: PricingType,
    pub unit_price: f64,
    pub quantity: i64,
    pub line_total: f64,
}

/// Aggregate pricing derived from the current line items and payment method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub base_price: f64,
    pub payment_method: PaymentMethod,
    pub discount_amount: f64,
    pub net_price: f64,
    pub advance_payment: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_balance: Option<f64>,
}

/// Descriptor of an image hosted by the external image API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Photo {
    pub url: String,
    pub thumbnail_url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub delete_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub accuracy_meters: f64,
    #[serde(default)]
    pub map_url: String,
}

/// The canonical persisted booking record. Created once; afterwards only
/// `status` (and, via admin tooling, `photos`/`payment_proof`) may change.
/// The financial fields are a snapshot taken at submission time and are
/// never recomputed from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub booking_id: String,
    pub timestamp: DateTime<Utc>,
    pub status: BookingStatus,
    pub services: Vec<LineItem>,
    pub payment_method: PaymentMethod,
    pub customer_name: String,
    pub phone: String,
    pub address: String,
    pub date: String,
    pub time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub photos: Vec<Photo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_proof: Option<Photo>,
    pub base_price: f64,
    pub final_price: f64,
    pub discount_amount: f64,
    pub advance_payment: f64,
}

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LineItemInput {
    pub service_id: String,
    /// Raw quantity as typed by the customer. Accepted as string or number;
    /// anything non-numeric counts as zero downstream.
    #[serde(default)]
    pub quantity: Option<Value>,
}

impl LineItemInput {
    pub fn raw_quantity(&self) -> String {
        match &self.quantity {
            Some(Value::String(text)) => text.trim().to_string(),
            Some(Value::Number(number)) => number.to_string(),
            _ => String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuotePreviewInput {
    #[serde(default)]
    pub services: Vec<LineItemInput>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeoPointInput {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub accuracy_meters: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CreateBookingInput {
    #[serde(default)]
    pub services: Vec<LineItemInput>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub customer_name: String,
    #[serde(default)]
    #[validate(length(max = 32))]
    pub phone: String,
    #[serde(default)]
    #[validate(length(max = 1024))]
    pub address: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub time: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 2048))]
    pub notes: Option<String>,
    pub location: Option<GeoPointInput>,
    #[serde(default)]
    pub photos: Vec<Photo>,
    pub payment_proof: Option<Photo>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BookingsQuery {
    pub phone: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BookingPath {
    pub booking_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpdateBookingStatusInput {
    pub status: BookingStatus,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CreateServiceInput {
    pub id: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub pricing_type: PricingType,
    #[validate(range(min = 0.0))]
    pub unit_price: f64,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub includes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpdateServiceInput {
    pub name: Option<String>,
    pub pricing_type: Option<PricingType>,
    pub unit_price: Option<f64>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub includes: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServicePath {
    pub service_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdminLoginInput {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssistantMessageInput {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssistantChatInput {
    pub message: String,
    #[serde(default)]
    pub conversation: Vec<AssistantMessageInput>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationStreamQuery {
    pub phone: Option<String>,
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

pub fn clamp_limit_in_range(limit: i64, min: i64, max: i64) -> i64 {
    limit.clamp(min, max)
}

pub fn serialize_to_map<T: Serialize>(payload: &T) -> Map<String, Value> {
    serde_json::to_value(payload)
        .ok()
        .and_then(|value| value.as_object().cloned())
        .unwrap_or_default()
}

pub fn remove_nulls(mut payload: Map<String, Value>) -> Map<String, Value> {
    payload.retain(|_, value| !value.is_null());
    payload
}

#[cfg(test)]
mod tests {
    use super::{clamp_limit_in_range, LineItemInput, PricingType};
    use serde_json::json;

    #[test]
    fn unit_labels_follow_pricing_type() {
        assert_eq!(PricingType::PerUnit.unit_label(), "meter");
        assert_eq!(PricingType::Fixed.unit_label(), "piece");
        assert_eq!(PricingType::Consultation.unit_label(), "piece");
    }

    #[test]
    fn raw_quantity_accepts_string_and_number() {
        let from_string: LineItemInput =
            serde_json::from_value(json!({"service_id": "a", "quantity": " 150 "})).unwrap();
        assert_eq!(from_string.raw_quantity(), "150");

        let from_number: LineItemInput =
            serde_json::from_value(json!({"service_id": "a", "quantity": 150})).unwrap();
        assert_eq!(from_number.raw_quantity(), "150");

        let missing: LineItemInput = serde_json::from_value(json!({"service_id": "a"})).unwrap();
        assert_eq!(missing.raw_quantity(), "");
    }

    #[test]
    fn clamps_limits() {
        assert_eq!(clamp_limit_in_range(0, 1, 100), 1);
        assert_eq!(clamp_limit_in_range(5000, 1, 100), 100);
        assert_eq!(clamp_limit_in_range(50, 1, 100), 50);
    }
}
