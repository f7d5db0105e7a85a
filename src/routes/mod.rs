use axum::{routing::get, Router};

use crate::state::AppState;

pub mod admin;
pub mod assistant;
pub mod bookings;
pub mod catalog;
pub mod health;
pub mod notifications;
pub mod quotes;
pub mod uploads;

pub fn v1_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .merge(catalog::router())
        .merge(quotes::router())
        .merge(bookings::router())
        .merge(uploads::router())
        .merge(admin::router())
        .merge(assistant::router())
        .merge(notifications::router())
}
