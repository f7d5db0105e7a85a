use std::convert::Infallible;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::sse::{Event, KeepAlive, Sse},
};
use futures_core::Stream;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};

use crate::{
    auth::is_admin,
    schemas::NotificationStreamQuery,
    services::booking_feed::BookingFeedDiff,
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route(
        "/notifications/stream",
        axum::routing::get(stream_notifications),
    )
}

/// Server-sent notification stream.
///
/// Each connection is one listener session: it keeps its own snapshot
/// baseline, so the first snapshot after connecting never produces a storm
/// of stale notifications. Admin listeners (bearer token) get new-booking
/// alerts; a `?phone=` listener gets status changes for that phone's
/// bookings. If the feed watcher is down the stream simply stays quiet.
async fn stream_notifications(
    State(state): State<AppState>,
    Query(query): Query<NotificationStreamQuery>,
    headers: HeaderMap,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let admin = is_admin(&state, &headers);
    let phone = query
        .phone
        .map(|phone| phone.trim().to_string())
        .filter(|phone| !phone.is_empty());

    let receiver = state.feed_tx.subscribe();
    let mut diff = BookingFeedDiff::new();

    let stream = BroadcastStream::new(receiver).filter_map(move |snapshot| {
        // A lagged receiver just waits for the next complete snapshot.
        let snapshot = snapshot.ok()?;
        let notifications = diff.apply(snapshot.as_slice(), admin, phone.as_deref());
        if notifications.is_empty() {
            return None;
        }
        Event::default()
            .event("notifications")
            .json_data(&notifications)
            .ok()
            .map(Ok)
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
