use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::sleep;

use crate::error::AppResult;
use crate::repository::table_service::list_rows;
use crate::schemas::{Booking, BookingStatus};
use crate::services::booking::booking_from_row;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedNotificationKind {
    NewBooking,
    StatusChanged,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedNotification {
    pub kind: FeedNotificationKind,
    pub booking_id: String,
    pub status: BookingStatus,
    pub message: String,
}

pub fn status_message(status: BookingStatus) -> &'static str {
    match status {
        BookingStatus::New => "Your booking was received and is awaiting confirmation.",
        BookingStatus::Confirmed => "Your booking has been confirmed.",
        BookingStatus::InProgress => "Our team has started working on your booking.",
        BookingStatus::Completed => "Your booking is completed. Thank you!",
        BookingStatus::Cancelled => "Your booking has been cancelled.",
    }
}

/// Snapshot differ for one listener session.
///
/// Holds the previously seen snapshot and turns each newly delivered one
/// into at most a handful of notifications. Snapshots must be complete and
/// timestamp-descending; the feed watcher guarantees both. The very first
/// snapshot only seeds the baseline so a page load never triggers a
/// notification storm.
#[derive(Debug, Default)]
pub struct BookingFeedDiff {
    previous: Option<Vec<Booking>>,
}

impl BookingFeedDiff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(
        &mut self,
        snapshot: &[Booking],
        is_admin: bool,
        customer_phone: Option<&str>,
    ) -> Vec<FeedNotification> {
        let Some(previous) = self.previous.as_ref() else {
            self.previous = Some(snapshot.to_vec());
            return Vec::new();
        };

        let mut notifications = Vec::new();

        if is_admin && snapshot.len() > previous.len() {
            if let Some(newest) = snapshot.first() {
                if newest.status == BookingStatus::New {
                    notifications.push(FeedNotification {
                        kind: FeedNotificationKind::NewBooking,
                        booking_id: newest.booking_id.clone(),
                        status: newest.status,
                        message: format!(
                            "New booking #{} from {}.",
                            newest.booking_id, newest.customer_name
                        ),
                    });
                }
            }
        }

        if let Some(phone) = customer_phone.map(str::trim).filter(|value| !value.is_empty()) {
            let previous_status: HashMap<&str, BookingStatus> = previous
                .iter()
                .map(|booking| (booking.booking_id.as_str(), booking.status))
                .collect();

            for booking in snapshot.iter().filter(|booking| booking.phone == phone) {
                let Some(&old_status) = previous_status.get(booking.booking_id.as_str()) else {
                    continue;
                };
                if old_status != booking.status {
                    notifications.push(FeedNotification {
                        kind: FeedNotificationKind::StatusChanged,
                        booking_id: booking.booking_id.clone(),
                        status: booking.status,
                        message: status_message(booking.status).to_string(),
                    });
                }
            }
        }

        self.previous = Some(snapshot.to_vec());
        notifications
    }
}

/// Poll the bookings table and broadcast complete snapshots to all
/// subscribed notification streams. If the database is unreachable the feed
/// simply stays silent until the next poll; listeners see no errors.
pub async fn run_feed_watcher(state: AppState) {
    let Some(pool) = state.db_pool.clone() else {
        tracing::info!("Booking feed watcher disabled: no database configured");
        return;
    };

    let interval = Duration::from_secs(state.config.booking_feed_poll_interval_seconds.max(2));
    let limit = state.config.booking_feed_snapshot_limit;
    tracing::info!(interval_seconds = interval.as_secs(), "Booking feed watcher started");

    loop {
        sleep(interval).await;

        if state.feed_tx.receiver_count() == 0 {
            continue;
        }

        match fetch_snapshot(&pool, limit).await {
            Ok(snapshot) => {
                let _ = state.feed_tx.send(Arc::new(snapshot));
            }
            Err(error) => {
                tracing::debug!(error = %error, "Booking feed poll failed, will retry next tick");
            }
        }
    }
}

async fn fetch_snapshot(pool: &sqlx::PgPool, limit: i64) -> AppResult<Vec<Booking>> {
    let rows = list_rows(pool, "bookings", None, limit, 0, "timestamp", false).await?;
    Ok(rows
        .into_iter()
        .filter_map(|row| booking_from_row(row).ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{BookingFeedDiff, FeedNotificationKind};
    use crate::schemas::{Booking, BookingStatus, PaymentMethod};

    fn booking(id: &str, phone: &str, status: BookingStatus, minutes_ago: i64) -> Booking {
        Booking {
            booking_id: id.to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap()
                - chrono::Duration::minutes(minutes_ago),
            status,
            services: Vec::new(),
            payment_method: PaymentMethod::Cash,
            customer_name: format!("customer-{id}"),
            phone: phone.to_string(),
            address: "Cairo".to_string(),
            date: "2026-08-10".to_string(),
            time: "10:00".to_string(),
            email: None,
            notes: None,
            location: None,
            photos: Vec::new(),
            payment_proof: None,
            base_price: 100.0,
            final_price: 100.0,
            discount_amount: 0.0,
            advance_payment: 0.0,
        }
    }

    /// Newest first, as the watcher delivers them.
    fn baseline() -> Vec<Booking> {
        vec![
            booking("CM-3", "0111", BookingStatus::New, 1),
            booking("CM-2", "0102", BookingStatus::Confirmed, 10),
            booking("CM-1", "0101", BookingStatus::New, 20),
        ]
    }

    #[test]
    fn first_snapshot_only_seeds_the_baseline() {
        let mut diff = BookingFeedDiff::new();
        let notifications = diff.apply(&baseline(), true, Some("0101"));
        assert!(notifications.is_empty());
    }

    #[test]
    fn admin_gets_exactly_one_notification_for_a_new_booking() {
        let mut diff = BookingFeedDiff::new();
        diff.apply(&baseline(), true, None);

        let mut next = baseline();
        next.insert(0, booking("CM-4", "0104", BookingStatus::New, 0));
        let notifications = diff.apply(&next, true, None);

        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, FeedNotificationKind::NewBooking);
        assert_eq!(notifications[0].booking_id, "CM-4");
    }

    #[test]
    fn non_admin_listeners_get_no_new_booking_notification() {
        let mut diff = BookingFeedDiff::new();
        diff.apply(&baseline(), false, None);

        let mut next = baseline();
        next.insert(0, booking("CM-4", "0104", BookingStatus::New, 0));
        assert!(diff.apply(&next, false, None).is_empty());
    }

    #[test]
    fn unchanged_count_emits_no_new_booking_notification() {
        let mut diff = BookingFeedDiff::new();
        diff.apply(&baseline(), true, None);
        assert!(diff.apply(&baseline(), true, None).is_empty());
    }

    #[test]
    fn status_change_notifies_only_the_matching_phone() {
        let mut diff = BookingFeedDiff::new();
        diff.apply(&baseline(), false, Some("0101"));

        // CM-1 (phone 0101) moves new -> confirmed; CM-2 (phone 0102) moves too.
        let next = vec![
            booking("CM-3", "0111", BookingStatus::New, 1),
            booking("CM-2", "0102", BookingStatus::Completed, 10),
            booking("CM-1", "0101", BookingStatus::Confirmed, 20),
        ];
        let notifications = diff.apply(&next, false, Some("0101"));

        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, FeedNotificationKind::StatusChanged);
        assert_eq!(notifications[0].booking_id, "CM-1");
        assert_eq!(notifications[0].status, BookingStatus::Confirmed);
        assert!(notifications[0].message.contains("confirmed"));
    }

    #[test]
    fn new_booking_and_status_change_can_fire_on_the_same_snapshot() {
        let mut diff = BookingFeedDiff::new();
        diff.apply(&baseline(), true, Some("0101"));

        let next = vec![
            booking("CM-4", "0104", BookingStatus::New, 0),
            booking("CM-3", "0111", BookingStatus::New, 1),
            booking("CM-2", "0102", BookingStatus::Confirmed, 10),
            booking("CM-1", "0101", BookingStatus::InProgress, 20),
        ];
        let notifications = diff.apply(&next, true, Some("0101"));
        assert_eq!(notifications.len(), 2);
    }

    #[test]
    fn baseline_is_replaced_even_without_notifications() {
        let mut diff = BookingFeedDiff::new();
        diff.apply(&baseline(), false, None);

        let mut grown = baseline();
        grown.insert(0, booking("CM-4", "0104", BookingStatus::New, 0));
        // Non-admin: nothing emitted, but the baseline must advance.
        assert!(diff.apply(&grown, false, None).is_empty());

        // Same snapshot again as admin: count did not increase vs. stored
        // baseline, so still nothing.
        assert!(diff.apply(&grown, true, None).is_empty());
    }
}
