//! Watermark selection for incremental runs
//!
//! Pure functions so the policy can be tested without a store.

use chrono::{DateTime, NaiveTime, Utc};

/// Pick the lower bound for the next listing.
///
/// # Arguments
/// * `latest` - Latest checkpoint for the owner (None on the first run)
/// * `now` - Current time
/// * `start_from` - Configured historical epoch for first runs
///
/// # Returns
/// `start_from` when there is no checkpoint, midnight UTC today when the
/// checkpoint is from today, otherwise the checkpoint itself. The mail
/// provider filters by day, so a same-day run always re-scans all of today.
pub fn resolve_watermark(
    latest: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    start_from: DateTime<Utc>,
) -> DateTime<Utc> {
    match latest {
        None => start_from,
        Some(checkpoint) if checkpoint.date_naive() == now.date_naive() => {
            now.date_naive().and_time(NaiveTime::MIN).and_utc()
        }
        Some(checkpoint) => checkpoint,
    }
}
