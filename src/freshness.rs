//! Decide between a band's literal last setlist and a smart estimate.

use chrono::NaiveDate;
use tracing::warn;

use crate::models::SetlistType;

/// Default maximum age (days) for reusing the last setlist as-is.
pub const DEFAULT_THRESHOLD_DAYS: i64 = 15;

/// Choose the setlist type for a band whose last setlist is `age_days` old.
///
/// `force_smart` overrides the age check in both directions.  Without an
/// override a future-dated last setlist (negative age) is treated as stale.
pub fn decide(age_days: i64, threshold_days: i64, force_smart: Option<bool>) -> SetlistType {
    match force_smart {
        Some(true) => SetlistType::Estimated,
        Some(false) => SetlistType::Fresh,
        None if age_days < 0 => {
            warn!(
                "Last setlist is {} days in the future, treating as stale",
                -age_days
            );
            SetlistType::Estimated
        }
        None if age_days <= threshold_days => SetlistType::Fresh,
        None => SetlistType::Estimated,
    }
}

/// Whole days between `last_date` and `today` (negative when in the future).
pub fn setlist_age_days(last_date: NaiveDate, today: NaiveDate) -> i64 {
    (today - last_date).num_days()
}

/// Age as reported in results.
pub fn reported_age(age_days: i64) -> i64 {
    age_days.max(0)
}
