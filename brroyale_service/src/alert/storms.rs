//! Storm event detection.
//!
//! Alerts are recomputed from scratch on every run from the leaderboard just
//! built. There is no deduplication or cooldown across runs: a city that
//! keeps getting hammered shows up again the next day.

use crate::model::{AlertEvent, RankingEntry, SnowFields};

/// 24h snowfall in inches that counts as a storm.
pub const DEFAULT_STORM_THRESHOLD_IN: f64 = 4.0;

/// Ticker message for a storm event, e.g. `Buffalo just got 4" of fresh powder!`.
pub fn storm_message(city: &str, snow_24h: f64) -> String {
    format!("{} just got {}\" of fresh powder!", city, snow_24h)
}

/// Emits one alert per entry whose `last_24h` is at or above `threshold_in`,
/// in leaderboard order.
pub fn detect_storms(entries: &[RankingEntry<SnowFields>], threshold_in: f64) -> Vec<AlertEvent> {
    entries
        .iter()
        .filter(|e| e.fields.last_24h >= threshold_in)
        .map(|e| AlertEvent {
            city: e.city.clone(),
            state: e.state.clone(),
            snow_24h: e.fields.last_24h,
            message: storm_message(&e.city, e.fields.last_24h),
        })
        .collect()
}
