/// Per-station aggregation.
///
/// Reduces one station's observations for a window to the metric its
/// leaderboard ranks on. An empty observation list is a normal outcome
/// (station offline, nothing reported yet) and yields neutral values rather
/// than an error.

use crate::model::{ColdExtremes, SnowTotals, StationObservation};
use chrono::{Duration, NaiveDate};

// ---------------------------------------------------------------------------
// Rounding
// ---------------------------------------------------------------------------

/// Rounds half-up (toward +∞) to `decimals` places, e.g. -2.5 → -2.
pub fn round_half_up(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale + 0.5).floor() / scale
}

// ---------------------------------------------------------------------------
// Snow
// ---------------------------------------------------------------------------

fn positive_sum(observations: &[StationObservation]) -> f64 {
    observations.iter().map(|o| o.value).filter(|v| *v > 0.0).sum()
}

/// Season snowfall and most recent daily value.
///
/// `last_24h` is taken from the chronologically last observation, and only
/// when that observation is dated today or yesterday. Dates compare without
/// time of day.
pub fn aggregate_snow(observations: &[StationObservation], today: NaiveDate) -> SnowTotals {
    let total_snow = round_half_up(positive_sum(observations), 1);

    // max_by_key keeps the last of equally dated readings, as a stable sort would
    let last_24h = match observations.iter().max_by_key(|o| o.date) {
        Some(latest) if latest.date >= today - Duration::days(1) && latest.value > 0.0 => {
            round_half_up(latest.value, 1)
        }
        _ => 0.0,
    };

    SnowTotals { total_snow, last_24h }
}

/// Total snowfall of a closed historical window, `None` when the station
/// reported nothing at all for it.
pub fn season_total(observations: &[StationObservation]) -> Option<f64> {
    if observations.is_empty() {
        None
    } else {
        Some(round_half_up(positive_sum(observations), 1))
    }
}

// ---------------------------------------------------------------------------
// Temperature
// ---------------------------------------------------------------------------

/// Lowest reading of the window and the date it occurred.
///
/// The first occurrence wins when the minimum repeats.
pub fn aggregate_cold(observations: &[StationObservation]) -> ColdExtremes {
    let mut lowest: Option<&StationObservation> = None;
    for obs in observations.iter().filter(|o| o.value.is_finite()) {
        if lowest.is_none_or(|l| obs.value < l.value) {
            lowest = Some(obs);
        }
    }

    match lowest {
        Some(obs) => ColdExtremes {
            lowest_temp: Some(round_half_up(obs.value, 0) as i32),
            record_date: Some(obs.date),
        },
        None => ColdExtremes::default(),
    }
}

/// Display form of a record date, e.g. "Jan 5, 2024".
pub fn format_record_date(date: Option<NaiveDate>) -> String {
    match date {
        Some(d) => d.format("%b %-d, %Y").to_string(),
        None => "N/A".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
