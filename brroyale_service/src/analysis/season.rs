/// Snow season date windows.
///
/// A season runs from September 1 of year Y through April 30 of year Y+1
/// and is labeled by Y. The current season is open-ended: it runs from its
/// September 1 up to today.
///
/// # Clock injection
/// Functions take `today` instead of reading the clock, so the Jan–Aug vs
/// Sep–Dec boundary is testable.

use chrono::{Datelike, NaiveDate};

/// First month of a season.
pub const SEASON_START_MONTH: u32 = 9;

/// A closed date range queried from the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeasonWindow {
    /// Season label (start year).
    pub season: i32,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Label of the season `today` falls in (or follows, in May–August).
pub fn season_start_year(today: NaiveDate) -> i32 {
    if today.month() < SEASON_START_MONTH {
        today.year() - 1
    } else {
        today.year()
    }
}

/// Sep 1 of the current season through `today`.
pub fn current_season(today: NaiveDate) -> SeasonWindow {
    let season = season_start_year(today);
    SeasonWindow {
        season,
        start: september_first(season),
        end: today,
    }
}

/// Sep 1 of `season` through Apr 30 of the following year.
pub fn historical_season(season: i32) -> SeasonWindow {
    SeasonWindow {
        season,
        start: september_first(season),
        end: NaiveDate::from_ymd_opt(season + 1, 4, 30).unwrap_or(NaiveDate::MAX),
    }
}

fn september_first(year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, SEASON_START_MONTH, 1).unwrap_or(NaiveDate::MIN)
}
