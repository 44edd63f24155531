/// Notable-event detection on freshly ranked leaderboards.
///
/// Submodules:
/// - `storms`: fresh-snowfall alerts for the national snow leaderboard.

pub mod storms;
