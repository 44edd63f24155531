/// Turning raw observations into leaderboards.
///
/// All functions here are pure: no I/O, and "today" is always passed in.
///
/// Submodules:
/// - `season`:    current and historical season date windows.
/// - `aggregate`: per-station snow and temperature aggregation.
/// - `ranking`:   ordering, dense ranks and previous-rank merging.

pub mod aggregate;
pub mod ranking;
pub mod season;
