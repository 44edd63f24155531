/// Battle Brr-oyale leaderboard service.
///
/// Pulls daily snowfall and minimum temperature from the NOAA CDO API for a
/// registry of cities, ranks them into three leaderboards, and writes each
/// one as a JSON snapshot for the static site. A separate run backfills a
/// multi-season snowfall archive.

pub mod alert;
pub mod analysis;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod snapshot;
pub mod stations;
