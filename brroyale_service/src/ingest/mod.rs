/// Upstream data ingestion.
///
/// Submodules:
/// - `noaa`:     NOAA CDO `/data` client, page source trait and paginator.
/// - `throttle`: request spacing shared by every call to the API.

pub mod noaa;
pub mod throttle;
