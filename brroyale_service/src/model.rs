/// Core data types for the Battle Brr-oyale leaderboard service.
///
/// This module defines the shared domain model imported by all other modules:
/// upstream observations, the city registry record, per-city metrics,
/// leaderboard rows and snapshots, the historical archive, and the error
/// enums. It contains no logic beyond small accessors.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Upstream identifiers
// ---------------------------------------------------------------------------

/// NOAA CDO dataset holding daily station summaries.
pub const DATASET_GHCND: &str = "GHCND";

/// Attribution written into the historical archive.
pub const ARCHIVE_SOURCE: &str = "NOAA NCEI (GHCND)";

/// The observation types this service queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Datatype {
    /// Daily snowfall, inches with `units=standard`.
    Snow,
    /// Daily minimum temperature, °F with `units=standard`.
    Tmin,
}

impl Datatype {
    /// The `datatypeid` query value understood by the CDO API.
    pub fn code(&self) -> &'static str {
        match self {
            Datatype::Snow => "SNOW",
            Datatype::Tmin => "TMIN",
        }
    }
}

impl std::fmt::Display for Datatype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

// ---------------------------------------------------------------------------
// Reading types
// ---------------------------------------------------------------------------

/// One daily reading from a GHCND station.
///
/// Corresponds to one entry of the `results[]` array of a CDO `/data`
/// response. Never mutated after parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct StationObservation {
    pub date: NaiveDate,
    pub datatype: Datatype,
    pub value: f64,
    pub station_id: String,
}

/// A city in the static registry (`cities.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub id: String,
    pub name: String,
    pub state: String,
    pub station_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Average seasonal snowfall in inches, if known.
    #[serde(default)]
    pub annual_average: Option<f64>,
    /// Coldest temperature ever recorded, °F, if known.
    #[serde(default)]
    pub all_time_low: Option<f64>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
}

impl City {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

// ---------------------------------------------------------------------------
// Derived metrics
// ---------------------------------------------------------------------------

/// Season snowfall for one city.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SnowTotals {
    /// Sum of positive daily values, one decimal.
    pub total_snow: f64,
    /// Most recent reading when it is from today or yesterday, else 0.
    pub last_24h: f64,
}

/// Season temperature extreme for one city.
///
/// Both fields are `None` when the station returned no observations.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ColdExtremes {
    pub lowest_temp: Option<i32>,
    pub record_date: Option<NaiveDate>,
}

/// A freshly aggregated metric bound to the city it was computed for.
#[derive(Debug, Clone, PartialEq)]
pub struct CityMetric<'a, M> {
    pub city: &'a City,
    pub metric: M,
}

// ---------------------------------------------------------------------------
// Leaderboard rows and snapshots
// ---------------------------------------------------------------------------

/// One row of a leaderboard. `F` carries the category-specific columns and
/// is flattened between `state` and `tags` in the JSON document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingEntry<F> {
    pub id: String,
    pub city: String,
    pub state: String,
    #[serde(flatten)]
    pub fields: F,
    pub tags: Vec<String>,
    pub rank: u32,
    /// 0 when the city was not on the previous leaderboard.
    pub previous_rank: u32,
}

/// Snow leaderboard columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnowFields {
    pub total_snow: f64,
    pub last_24h: f64,
    pub avg_annual: f64,
}

/// Cold leaderboard columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColdFields {
    pub lowest_temp: Option<i32>,
    pub lowest_windchill: Option<i32>,
    /// Display date such as "Jan 5, 2024", or "N/A".
    pub record_date: String,
    pub all_time_low: Option<f64>,
    pub all_time_windchill: Option<f64>,
}

/// A notable snowfall event on the national leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub city: String,
    pub state: String,
    pub snow_24h: f64,
    pub message: String,
}

/// A fully rebuilt leaderboard for one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardSnapshot<F> {
    /// ISO 8601 UTC timestamp with millisecond precision.
    pub last_updated: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storm_events: Option<Vec<AlertEvent>>,
    pub rankings: Vec<RankingEntry<F>>,
}

// ---------------------------------------------------------------------------
// Historical archive
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryMeta {
    pub generated_at: String,
    pub source: String,
    pub start_season: i32,
    pub end_season: i32,
}

/// Multi-season snowfall archive: city id → season-start year → inches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryArchive {
    pub meta: HistoryMeta,
    pub cities: BTreeMap<String, BTreeMap<String, f64>>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Transport-level failure talking to the CDO API.
///
/// Non-success statuses, malformed bodies and timeouts are not errors; the
/// client reports those as "no data" for the page.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request failed for {url}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to build HTTP client")]
    ClientBuild(#[source] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Failed to read city registry '{0}'")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse city registry '{0}'")]
    Parse(PathBuf, #[source] serde_json::Error),

    #[error("Duplicate city id '{0}' in registry")]
    DuplicateId(String),

    #[error("City '{0}' has no station id")]
    MissingStation(String),
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Failed to create output directory '{0}'")]
    CreateDir(PathBuf, #[source] std::io::Error),

    #[error("Failed to encode snapshot for '{0}'")]
    Encode(PathBuf, #[source] serde_json::Error),

    #[error("Failed to write snapshot '{0}'")]
    Write(PathBuf, #[source] std::io::Error),

    #[error("Failed to move snapshot into place at '{0}'")]
    Persist(PathBuf, #[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("NOAA_TOKEN environment variable is required (get one at https://www.ncdc.noaa.gov/cdo-web/token)")]
    MissingToken,

    #[error("Failed to read config file '{0}'")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse config file '{0}'")]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Any error that aborts a run.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}
