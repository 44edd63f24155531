/// City registry for the leaderboard service.
///
/// Loads the canonical list of tracked cities (`cities.json`), each bound to
/// one GHCND station, and answers which cities belong to which leaderboard.
/// This is the single source of truth for station ids; other modules take
/// cities from here rather than hardcoding identifiers.

use crate::analysis::ranking::MetricKind;
use crate::model::{City, RegistryError};
use log::info;
use std::collections::HashSet;
use std::path::Path;

// ---------------------------------------------------------------------------
// Category tags
// ---------------------------------------------------------------------------

/// National snowfall leaderboard membership.
pub const TAG_NATIONAL: &str = "US_Top10";

/// New York state snowfall leaderboard membership.
pub const TAG_REGIONAL: &str = "NY_Top10";

/// Coldest-cities leaderboard membership.
pub const TAG_COLD: &str = "Coldest_Cities";

/// One published leaderboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    NationalSnow,
    RegionalSnow,
    Cold,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::NationalSnow, Category::RegionalSnow, Category::Cold];

    /// Registry tag selecting the members of this leaderboard.
    pub fn tag(&self) -> &'static str {
        match self {
            Category::NationalSnow => TAG_NATIONAL,
            Category::RegionalSnow => TAG_REGIONAL,
            Category::Cold => TAG_COLD,
        }
    }

    /// Well-known snapshot file name inside the output directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            Category::NationalSnow => "season_current.json",
            Category::RegionalSnow => "snowfall_ny.json",
            Category::Cold => "coldest_cities.json",
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            Category::NationalSnow | Category::RegionalSnow => MetricKind::Snow,
            Category::Cold => MetricKind::Cold,
        }
    }

    /// Only the national board publishes storm events.
    pub fn publishes_storms(&self) -> bool {
        matches!(self, Category::NationalSnow)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::NationalSnow => write!(f, "national snow"),
            Category::RegionalSnow => write!(f, "regional snow"),
            Category::Cold => write!(f, "cold"),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Reads and validates the registry file.
pub fn load_cities(path: &Path) -> Result<Vec<City>, RegistryError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| RegistryError::Read(path.to_path_buf(), e))?;
    let cities: Vec<City> = serde_json::from_str(&text)
        .map_err(|e| RegistryError::Parse(path.to_path_buf(), e))?;
    validate_registry(&cities)?;
    info!("Loaded {} cities from {}", cities.len(), path.display());
    Ok(cities)
}

/// Rejects duplicate ids and cities without a station.
pub fn validate_registry(cities: &[City]) -> Result<(), RegistryError> {
    let mut seen = HashSet::new();
    for city in cities {
        if !seen.insert(city.id.as_str()) {
            return Err(RegistryError::DuplicateId(city.id.clone()));
        }
        if city.station_id.trim().is_empty() {
            return Err(RegistryError::MissingStation(city.id.clone()));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Members of a leaderboard, in registry order.
pub fn cities_in(cities: &[City], category: Category) -> Vec<&City> {
    cities.iter().filter(|c| c.has_tag(category.tag())).collect()
}

/// Every city on either snow leaderboard, each listed once.
pub fn snow_cities(cities: &[City]) -> Vec<&City> {
    cities
        .iter()
        .filter(|c| c.has_tag(TAG_NATIONAL) || c.has_tag(TAG_REGIONAL))
        .collect()
}

/// Cities with a known seasonal average, the targets of the history backfill.
pub fn history_cities(cities: &[City]) -> Vec<&City> {
    cities.iter().filter(|c| c.annual_average.is_some()).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
