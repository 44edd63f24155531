/// Service configuration.
///
/// Settings come from an optional TOML file (`brroyale.toml` by default);
/// every field has a default, so a missing file means "run with defaults".
/// The NOAA credential is never stored in the file: it is read from the
/// `NOAA_TOKEN` environment variable after loading a `.env` file.

use crate::alert::storms::DEFAULT_STORM_THRESHOLD_IN;
use crate::ingest::noaa::PAGE_LIMIT;
use crate::model::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the CDO API token.
pub const TOKEN_ENV: &str = "NOAA_TOKEN";

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "brroyale.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// CDO `/data` endpoint.
    pub base_url: String,
    pub dataset_id: String,
    /// `standard` returns inches and °F.
    pub units: String,
    /// Rows per page; the CDO API caps this at 1000.
    pub page_size: usize,
    /// Minimum spacing between any two API requests.
    pub rate_limit_ms: u64,
    pub request_timeout_secs: u64,
    /// 24h snowfall (inches) at or above which a storm event is emitted.
    pub storm_threshold_in: f64,
    pub cities_path: PathBuf,
    pub output_dir: PathBuf,
    pub history_start_season: i32,
    pub history_end_season: i32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.ncei.noaa.gov/cdo-web/api/v2/data".to_string(),
            dataset_id: crate::model::DATASET_GHCND.to_string(),
            units: "standard".to_string(),
            page_size: PAGE_LIMIT,
            rate_limit_ms: 260,
            request_timeout_secs: 30,
            storm_threshold_in: DEFAULT_STORM_THRESHOLD_IN,
            cities_path: PathBuf::from("data/cities.json"),
            output_dir: PathBuf::from("public/data"),
            history_start_season: 2005,
            history_end_season: 2025,
        }
    }
}

impl ServiceConfig {
    /// Loads the config file at `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        let config = Self::from_toml(&text)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Rejects settings that would make a run meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut issues: Vec<String> = Vec::new();

        if self.page_size == 0 || self.page_size > PAGE_LIMIT {
            issues.push(format!("page_size must be between 1 and {}", PAGE_LIMIT));
        }
        if self.request_timeout_secs == 0 {
            issues.push("request_timeout_secs must be > 0".into());
        }
        if !self.storm_threshold_in.is_finite() || self.storm_threshold_in < 0.0 {
            issues.push("storm_threshold_in must be a number >= 0".into());
        }
        if self.history_start_season > self.history_end_season {
            issues.push("history_start_season must be <= history_end_season".into());
        }
        if self.base_url.trim().is_empty() {
            issues.push("base_url must not be empty".into());
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(issues.join("; ")))
        }
    }

    pub fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Reads the API token, loading `.env` first if present.
///
/// Called before any work begins so a missing credential aborts the run.
pub fn load_token() -> Result<String, ConfigError> {
    dotenv::dotenv().ok();
    token_from(std::env::var(TOKEN_ENV).ok())
}

/// Validates a raw token value; blank counts as missing.
pub fn token_from(raw: Option<String>) -> Result<String, ConfigError> {
    match raw {
        Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        _ => Err(ConfigError::MissingToken),
    }
}
