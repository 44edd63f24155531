/// Batch runs of the leaderboard service.
///
/// `run_update` rebuilds the three current-season leaderboards; `run_history`
/// backfills the multi-season snowfall archive. Both are strictly
/// sequential: one city at a time, one page at a time, through a single
/// `PageSource`.
///
/// A city whose fetch fails is logged and ranked with neutral values, so an
/// upstream outage degrades the leaderboard instead of aborting the run.
/// Only snapshot write failures abort, and files already written for
/// earlier categories stay on disk.

use crate::alert::storms::detect_storms;
use crate::analysis::aggregate::{aggregate_cold, aggregate_snow, season_total};
use crate::analysis::ranking::{rank, Metric};
use crate::analysis::season::{current_season, historical_season, SeasonWindow};
use crate::config::ServiceConfig;
use crate::ingest::noaa::{collect_series, DataQuery, PageSource};
use crate::logging::{log_fetch_failure, log_run_summary};
use crate::model::{
    AlertEvent, City, CityMetric, ColdExtremes, ConfigError, Datatype, HistoryArchive,
    HistoryMeta, LeaderboardSnapshot, RankingEntry, ServiceError, SnowTotals,
    StationObservation, ARCHIVE_SOURCE,
};
use crate::snapshot::SnapshotStore;
use crate::stations::{cities_in, history_cities, snow_cities, Category};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use log::{debug, info};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// ISO 8601 UTC timestamp with milliseconds, e.g. `2024-01-06T12:00:00.000Z`.
pub fn iso_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// What an update run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateReport {
    /// Snapshot files written, in category order.
    pub written: Vec<PathBuf>,
    pub storm_events: Vec<AlertEvent>,
}

// ---------------------------------------------------------------------------
// Fetching
// ---------------------------------------------------------------------------

/// Every observation of `datatype` for `city` in `window`.
///
/// Transport failures are logged and come back as an empty series, which
/// the aggregators turn into neutral values.
fn fetch_city<S: PageSource + ?Sized>(
    source: &mut S,
    config: &ServiceConfig,
    datatype: Datatype,
    city: &City,
    window: &SeasonWindow,
) -> Vec<StationObservation> {
    let query = DataQuery::new(config, datatype, &city.station_id, window.start, window.end);
    match collect_series(source, &query, config.page_size) {
        Ok(observations) => {
            debug!("{}: {} {} observations", city.name, observations.len(), datatype);
            observations
        }
        Err(e) => {
            log_fetch_failure(&city.station_id, &format!("{} fetch for {}", datatype, city.name), &e);
            Vec::new()
        }
    }
}

// ---------------------------------------------------------------------------
// Update run
// ---------------------------------------------------------------------------

fn publish<F: Serialize>(
    store: &SnapshotStore,
    category: Category,
    rankings: Vec<RankingEntry<F>>,
    storm_events: Option<Vec<AlertEvent>>,
    last_updated: &str,
) -> Result<PathBuf, ServiceError> {
    let snapshot = LeaderboardSnapshot {
        last_updated: last_updated.to_string(),
        storm_events,
        rankings,
    };
    Ok(store.write(category, &snapshot)?)
}

/// Rebuilds every current-season leaderboard.
///
/// Snow is fetched once per city and shared by the national and regional
/// boards; minimum temperatures are fetched for the cold board afterwards.
/// Each board is ranked against its own previous snapshot, read just before
/// that board is written.
pub fn run_update<S: PageSource + ?Sized>(
    config: &ServiceConfig,
    cities: &[City],
    source: &mut S,
    store: &SnapshotStore,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Result<UpdateReport, ServiceError> {
    let window = current_season(today);
    let last_updated = iso_timestamp(now);
    info!(
        "Updating leaderboards for season {} ({} to {})",
        window.season, window.start, window.end
    );

    let mut report = UpdateReport {
        written: Vec::new(),
        storm_events: Vec::new(),
    };

    // --- Snow -------------------------------------------------------------
    let snow_datatype = SnowTotals::KIND.datatype();
    let mut snow: HashMap<&str, (SnowTotals, bool)> = HashMap::new();
    for city in snow_cities(cities) {
        let observations = fetch_city(source, config, snow_datatype, city, &window);
        let totals = aggregate_snow(&observations, today);
        debug!("{}: {}\" season, {}\" last 24h", city.name, totals.total_snow, totals.last_24h);
        snow.insert(city.id.as_str(), (totals, !observations.is_empty()));
    }

    for category in [Category::NationalSnow, Category::RegionalSnow] {
        let members = cities_in(cities, category);
        let with_data = members
            .iter()
            .filter(|c| snow.get(c.id.as_str()).is_some_and(|(_, has_data)| *has_data))
            .count();
        let metrics: Vec<CityMetric<SnowTotals>> = members
            .iter()
            .map(|c| CityMetric {
                city: *c,
                metric: snow.get(c.id.as_str()).map(|(t, _)| *t).unwrap_or_default(),
            })
            .collect();

        let previous = store.read_previous_ranks(category);
        let rankings = rank(metrics, &previous);
        let storms = category
            .publishes_storms()
            .then(|| detect_storms(&rankings, config.storm_threshold_in));
        if let Some(events) = &storms {
            for event in events {
                info!("Storm: {}", event.message);
            }
            report.storm_events.extend(events.iter().cloned());
        }

        report.written.push(publish(store, category, rankings, storms, &last_updated)?);
        log_run_summary(&category.to_string(), members.len(), with_data);
    }

    // --- Cold -------------------------------------------------------------
    let category = Category::Cold;
    let members = cities_in(cities, category);
    let cold_datatype = category.kind().datatype();
    let mut with_data = 0;
    let mut metrics = Vec::with_capacity(members.len());
    for city in &members {
        let observations = fetch_city(source, config, cold_datatype, city, &window);
        if !observations.is_empty() {
            with_data += 1;
        }
        let metric: ColdExtremes = aggregate_cold(&observations);
        metrics.push(CityMetric { city: *city, metric });
    }

    let previous = store.read_previous_ranks(category);
    let rankings = rank(metrics, &previous);
    report.written.push(publish(store, category, rankings, None, &last_updated)?);
    log_run_summary(&category.to_string(), members.len(), with_data);

    Ok(report)
}

// ---------------------------------------------------------------------------
// History run
// ---------------------------------------------------------------------------

/// Fetches season totals for `start_season..=end_season` for every city with
/// a known annual average and writes the archive.
///
/// Seasons without any observations are left out of that city's map.
pub fn run_history<S: PageSource + ?Sized>(
    config: &ServiceConfig,
    cities: &[City],
    source: &mut S,
    store: &SnapshotStore,
    start_season: i32,
    end_season: i32,
    now: DateTime<Utc>,
) -> Result<HistoryArchive, ServiceError> {
    if start_season > end_season {
        return Err(ConfigError::Invalid(format!(
            "start season {} is after end season {}",
            start_season, end_season
        ))
        .into());
    }

    let targets = history_cities(cities);
    info!(
        "Fetching seasons {}-{} through {}-{} for {} cities",
        start_season,
        start_season + 1,
        end_season,
        end_season + 1,
        targets.len()
    );

    let mut archive_cities = BTreeMap::new();
    let mut with_data = 0;
    for city in &targets {
        let mut seasons = BTreeMap::new();
        for season in start_season..=end_season {
            let window = historical_season(season);
            let observations = fetch_city(source, config, SnowTotals::KIND.datatype(), city, &window);
            match season_total(&observations) {
                Some(total) => {
                    debug!("{} season {}-{}: {}\"", city.name, season, season + 1, total);
                    seasons.insert(season.to_string(), total);
                }
                None => debug!("{} season {}-{}: no data", city.name, season, season + 1),
            }
        }
        if !seasons.is_empty() {
            with_data += 1;
        }
        archive_cities.insert(city.id.clone(), seasons);
    }

    let archive = HistoryArchive {
        meta: HistoryMeta {
            generated_at: iso_timestamp(now),
            source: ARCHIVE_SOURCE.to_string(),
            start_season,
            end_season,
        },
        cities: archive_cities,
    };
    store.write_history(&archive)?;
    log_run_summary("history", targets.len(), with_data);

    Ok(archive)
}
