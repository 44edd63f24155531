/// Integration tests for the update and history runs
///
/// These tests drive `pipeline::run_update` / `pipeline::run_history`
/// end to end against an in-memory CDO page source and a scratch output
/// directory, then inspect the JSON documents the static site would read.
///
/// They verify:
/// 1. Leaderboard ordering, ranks and storm events per category
/// 2. Rerun stability: previous_rank carries over, nothing else moves
/// 3. Per-city fetch failures degrade to neutral values
/// 4. Pagination through the configured page size
/// 5. Historical archive contents
///
/// Run with: cargo test --test pipeline_integration

use brroyale_service::config::ServiceConfig;
use brroyale_service::ingest::noaa::{DataQuery, PageSource};
use brroyale_service::model::{City, Datatype, FetchError, ServiceError, StationObservation};
use brroyale_service::pipeline::{run_history, run_update};
use brroyale_service::snapshot::SnapshotStore;
use brroyale_service::stations::Category;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

/// Serves canned station series, honouring date range, limit and offset.
#[derive(Default)]
struct FakeCdo {
    series: HashMap<(String, &'static str), Vec<StationObservation>>,
    failing: HashSet<String>,
    requests: Vec<(String, &'static str, usize)>,
}

impl FakeCdo {
    fn add(&mut self, station: &str, datatype: Datatype, readings: &[(NaiveDate, f64)]) {
        let rows = readings
            .iter()
            .map(|(date, value)| StationObservation {
                date: *date,
                datatype,
                value: *value,
                station_id: station.to_string(),
            })
            .collect();
        self.series.insert((station.to_string(), datatype.code()), rows);
    }

    fn requests_for(&self, station: &str) -> usize {
        self.requests.iter().filter(|(s, _, _)| s == station).count()
    }
}

impl PageSource for FakeCdo {
    fn fetch_page(
        &mut self,
        query: &DataQuery,
        limit: usize,
        offset: usize,
    ) -> Result<Option<Vec<StationObservation>>, FetchError> {
        self.requests
            .push((query.station_id.clone(), query.datatype.code(), offset));

        if self.failing.contains(&query.station_id) {
            return Err(transport_error());
        }

        let rows = self
            .series
            .get(&(query.station_id.clone(), query.datatype.code()))
            .map(|rows| {
                rows.iter()
                    .filter(|o| o.date >= query.start_date && o.date <= query.end_date)
                    .skip(offset - 1)
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(Some(rows))
    }
}

/// A real reqwest error that needs no network: the URL never parses.
fn transport_error() -> FetchError {
    let source = reqwest::blocking::Client::new()
        .get("not a url")
        .send()
        .unwrap_err();
    FetchError::Transport {
        url: "https://cdo.invalid/data".to_string(),
        source,
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 6, hour, 0, 0).unwrap()
}

const TODAY: (i32, u32, u32) = (2024, 1, 6);

fn today() -> NaiveDate {
    date(TODAY.0, TODAY.1, TODAY.2)
}

fn city(id: &str, state: &str, tags: &[&str], annual_average: Option<f64>, all_time_low: Option<f64>) -> City {
    let mut name = id.to_string();
    if let Some(first) = name.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    City {
        id: id.to_string(),
        name,
        state: state.to_string(),
        station_id: format!("GHCND:{}", id.to_uppercase()),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        annual_average,
        all_time_low,
        lat: None,
        lon: None,
    }
}

fn registry() -> Vec<City> {
    vec![
        city("buffalo", "NY", &["US_Top10", "NY_Top10"], Some(95.4), Some(-20.0)),
        city("erie", "PA", &["US_Top10"], Some(101.1), Some(-18.0)),
        city("syracuse", "NY", &["US_Top10", "NY_Top10"], Some(127.8), Some(-26.0)),
        city("albany", "NY", &["NY_Top10"], Some(59.2), Some(-28.0)),
        city("duluth", "MN", &["Coldest_Cities"], Some(90.2), Some(-41.0)),
        city("fargo", "ND", &["Coldest_Cities"], Some(50.1), Some(-48.0)),
        city("fairbanks", "AK", &["Coldest_Cities"], None, Some(-66.0)),
    ]
}

/// Buffalo leads with a fresh storm, Syracuse second, Erie third with
/// nothing recent, Albany silent. Fargo coldest, Duluth next, Fairbanks
/// offline.
fn season_source() -> FakeCdo {
    let mut cdo = FakeCdo::default();
    cdo.add(
        "GHCND:BUFFALO",
        Datatype::Snow,
        &[(date(2023, 12, 1), 20.0), (date(2024, 1, 2), 10.0), (date(2024, 1, 5), 6.5)],
    );
    cdo.add(
        "GHCND:SYRACUSE",
        Datatype::Snow,
        &[(date(2023, 11, 20), 12.0), (date(2023, 12, 24), 3.3), (date(2024, 1, 6), 3.9)],
    );
    cdo.add("GHCND:ERIE", Datatype::Snow, &[(date(2023, 12, 10), 9.0), (date(2024, 1, 1), 4.5)]);
    cdo.add(
        "GHCND:DULUTH",
        Datatype::Tmin,
        &[(date(2023, 12, 30), -12.0), (date(2024, 1, 3), -21.4), (date(2024, 1, 4), -3.0)],
    );
    cdo.add(
        "GHCND:FARGO",
        Datatype::Tmin,
        &[(date(2023, 12, 18), -30.0), (date(2024, 1, 2), -30.0), (date(2024, 1, 5), -7.0)],
    );
    cdo
}

fn read_json(path: &Path) -> Value {
    let text = std::fs::read_to_string(path).unwrap_or_else(|e| panic!("reading {}: {}", path.display(), e));
    serde_json::from_str(&text).unwrap()
}

fn board(store: &SnapshotStore, category: Category) -> Value {
    read_json(&store.path_for(category))
}

fn ids(doc: &Value) -> Vec<String> {
    doc["rankings"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_str().unwrap().to_string())
        .collect()
}

fn ranks_by_id(doc: &Value) -> HashMap<String, u64> {
    doc["rankings"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| (e["id"].as_str().unwrap().to_string(), e["rank"].as_u64().unwrap()))
        .collect()
}

/// Drops `last_updated` (and optionally `previous_rank`) for comparisons.
fn strip_volatile(mut doc: Value, previous_rank: bool) -> Value {
    if let Some(obj) = doc.as_object_mut() {
        obj.remove("last_updated");
    }
    if previous_rank {
        if let Some(rows) = doc["rankings"].as_array_mut() {
            for row in rows {
                if let Some(obj) = row.as_object_mut() {
                    obj.remove("previous_rank");
                }
            }
        }
    }
    doc
}

// ---------------------------------------------------------------------------
// Update run
// ---------------------------------------------------------------------------

#[test]
fn test_update_writes_all_three_leaderboards() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    let cities = registry();
    let mut cdo = season_source();

    let report = run_update(&ServiceConfig::default(), &cities, &mut cdo, &store, today(), at(12)).unwrap();

    assert_eq!(report.written.len(), 3);
    for category in Category::ALL {
        assert!(store.path_for(category).exists(), "{} snapshot missing", category);
    }

    let national = board(&store, Category::NationalSnow);
    assert_eq!(national["last_updated"], "2024-01-06T12:00:00.000Z");
    assert_eq!(ids(&national), vec!["buffalo", "syracuse", "erie"]);
    let top = &national["rankings"][0];
    assert_eq!(top["city"], "Buffalo");
    assert_eq!(top["total_snow"], 36.5);
    assert_eq!(top["last_24h"], 6.5);
    assert_eq!(top["avg_annual"], 95.4);
    assert_eq!(top["rank"], 1);
    assert_eq!(top["previous_rank"], 0);
    // Erie's last reading is five days old
    assert_eq!(national["rankings"][2]["last_24h"], 0.0);

    let regional = board(&store, Category::RegionalSnow);
    assert_eq!(ids(&regional), vec!["buffalo", "syracuse", "albany"]);
    assert_eq!(regional["rankings"][2]["total_snow"], 0.0);
}

#[test]
fn test_storm_events_only_on_national_board() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    let cities = registry();
    let mut cdo = season_source();

    let report = run_update(&ServiceConfig::default(), &cities, &mut cdo, &store, today(), at(12)).unwrap();

    // Syracuse's 3.9" is just under the line
    assert_eq!(report.storm_events.len(), 1);
    let national = board(&store, Category::NationalSnow);
    let events = national["storm_events"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["city"], "Buffalo");
    assert_eq!(events[0]["state"], "NY");
    assert_eq!(events[0]["snow_24h"], 6.5);
    assert_eq!(events[0]["message"], "Buffalo just got 6.5\" of fresh powder!");

    assert!(board(&store, Category::RegionalSnow).get("storm_events").is_none());
    assert!(board(&store, Category::Cold).get("storm_events").is_none());
}

#[test]
fn test_cold_board_orders_coldest_first_with_offline_city_last() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    let cities = registry();
    let mut cdo = season_source();

    run_update(&ServiceConfig::default(), &cities, &mut cdo, &store, today(), at(12)).unwrap();

    let cold = board(&store, Category::Cold);
    assert_eq!(ids(&cold), vec!["fargo", "duluth", "fairbanks"]);

    let fargo = &cold["rankings"][0];
    assert_eq!(fargo["lowest_temp"], -30);
    assert_eq!(fargo["lowest_windchill"], -35);
    // first occurrence of the repeated minimum
    assert_eq!(fargo["record_date"], "Dec 18, 2023");
    assert_eq!(fargo["all_time_low"], -48.0);
    assert_eq!(fargo["all_time_windchill"], -58.0);

    assert_eq!(cold["rankings"][1]["lowest_temp"], -21);

    let fairbanks = &cold["rankings"][2];
    assert!(fairbanks["lowest_temp"].is_null());
    assert!(fairbanks["lowest_windchill"].is_null());
    assert_eq!(fairbanks["record_date"], "N/A");
    assert_eq!(fairbanks["rank"], 3);
}

#[test]
fn test_snow_fetched_once_per_city_across_both_snow_boards() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    let cities = registry();
    let mut cdo = season_source();

    run_update(&ServiceConfig::default(), &cities, &mut cdo, &store, today(), at(12)).unwrap();

    // Buffalo sits on both snow boards but is only queried once (one short page)
    assert_eq!(cdo.requests_for("GHCND:BUFFALO"), 1);
    // cold-only cities are never asked for snow
    assert!(cdo
        .requests
        .iter()
        .all(|(station, datatype, _)| !(station == "GHCND:FARGO" && *datatype == "SNOW")));
}

#[test]
fn test_each_board_queries_the_datatype_it_ranks() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    let cities = registry();
    let mut cdo = season_source();

    run_update(&ServiceConfig::default(), &cities, &mut cdo, &store, today(), at(12)).unwrap();

    let datatypes_for = |station: &str| -> HashSet<&'static str> {
        cdo.requests
            .iter()
            .filter(|(s, _, _)| s == station)
            .map(|(_, datatype, _)| *datatype)
            .collect()
    };
    for snow_only in ["GHCND:BUFFALO", "GHCND:ERIE", "GHCND:ALBANY"] {
        assert_eq!(datatypes_for(snow_only), HashSet::from(["SNOW"]), "{}", snow_only);
    }
    for cold_only in ["GHCND:DULUTH", "GHCND:FARGO", "GHCND:FAIRBANKS"] {
        assert_eq!(datatypes_for(cold_only), HashSet::from(["TMIN"]), "{}", cold_only);
    }
}

#[test]
fn test_small_page_size_pages_through_whole_season() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    let cities = registry();
    let mut cdo = season_source();
    let config = ServiceConfig {
        page_size: 2,
        ..ServiceConfig::default()
    };

    run_update(&config, &cities, &mut cdo, &store, today(), at(12)).unwrap();

    // three readings at two per page: offsets 1 and 3
    let buffalo: Vec<usize> = cdo
        .requests
        .iter()
        .filter(|(s, _, _)| s == "GHCND:BUFFALO")
        .map(|(_, _, offset)| *offset)
        .collect();
    assert_eq!(buffalo, vec![1, 3]);
    assert_eq!(board(&store, Category::NationalSnow)["rankings"][0]["total_snow"], 36.5);
}

#[test]
fn test_rerun_carries_ranks_forward_and_is_otherwise_identical() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    let cities = registry();
    let config = ServiceConfig::default();

    run_update(&config, &cities, &mut season_source(), &store, today(), at(12)).unwrap();
    let first: Vec<Value> = Category::ALL.iter().map(|c| board(&store, *c)).collect();

    run_update(&config, &cities, &mut season_source(), &store, today(), at(13)).unwrap();
    let second: Vec<Value> = Category::ALL.iter().map(|c| board(&store, *c)).collect();

    run_update(&config, &cities, &mut season_source(), &store, today(), at(14)).unwrap();
    let third: Vec<Value> = Category::ALL.iter().map(|c| board(&store, *c)).collect();

    for ((run1, run2), run3) in first.iter().zip(&second).zip(&third) {
        let ranks = ranks_by_id(run1);
        for row in run2["rankings"].as_array().unwrap() {
            let id = row["id"].as_str().unwrap();
            assert_eq!(row["previous_rank"].as_u64(), ranks.get(id).copied());
        }
        assert_eq!(strip_volatile(run1.clone(), true), strip_volatile(run2.clone(), true));
        assert_eq!(strip_volatile(run2.clone(), false), strip_volatile(run3.clone(), false));
        assert_ne!(run2["last_updated"], run3["last_updated"]);
    }
}

#[test]
fn test_rank_movement_recorded_against_previous_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    let cities = registry();
    let config = ServiceConfig::default();

    run_update(&config, &cities, &mut season_source(), &store, today(), at(12)).unwrap();

    // Erie gets buried overnight and jumps from 3rd to 1st
    let mut cdo = season_source();
    cdo.add("GHCND:ERIE", Datatype::Snow, &[(date(2023, 12, 10), 9.0), (date(2024, 1, 6), 40.0)]);
    run_update(&config, &cities, &mut cdo, &store, today(), at(13)).unwrap();

    let national = board(&store, Category::NationalSnow);
    let erie = &national["rankings"][0];
    assert_eq!(erie["id"], "erie");
    assert_eq!(erie["rank"], 1);
    assert_eq!(erie["previous_rank"], 3);
}

#[test]
fn test_failing_station_is_ranked_with_neutral_values() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    let cities = registry();
    let mut cdo = season_source();
    cdo.failing.insert("GHCND:BUFFALO".to_string());
    cdo.failing.insert("GHCND:FARGO".to_string());

    let report = run_update(&ServiceConfig::default(), &cities, &mut cdo, &store, today(), at(12)).unwrap();
    assert!(report.storm_events.is_empty());

    let national = board(&store, Category::NationalSnow);
    assert_eq!(ids(&national), vec!["syracuse", "erie", "buffalo"]);
    assert_eq!(national["rankings"][2]["total_snow"], 0.0);
    assert_eq!(national["storm_events"], Value::Array(Vec::new()));

    let cold = board(&store, Category::Cold);
    assert_eq!(ids(&cold), vec!["duluth", "fargo", "fairbanks"]);
    assert!(cold["rankings"][1]["lowest_temp"].is_null());
}

#[test]
fn test_corrupt_previous_snapshot_does_not_stop_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    std::fs::write(store.path_for(Category::NationalSnow), "<html>502 Bad Gateway</html>").unwrap();

    run_update(&ServiceConfig::default(), &registry(), &mut season_source(), &store, today(), at(12)).unwrap();

    let national = board(&store, Category::NationalSnow);
    for row in national["rankings"].as_array().unwrap() {
        assert_eq!(row["previous_rank"], 0);
    }
}

#[test]
fn test_unwritable_output_dir_aborts_with_snapshot_error() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();
    let store = SnapshotStore::new(blocker.join("data"));

    let result = run_update(&ServiceConfig::default(), &registry(), &mut season_source(), &store, today(), at(12));
    assert!(matches!(result, Err(ServiceError::Snapshot(_))), "got {:?}", result.err());
}

// ---------------------------------------------------------------------------
// History run
// ---------------------------------------------------------------------------

#[test]
fn test_history_archive_lists_seasons_with_data() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    let cities = registry();

    let mut cdo = FakeCdo::default();
    cdo.add(
        "GHCND:BUFFALO",
        Datatype::Snow,
        &[
            (date(2020, 12, 1), 30.25),
            (date(2021, 2, 1), 50.0),
            // outside every Sep-Apr window
            (date(2021, 7, 1), 99.0),
            (date(2022, 1, 15), 0.0),
        ],
    );

    let archive = run_history(&ServiceConfig::default(), &cities, &mut cdo, &store, 2020, 2022, at(12)).unwrap();

    assert_eq!(archive.meta.source, "NOAA NCEI (GHCND)");
    assert_eq!(archive.meta.start_season, 2020);
    assert_eq!(archive.meta.end_season, 2022);
    assert_eq!(archive.meta.generated_at, "2024-01-06T12:00:00.000Z");

    let buffalo = &archive.cities["buffalo"];
    assert_eq!(buffalo.get("2020"), Some(&80.3));
    assert_eq!(buffalo.get("2021"), Some(&0.0));
    assert_eq!(buffalo.get("2022"), None);

    // no annual average, no history
    assert!(!archive.cities.contains_key("fairbanks"));
    // tracked but silent: present with no seasons
    assert!(archive.cities["erie"].is_empty());

    let doc = read_json(&store.history_path());
    assert_eq!(doc["cities"]["buffalo"]["2020"], 80.3);
    assert_eq!(doc["meta"]["source"], "NOAA NCEI (GHCND)");
}

#[test]
fn test_history_rejects_inverted_season_range() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    let result = run_history(
        &ServiceConfig::default(),
        &registry(),
        &mut FakeCdo::default(),
        &store,
        2022,
        2020,
        at(12),
    );
    assert!(matches!(result, Err(ServiceError::Config(_))));
    assert!(!store.history_path().exists());
}
