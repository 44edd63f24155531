/// NOAA Climate Data Online (CDO) API client
///
/// Retrieves daily GHCND station summaries (snowfall, minimum temperature)
/// from the CDO v2 `/data` endpoint. Results are paged: each request asks
/// for `limit` rows starting at a 1-based `offset`.
///
/// API Documentation: https://www.ncdc.noaa.gov/cdo-web/webservices/v2#data
/// Token request: https://www.ncdc.noaa.gov/cdo-web/token

use crate::config::ServiceConfig;
use crate::ingest::throttle::Throttle;
use crate::model::{Datatype, FetchError, StationObservation};
use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, warn};
use serde::Deserialize;
use std::time::Duration;

/// Largest page the CDO API will serve.
pub const PAGE_LIMIT: usize = 1000;

/// CDO offsets are 1-based.
pub const FIRST_OFFSET: usize = 1;

// ============================================================================
// Query
// ============================================================================

/// Parameters of one time-series request, minus paging.
#[derive(Debug, Clone, PartialEq)]
pub struct DataQuery {
    pub dataset_id: String,
    pub datatype: Datatype,
    pub station_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub units: String,
}

impl DataQuery {
    pub fn new(
        config: &ServiceConfig,
        datatype: Datatype,
        station_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            dataset_id: config.dataset_id.clone(),
            datatype,
            station_id: station_id.to_string(),
            start_date,
            end_date,
            units: config.units.clone(),
        }
    }

    /// Query-string pairs for one page.
    pub fn params(&self, limit: usize, offset: usize) -> Vec<(&'static str, String)> {
        vec![
            ("datasetid", self.dataset_id.clone()),
            ("datatypeid", self.datatype.code().to_string()),
            ("stationid", self.station_id.clone()),
            ("startdate", self.start_date.format("%Y-%m-%d").to_string()),
            ("enddate", self.end_date.format("%Y-%m-%d").to_string()),
            ("units", self.units.clone()),
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
        ]
    }
}

// ============================================================================
// CDO API Response Structures
// ============================================================================

/// `/data` response. An empty object `{}` means "no results".
#[derive(Debug, Deserialize)]
pub struct CdoDataResponse {
    #[serde(default)]
    pub results: Vec<CdoDataResult>,
}

/// Single daily value
#[derive(Debug, Deserialize)]
pub struct CdoDataResult {
    pub date: String, // "2024-01-05T00:00:00"
    pub datatype: String,
    pub station: String,
    pub value: f64,
    #[serde(default)]
    pub attributes: Option<String>,
}

/// Parses a `/data` body into observations.
///
/// Returns `Err` with a description when the body is not a CDO data
/// document or a row carries an unreadable date.
pub fn parse_data_response(
    body: &str,
    datatype: Datatype,
) -> Result<Vec<StationObservation>, String> {
    let response: CdoDataResponse =
        serde_json::from_str(body).map_err(|e| format!("malformed body: {}", e))?;

    response
        .results
        .into_iter()
        .map(|row| {
            let date = parse_cdo_date(&row.date)
                .ok_or_else(|| format!("malformed date '{}'", row.date))?;
            Ok(StationObservation {
                date,
                datatype,
                value: row.value,
                station_id: row.station,
            })
        })
        .collect()
}

/// CDO dates are local-midnight timestamps without offset; only the
/// calendar date matters.
pub fn parse_cdo_date(raw: &str) -> Option<NaiveDate> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .map(|dt| dt.date())
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
}

// ============================================================================
// Page source
// ============================================================================

/// Anything that can serve one page of a time series.
///
/// `Ok(None)` means "no data for this page" (non-success status, malformed
/// body, timeout) and ends pagination without failing the caller.
/// `Err` is reserved for transport failures.
pub trait PageSource {
    fn fetch_page(
        &mut self,
        query: &DataQuery,
        limit: usize,
        offset: usize,
    ) -> Result<Option<Vec<StationObservation>>, FetchError>;
}

/// Blocking CDO client. One request in flight at a time, spaced by the
/// configured rate limit.
pub struct NoaaClient {
    client: reqwest::blocking::Client,
    base_url: String,
    token: String,
    throttle: Throttle,
}

impl NoaaClient {
    pub fn new(
        base_url: &str,
        token: String,
        timeout: Duration,
        rate_limit: Duration,
    ) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("brroyale_service/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FetchError::ClientBuild)?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            token,
            throttle: Throttle::new(rate_limit),
        })
    }

    pub fn from_config(config: &ServiceConfig, token: String) -> Result<Self, FetchError> {
        Self::new(&config.base_url, token, config.request_timeout(), config.rate_limit())
    }
}

impl PageSource for NoaaClient {
    fn fetch_page(
        &mut self,
        query: &DataQuery,
        limit: usize,
        offset: usize,
    ) -> Result<Option<Vec<StationObservation>>, FetchError> {
        self.throttle.wait();
        debug!(
            "[{}] GET {} {} {}..{} offset={}",
            query.station_id, self.base_url, query.datatype, query.start_date, query.end_date, offset
        );

        let response = match self
            .client
            .get(&self.base_url)
            .header("token", &self.token)
            .query(&query.params(limit, offset))
            .send()
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                warn!("[{}] NOAA request timed out at offset {}", query.station_id, offset);
                return Ok(None);
            }
            Err(e) => {
                return Err(FetchError::Transport {
                    url: self.base_url.clone(),
                    source: e,
                });
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            warn!(
                "[{}] NOAA API error (HTTP {}): {}",
                query.station_id,
                status.as_u16(),
                body.chars().take(200).collect::<String>()
            );
            return Ok(None);
        }

        let body = match response.text() {
            Ok(body) => body,
            Err(e) => {
                warn!("[{}] NOAA response body unreadable: {}", query.station_id, e);
                return Ok(None);
            }
        };

        match parse_data_response(&body, query.datatype) {
            Ok(rows) => Ok(Some(rows)),
            Err(msg) => {
                warn!("[{}] NOAA response ignored: {}", query.station_id, msg);
                Ok(None)
            }
        }
    }
}

// ============================================================================
// Pagination
// ============================================================================

/// Lazy page-by-page view of one time series.
///
/// Stops after a short page, an empty page, a "no data" page, or the first
/// transport error (which is yielded once).
pub struct Pages<'a, S: PageSource + ?Sized> {
    source: &'a mut S,
    query: &'a DataQuery,
    limit: usize,
    offset: usize,
    done: bool,
}

impl<S: PageSource + ?Sized> Iterator for Pages<'_, S> {
    type Item = Result<Vec<StationObservation>, FetchError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.source.fetch_page(self.query, self.limit, self.offset) {
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Ok(Some(rows)) if rows.is_empty() => {
                self.done = true;
                None
            }
            Ok(Some(rows)) => {
                if rows.len() < self.limit {
                    self.done = true;
                } else {
                    self.offset += self.limit;
                }
                Some(Ok(rows))
            }
        }
    }
}

/// Starts paging through `query`, `limit` rows at a time.
pub fn fetch_series<'a, S: PageSource + ?Sized>(
    source: &'a mut S,
    query: &'a DataQuery,
    limit: usize,
) -> Pages<'a, S> {
    Pages {
        source,
        query,
        limit: limit.max(1),
        offset: FIRST_OFFSET,
        done: false,
    }
}

/// Drains every page of `query` into one list, in request order.
pub fn collect_series<S: PageSource + ?Sized>(
    source: &mut S,
    query: &DataQuery,
    limit: usize,
) -> Result<Vec<StationObservation>, FetchError> {
    let mut all = Vec::new();
    for page in fetch_series(source, query, limit) {
        all.extend(page?);
    }
    Ok(all)
}

// ============================================================================
// Tests
// ============================================================================
