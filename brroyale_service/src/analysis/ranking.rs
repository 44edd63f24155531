/// Leaderboard ranking.
///
/// `rank` orders a category's metrics, hands out strictly sequential ranks
/// (1..N, ties keep arrival order) and attaches each city's rank from the
/// previous snapshot. It is a pure function of its two inputs: the previous
/// ranks are passed in, never read from disk here.

use crate::analysis::aggregate::format_record_date;
use crate::model::{City, CityMetric, ColdExtremes, ColdFields, Datatype, RankingEntry, SnowFields, SnowTotals};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::Debug;

/// Which family of leaderboard a metric belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// Ranked by season snowfall, most first.
    Snow,
    /// Ranked by lowest temperature, coldest first, no-data last.
    Cold,
}

impl MetricKind {
    /// Upstream observation type feeding this kind.
    pub fn datatype(&self) -> Datatype {
        match self {
            MetricKind::Snow => Datatype::Snow,
            MetricKind::Cold => Datatype::Tmin,
        }
    }
}

/// A per-city metric that can be placed on a leaderboard.
pub trait Metric {
    const KIND: MetricKind;

    /// Category-specific columns of a leaderboard row.
    type Fields: Serialize + Clone + PartialEq + Debug;

    /// `Less` means `self` ranks above `other`.
    fn leaderboard_order(&self, other: &Self) -> Ordering;

    fn entry_fields(&self, city: &City) -> Self::Fields;
}

impl Metric for SnowTotals {
    const KIND: MetricKind = MetricKind::Snow;
    type Fields = SnowFields;

    fn leaderboard_order(&self, other: &Self) -> Ordering {
        other.total_snow.total_cmp(&self.total_snow)
    }

    fn entry_fields(&self, city: &City) -> SnowFields {
        SnowFields {
            total_snow: self.total_snow,
            last_24h: self.last_24h,
            avg_annual: city.annual_average.unwrap_or(0.0),
        }
    }
}

impl Metric for ColdExtremes {
    const KIND: MetricKind = MetricKind::Cold;
    type Fields = ColdFields;

    fn leaderboard_order(&self, other: &Self) -> Ordering {
        match (self.lowest_temp, other.lowest_temp) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }

    fn entry_fields(&self, city: &City) -> ColdFields {
        ColdFields {
            lowest_temp: self.lowest_temp,
            lowest_windchill: self.lowest_temp.map(|t| t - 5),
            record_date: format_record_date(self.record_date),
            all_time_low: city.all_time_low,
            all_time_windchill: city.all_time_low.map(|t| t - 10.0),
        }
    }
}

/// City id → rank on the previous leaderboard of the same category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreviousRanks(HashMap<String, u32>);

impl PreviousRanks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Previous rank of `id`, or 0 for a new entrant.
    pub fn get(&self, id: &str) -> u32 {
        self.0.get(id).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, u32)> for PreviousRanks {
    fn from_iter<I: IntoIterator<Item = (S, u32)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(id, rank)| (id.into(), rank)).collect())
    }
}

/// Orders `metrics` and turns them into leaderboard rows.
pub fn rank<M: Metric>(
    mut metrics: Vec<CityMetric<'_, M>>,
    previous: &PreviousRanks,
) -> Vec<RankingEntry<M::Fields>> {
    // sort_by is stable, so ties keep arrival order
    metrics.sort_by(|a, b| a.metric.leaderboard_order(&b.metric));

    metrics
        .into_iter()
        .zip(1u32..)
        .map(|(m, rank)| RankingEntry {
            id: m.city.id.clone(),
            city: m.city.name.clone(),
            state: m.city.state.clone(),
            fields: m.metric.entry_fields(m.city),
            tags: m.city.tags.clone(),
            rank,
            previous_rank: previous.get(&m.city.id),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
