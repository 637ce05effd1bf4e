//! Period summaries: route changes, top routes, top countries and totals.

use crate::boundary::UNKNOWN_COUNTRY;
use crate::country::{CountryAssignment, ReferenceRegion};
use crate::feed::{FlightRecord, RecordStore};
use crate::period::Period;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteEntry {
    pub source: String,
    pub target: String,
    pub passengers: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RouteChanges {
    /// `None` for the first period, where every route counts as new.
    pub previous: Option<Period>,
    pub new_routes: Vec<RouteEntry>,
    pub discontinued_routes: Vec<RouteEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "change", content = "places", rename_all = "snake_case")]
pub enum RankChange {
    New,
    Up(usize),
    Down(usize),
    Same,
}

impl RankChange {
    pub fn between(previous: Option<usize>, current: usize) -> Self {
        match previous {
            None => RankChange::New,
            Some(prev) if prev > current => RankChange::Up(prev - current),
            Some(prev) if prev < current => RankChange::Down(current - prev),
            Some(_) => RankChange::Same,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedRoute {
    pub rank: usize,
    pub source: String,
    pub target: String,
    pub passengers: f64,
    pub flights: u64,
    pub previous_rank: Option<usize>,
    pub change: RankChange,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCountry {
    pub rank: usize,
    pub country: String,
    pub passengers: f64,
    pub flights: u64,
    pub previous_rank: Option<usize>,
    pub change: RankChange,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TopCountries {
    /// Countries flown to from the reference region.
    pub destinations: Vec<RankedCountry>,
    /// Countries flying into the reference region.
    pub departures: Vec<RankedCountry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PeriodStats {
    pub total_flights: u64,
    pub total_passengers: f64,
    pub average_load_factor: f64,
}

/// Routes that appeared or disappeared relative to the previous period.
pub fn route_changes(store: &RecordStore, period: Period) -> RouteChanges {
    let entry = |r: &FlightRecord| RouteEntry {
        source: r.source.clone(),
        target: r.target.clone(),
        passengers: r.passengers,
    };

    let Some(previous) = store.previous_period(period) else {
        return RouteChanges {
            previous: None,
            new_routes: store.records_in(period).map(entry).collect(),
            discontinued_routes: Vec::new(),
        };
    };

    let current_ids: HashSet<&str> = store.records_in(period).map(|r| r.route_id.as_str()).collect();
    let previous_ids: HashSet<&str> = store
        .records_in(previous)
        .map(|r| r.route_id.as_str())
        .collect();

    RouteChanges {
        previous: Some(previous),
        new_routes: store
            .records_in(period)
            .filter(|r| !previous_ids.contains(r.route_id.as_str()))
            .map(entry)
            .collect(),
        discontinued_routes: store
            .records_in(previous)
            .filter(|r| !current_ids.contains(r.route_id.as_str()))
            .map(entry)
            .collect(),
    }
}

/// Sums `(passengers, flights)` per key, keeping first-seen order, then
/// sorts by passengers descending. Ties keep first-seen order.
fn rank_by_passengers<'a, I>(items: I) -> Vec<(String, f64, u64)>
where
    I: IntoIterator<Item = (String, &'a FlightRecord, u64)>,
{
    let mut order: Vec<(String, f64, u64)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for (key, record, flights) in items {
        let idx = *index.entry(key.clone()).or_insert_with(|| {
            order.push((key, 0.0, 0));
            order.len() - 1
        });
        order[idx].1 += record.passengers;
        order[idx].2 = order[idx].2.saturating_add(flights);
    }
    order.sort_by(|a, b| b.1.total_cmp(&a.1));
    order
}

fn previous_ranks(ranked: Vec<(String, f64, u64)>) -> HashMap<String, usize> {
    ranked
        .into_iter()
        .enumerate()
        .map(|(i, (key, _, _))| (key, i + 1))
        .collect()
}

/// The `n` busiest directed routes of `period`.
pub fn top_routes(store: &RecordStore, period: Period, n: usize) -> Vec<RankedRoute> {
    let route_items = |p: Period| {
        store
            .records_in(p)
            .map(|r| (r.route_id.clone(), r, r.flights))
            .collect::<Vec<_>>()
    };
    let endpoints: HashMap<&str, (&str, &str)> = store
        .records_in(period)
        .map(|r| (r.route_id.as_str(), (r.source.as_str(), r.target.as_str())))
        .collect();

    let prev = store
        .previous_period(period)
        .map(|p| previous_ranks(rank_by_passengers(route_items(p))))
        .unwrap_or_default();

    rank_by_passengers(route_items(period))
        .into_iter()
        .take(n)
        .enumerate()
        .map(|(i, (route_id, passengers, flights))| {
            let (source, target) = endpoints.get(route_id.as_str()).copied().unwrap_or(("", ""));
            let previous_rank = prev.get(&route_id).copied();
            RankedRoute {
                rank: i + 1,
                source: source.to_string(),
                target: target.to_string(),
                passengers,
                flights,
                previous_rank,
                change: RankChange::between(previous_rank, i + 1),
            }
        })
        .collect()
}

fn country_items<'a>(
    store: &'a RecordStore,
    period: Period,
    assignment: &CountryAssignment,
    reference: &ReferenceRegion,
    outbound: bool,
) -> Vec<(String, &'a FlightRecord, u64)> {
    store
        .records_in(period)
        .filter_map(|r| {
            let source_home = reference.matches(&r.source);
            let target_home = reference.matches(&r.target);
            let foreign = match (source_home, target_home, outbound) {
                (true, false, true) => &r.target,
                (false, true, false) => &r.source,
                _ => return None,
            };
            let country = assignment
                .country_of(foreign)
                .unwrap_or(UNKNOWN_COUNTRY)
                .to_string();
            let flights = if r.flights == 0 { 1 } else { r.flights };
            Some((country, r, flights))
        })
        .collect()
}

fn rank_countries(
    current: Vec<(String, f64, u64)>,
    prev: &HashMap<String, usize>,
    n: usize,
) -> Vec<RankedCountry> {
    current
        .into_iter()
        .take(n)
        .enumerate()
        .map(|(i, (country, passengers, flights))| {
            let previous_rank = prev.get(&country).copied();
            RankedCountry {
                rank: i + 1,
                country,
                passengers,
                flights,
                previous_rank,
                change: RankChange::between(previous_rank, i + 1),
            }
        })
        .collect()
}

/// The `n` busiest destination and departure countries of `period`, for
/// flights with exactly one endpoint in the reference region.
pub fn top_countries(
    store: &RecordStore,
    period: Period,
    assignment: &CountryAssignment,
    reference: &ReferenceRegion,
    n: usize,
) -> TopCountries {
    let ranked = |p: Period, outbound: bool| {
        rank_by_passengers(country_items(store, p, assignment, reference, outbound))
    };
    let previous = store.previous_period(period);
    let prev_dest = previous
        .map(|p| previous_ranks(ranked(p, true)))
        .unwrap_or_default();
    let prev_dept = previous
        .map(|p| previous_ranks(ranked(p, false)))
        .unwrap_or_default();

    TopCountries {
        destinations: rank_countries(ranked(period, true), &prev_dest, n),
        departures: rank_countries(ranked(period, false), &prev_dept, n),
    }
}

pub fn period_stats(flights: &[FlightRecord]) -> PeriodStats {
    if flights.is_empty() {
        return PeriodStats::default();
    }
    let total_flights = flights
        .iter()
        .fold(0u64, |acc, f| acc.saturating_add(f.flights));
    let total_passengers = flights.iter().map(|f| f.passengers).sum();
    let load_sum: f64 = flights.iter().map(|f| f.load_factor).sum();
    PeriodStats {
        total_flights,
        total_passengers,
        average_load_factor: load_sum / flights.len() as f64,
    }
}
