//! Per-selection projections of the record set, memoized in bounded caches.

use crate::cache::BoundedCache;
use crate::country::{CountryAssignment, CountrySelection, ReferenceRegion};
use crate::feed::{CoordKey, FlightRecord, RecordStore};
use crate::period::Period;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Arc-angle offset, in degrees, for the first direction of an endpoint pair.
/// The opposite direction gets the negated value.
pub const ARC_ANGLE_OFFSET: f64 = 30.0;

/// Read-only inputs every derived view is computed from.
#[derive(Clone, Copy)]
pub struct ViewContext<'a> {
    pub store: &'a RecordStore,
    pub assignment: &'a CountryAssignment,
    pub reference: &'a ReferenceRegion,
}

/// An airport with totals for one period only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodAirport {
    pub name: String,
    pub longitude: f64,
    pub latitude: f64,
    pub coord_key: CoordKey,
    pub passengers: f64,
    pub flights: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesPoint {
    pub period: Period,
    pub label: String,
    pub passengers: f64,
    pub flights: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "points", rename_all = "snake_case")]
pub enum TimeSeries {
    Points(Vec<TimeSeriesPoint>),
    /// The query ran and no record matched.
    NoDirectService,
}

impl TimeSeries {
    pub fn is_no_direct_service(&self) -> bool {
        matches!(self, TimeSeries::NoDirectService)
    }

    pub fn points(&self) -> &[TimeSeriesPoint] {
        match self {
            TimeSeries::Points(points) => points,
            TimeSeries::NoDirectService => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SeriesSelector {
    /// Matches both directions between the two airports.
    Route { source: String, target: String },
    Country(CountrySelection),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SeriesKey {
    Route(String, String),
    // The assigned count is part of the key so a result computed while the
    // assignment was still running is not served after it grows.
    Country {
        name: String,
        resolved: bool,
        assigned: usize,
    },
}

impl SeriesKey {
    fn new(selector: &SeriesSelector, assignment: &CountryAssignment) -> Self {
        match selector {
            SeriesSelector::Route { source, target } => {
                SeriesKey::Route(source.clone(), target.clone())
            }
            SeriesSelector::Country(selection) => SeriesKey::Country {
                name: selection.name().to_string(),
                resolved: selection.geometry().is_some(),
                assigned: assignment.len(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheSizes {
    pub flights: usize,
    pub airports: usize,
    pub series: usize,
}

/// The three derived-view cache categories.
#[derive(Debug)]
pub struct DerivedViews {
    flights: BoundedCache<(Period, usize), Vec<FlightRecord>>,
    airports: BoundedCache<Period, Vec<PeriodAirport>>,
    series: BoundedCache<SeriesKey, TimeSeries>,
}

impl DerivedViews {
    pub fn new(capacity: usize) -> Self {
        Self {
            flights: BoundedCache::new("flights", capacity),
            airports: BoundedCache::new("airports", capacity),
            series: BoundedCache::new("series", capacity),
        }
    }

    pub fn enhanced_flights(
        &mut self,
        ctx: ViewContext<'_>,
        period: Period,
        cap: usize,
    ) -> Arc<Vec<FlightRecord>> {
        self.flights
            .get_or_insert_with((period, cap), || compute_enhanced_flights(ctx.store, period, cap))
    }

    pub fn period_airports(&mut self, ctx: ViewContext<'_>, period: Period) -> Arc<Vec<PeriodAirport>> {
        self.airports
            .get_or_insert_with(period, || compute_period_airports(ctx.store, period))
    }

    pub fn time_series(&mut self, ctx: ViewContext<'_>, selector: &SeriesSelector) -> Arc<TimeSeries> {
        let key = SeriesKey::new(selector, ctx.assignment);
        self.series
            .get_or_insert_with(key, || compute_time_series(ctx, selector))
    }

    /// Applies the per-category bound. Called after every selection change.
    /// Returns true if any category was cleared.
    pub fn on_selection_change(&mut self) -> bool {
        let flights = self.flights.enforce_bound();
        let airports = self.airports.enforce_bound();
        let series = self.series.enforce_bound();
        flights || airports || series
    }

    pub fn sizes(&self) -> CacheSizes {
        CacheSizes {
            flights: self.flights.len(),
            airports: self.airports.len(),
            series: self.series.len(),
        }
    }

    pub fn clear(&mut self) {
        self.flights.clear();
        self.airports.clear();
        self.series.clear();
    }

    /// Flights departing from or arriving at `airport`.
    pub fn flights_touching(flights: &[FlightRecord], airport: &str) -> Vec<FlightRecord> {
        flights
            .iter()
            .filter(|f| f.touches(airport))
            .cloned()
            .collect()
    }
}

/// Records for `period`, heaviest first, cut to `cap`, with arc angles and
/// airport positions attached.
///
/// Arc angles depend on which direction of a pair is met first in this pass,
/// so the sign for a given route can differ between periods.
pub fn compute_enhanced_flights(store: &RecordStore, period: Period, cap: usize) -> Vec<FlightRecord> {
    let mut flights: Vec<&FlightRecord> = store.records_in(period).collect();
    flights.sort_by(|a, b| b.passengers.total_cmp(&a.passengers));
    flights.truncate(cap);

    let mut angles: HashMap<String, f64> = HashMap::new();
    let mut missing = 0usize;
    let result: Vec<FlightRecord> = flights
        .into_iter()
        .map(|record| {
            let angle = match angles.get(&record.route_id) {
                Some(&angle) => angle,
                None => {
                    let angle = if angles.contains_key(&record.reverse_route_id()) {
                        -ARC_ANGLE_OFFSET
                    } else {
                        ARC_ANGLE_OFFSET
                    };
                    angles.insert(record.route_id.clone(), angle);
                    angle
                }
            };

            let mut flight = record.clone();
            flight.arc_angle = Some(angle);
            match store.airport(&record.source) {
                Some(a) => flight.source_position = a.position(),
                None => missing += 1,
            }
            match store.airport(&record.target) {
                Some(a) => flight.target_position = a.position(),
                None => missing += 1,
            }
            flight
        })
        .collect();

    if missing > 0 {
        log::debug!(
            "period={} endpoints without an indexed airport: {}",
            period,
            missing
        );
    }
    log::debug!(
        "Computed enhanced flights period={} cap={} count={}",
        period,
        cap,
        result.len()
    );
    result
}

/// Per-airport totals for one period. A record reporting zero flights
/// counts as one.
pub fn compute_period_airports(store: &RecordStore, period: Period) -> Vec<PeriodAirport> {
    let mut order: Vec<&str> = Vec::new();
    let mut totals: HashMap<&str, (f64, u64)> = HashMap::new();

    for record in store.records_in(period) {
        let flights = if record.flights == 0 { 1 } else { record.flights };
        for name in [record.source.as_str(), record.target.as_str()] {
            let entry = totals.entry(name).or_insert_with(|| {
                order.push(name);
                (0.0, 0)
            });
            entry.0 += record.passengers;
            entry.1 = entry.1.saturating_add(flights);
        }
    }

    order
        .into_iter()
        .filter_map(|name| {
            let airport = store.airport(name)?;
            let (passengers, flights) = totals.get(name).copied().unwrap_or_default();
            Some(PeriodAirport {
                name: airport.name.clone(),
                longitude: airport.longitude,
                latitude: airport.latitude,
                coord_key: airport.coord_key.clone(),
                passengers,
                flights,
            })
        })
        .collect()
}

/// Whether a record is a cross-border flight to or from `selection`.
///
/// The foreign endpoint is matched by its assigned country first, then by
/// containment in the selection's geometry, then by the country name
/// appearing in the airport name.
pub fn is_country_flight(
    ctx: ViewContext<'_>,
    record: &FlightRecord,
    selection: &CountrySelection,
) -> bool {
    let source_home = ctx.reference.matches(&record.source);
    let target_home = ctx.reference.matches(&record.target);
    if source_home == target_home {
        return false;
    }

    let (foreign, position) = if source_home {
        (&record.target, record.target_position)
    } else {
        (&record.source, record.source_position)
    };

    if let Some(found) = ctx.assignment.get(foreign) {
        return found.country == selection.name();
    }

    match selection.geometry() {
        Some(geometry) if position.lon != 0.0 && position.lat != 0.0 => geometry.contains(position),
        _ => foreign.contains(selection.name()),
    }
}

/// Scans every period, sums per period and orders by calendar date.
pub fn compute_time_series(ctx: ViewContext<'_>, selector: &SeriesSelector) -> TimeSeries {
    let matching: Vec<&FlightRecord> = match selector {
        SeriesSelector::Route { source, target } => ctx
            .store
            .records()
            .iter()
            .filter(|r| r.connects(source, target))
            .collect(),
        SeriesSelector::Country(selection) => ctx
            .store
            .records()
            .iter()
            .filter(|r| is_country_flight(ctx, r, selection))
            .collect(),
    };

    if let SeriesSelector::Country(selection) = selector {
        log::debug!(
            "country={} matching records={}",
            selection.name(),
            matching.len()
        );
        if matching.is_empty() {
            return TimeSeries::NoDirectService;
        }
    }

    let mut by_period: HashMap<Period, (f64, u64)> = HashMap::new();
    for record in matching {
        let entry = by_period.entry(record.period).or_default();
        entry.0 += record.passengers;
        entry.1 = entry.1.saturating_add(record.flights);
    }

    let mut points: Vec<TimeSeriesPoint> = by_period
        .into_iter()
        .map(|(period, (passengers, flights))| TimeSeriesPoint {
            period,
            label: period.label(),
            passengers,
            flights,
        })
        .collect();
    points.sort_by_key(|p| p.period.chronological_key());
    TimeSeries::Points(points)
}
