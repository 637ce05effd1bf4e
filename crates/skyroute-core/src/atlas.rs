use crate::boundary::BoundaryDataset;
use crate::cache::BoundedCache;
use crate::color::PassengerColorScale;
use crate::config::{AtlasConfig, PerformanceMode, RenderSettings};
use crate::country::{
    AssignmentProgress, CountryAssigner, CountryAssignment, CountrySelection, ReferenceRegion,
};
use crate::feed::{FlightRecord, RecordStore};
use crate::period::Period;
use crate::SkyrouteError;
use crate::rankings::{self, PeriodStats, RankedRoute, RouteChanges, TopCountries};
use crate::trail::{TrailAnimator, TrailSegment};
use crate::views::{CacheSizes, DerivedViews, PeriodAirport, SeriesSelector, TimeSeries, ViewContext};
use skyroute_geo::{great_circle_arc, ArcPath};
use std::path::Path;
use std::sync::Arc;

/// A selection-change event.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Period(Period),
    Route { source: String, target: String },
    Country(CountrySelection),
    /// Drops the current route or country.
    ClearSubject,
}

fn view_context<'a>(store: &'a RecordStore, assigner: &'a CountryAssigner) -> ViewContext<'a> {
    ViewContext {
        store,
        assignment: assigner.assignment(),
        reference: assigner.reference(),
    }
}

/// Owns the record store and every cache built over it.
///
/// Construct once, query on demand, and call [`RouteAtlas::shutdown`] to
/// drop the caches.
pub struct RouteAtlas {
    config: AtlasConfig,
    render: RenderSettings,
    store: RecordStore,
    assigner: CountryAssigner,
    views: DerivedViews,
    arcs: BoundedCache<(Period, usize, usize), Vec<ArcPath>>,
    animator: TrailAnimator,
    period: Option<Period>,
    subject: Option<SeriesSelector>,
}

impl RouteAtlas {
    pub fn new(config: AtlasConfig, store: RecordStore, boundaries: BoundaryDataset) -> Self {
        let reference = ReferenceRegion::new(config.reference_keywords.iter().cloned());
        let assigner = CountryAssigner::new(
            Arc::new(boundaries),
            reference,
            config.assignment_batch_size,
        );
        let period = store.latest_period();
        log::info!(
            "Route atlas ready: records={} periods={} mode={:?} initial_period={}",
            store.records().len(),
            store.periods().len(),
            config.performance_mode,
            period.map(|p| p.code()).unwrap_or_else(|| "-".to_string())
        );

        Self {
            render: config.render_settings(),
            views: DerivedViews::new(config.cache_capacity),
            arcs: BoundedCache::new("arcs", config.cache_capacity),
            animator: TrailAnimator::new(config.animation_cycle_ms, config.highlight_color),
            assigner,
            store,
            period,
            subject: None,
            config,
        }
    }

    /// Loads the flight feed and, optionally, the boundary dataset from disk.
    pub fn load(
        config: AtlasConfig,
        feed: &Path,
        boundaries: Option<&Path>,
    ) -> Result<Self, SkyrouteError> {
        let store = RecordStore::load_path(feed)?;
        let boundaries = match boundaries {
            Some(path) => BoundaryDataset::load_path(path)?,
            None => BoundaryDataset::default(),
        };
        Ok(Self::new(config, store, boundaries))
    }

    /// Like [`RouteAtlas::load`], reading settings from `settings` first.
    pub fn open(
        settings: &Path,
        feed: &Path,
        boundaries: Option<&Path>,
    ) -> Result<Self, SkyrouteError> {
        let config = AtlasConfig::load(settings)?;
        Self::load(config, feed, boundaries)
    }

    pub fn config(&self) -> &AtlasConfig {
        &self.config
    }

    pub fn render_settings(&self) -> RenderSettings {
        self.render
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn boundaries(&self) -> &BoundaryDataset {
        self.assigner.boundaries()
    }

    pub fn reference(&self) -> &ReferenceRegion {
        self.assigner.reference()
    }

    pub fn animator(&self) -> &TrailAnimator {
        &self.animator
    }

    pub fn current_period(&self) -> Option<Period> {
        self.period
    }

    pub fn subject(&self) -> Option<&SeriesSelector> {
        self.subject.as_ref()
    }

    /// The cap on visible flights changes, so later lookups use new cache keys.
    pub fn set_performance_mode(&mut self, mode: PerformanceMode) {
        self.config.performance_mode = mode;
        self.render = mode.render_settings();
        log::info!(
            "Performance mode {:?}: max_visible_flights={} arc_resolution={}",
            mode,
            self.render.max_visible_flights,
            self.render.arc_resolution
        );
    }

    /// Applies a selection: computes the views it needs, then enforces the
    /// per-category cache bound.
    pub fn select(&mut self, selection: Selection) {
        match selection {
            Selection::Period(period) => {
                self.period = Some(period);
                self.enhanced_flights(period);
                self.period_airports(period);
                self.arcs(period);
            }
            Selection::Route { source, target } => {
                let selector = SeriesSelector::Route { source, target };
                self.time_series(&selector);
                self.subject = Some(selector);
            }
            Selection::Country(country) => {
                let selector = SeriesSelector::Country(country.resolve(self.assigner.boundaries()));
                self.time_series(&selector);
                self.subject = Some(selector);
            }
            Selection::ClearSubject => {
                self.subject = None;
            }
        }

        let cleared_views = self.views.on_selection_change();
        let cleared_arcs = self.arcs.enforce_bound();
        if cleared_views || cleared_arcs {
            log::debug!("Selection change cleared caches: {:?}", self.views.sizes());
        }
    }

    /// Parses a `YYYYMM` code and selects that period.
    pub fn select_period_code(&mut self, code: &str) -> Result<Period, SkyrouteError> {
        let period = Period::parse(code)?;
        if !self.store.periods().contains(&period) {
            log::warn!("period={} has no records", period);
        }
        self.select(Selection::Period(period));
        Ok(period)
    }

    pub fn enhanced_flights(&mut self, period: Period) -> Arc<Vec<FlightRecord>> {
        let ctx = view_context(&self.store, &self.assigner);
        self.views
            .enhanced_flights(ctx, period, self.render.max_visible_flights)
    }

    pub fn period_airports(&mut self, period: Period) -> Arc<Vec<PeriodAirport>> {
        let ctx = view_context(&self.store, &self.assigner);
        self.views.period_airports(ctx, period)
    }

    pub fn time_series(&mut self, selector: &SeriesSelector) -> Arc<TimeSeries> {
        let ctx = view_context(&self.store, &self.assigner);
        self.views.time_series(ctx, selector)
    }

    /// Series for the current route or country selection.
    pub fn subject_series(&mut self) -> Option<Arc<TimeSeries>> {
        let selector = self.subject.clone()?;
        Some(self.time_series(&selector))
    }

    /// Arc geometry for the visible flights of `period`, in list order.
    pub fn arcs(&mut self, period: Period) -> Arc<Vec<ArcPath>> {
        let key = (
            period,
            self.render.max_visible_flights,
            self.render.arc_resolution,
        );
        if let Some(cached) = self.arcs.get(&key) {
            return cached;
        }
        let flights = self.enhanced_flights(period);
        let height = self.config.arc_height_factor;
        let resolution = self.render.arc_resolution;
        self.arcs.get_or_insert_with(key, || {
            flights
                .iter()
                .map(|f| great_circle_arc(f.source_position, f.target_position, height, resolution))
                .collect()
        })
    }

    pub fn color_scale(&mut self, period: Period) -> PassengerColorScale {
        PassengerColorScale::from_flights(&self.enhanced_flights(period))
    }

    /// Trail geometry for the current period at `elapsed_ms` on the
    /// animation clock. Empty when animations are disabled.
    pub fn frame(&mut self, elapsed_ms: f64) -> Vec<TrailSegment> {
        let Some(period) = self.period else {
            return Vec::new();
        };
        if !self.render.animations_enabled {
            return Vec::new();
        }
        let flights = self.enhanced_flights(period);
        let arcs = self.arcs(period);
        let scale = PassengerColorScale::from_flights(&flights);
        let selected_route = match &self.subject {
            Some(SeriesSelector::Route { source, target }) => Some((source.as_str(), target.as_str())),
            _ => None,
        };
        let phase = self.animator.phase_at(elapsed_ms);
        self.animator
            .frame(&flights, &arcs, &scale, selected_route, phase)
    }

    /// Runs one batch of country assignment. `None` once complete.
    pub fn poll_country_assignment(&mut self) -> Option<AssignmentProgress> {
        self.assigner.poll(self.store.airports())
    }

    pub fn run_country_assignment(&mut self) -> &CountryAssignment {
        self.assigner.run_to_completion(self.store.airports())
    }

    pub fn assignment(&self) -> &CountryAssignment {
        self.assigner.assignment()
    }

    pub fn assignment_complete(&self) -> bool {
        self.assigner.is_complete()
    }

    pub fn route_changes(&self, period: Period) -> RouteChanges {
        rankings::route_changes(&self.store, period)
    }

    pub fn top_routes(&self, period: Period, n: usize) -> Vec<RankedRoute> {
        rankings::top_routes(&self.store, period, n)
    }

    pub fn top_countries(&self, period: Period, n: usize) -> TopCountries {
        rankings::top_countries(
            &self.store,
            period,
            self.assigner.assignment(),
            self.assigner.reference(),
            n,
        )
    }

    pub fn period_stats(&mut self, period: Period) -> PeriodStats {
        rankings::period_stats(&self.enhanced_flights(period))
    }

    pub fn cache_sizes(&self) -> CacheSizes {
        self.views.sizes()
    }

    pub fn arc_cache_len(&self) -> usize {
        self.arcs.len()
    }

    pub fn shutdown(mut self) {
        let sizes = self.views.sizes();
        log::info!(
            "Shutting down route atlas: flights={} airports={} series={} arcs={} assigned={}",
            sizes.flights,
            sizes.airports,
            sizes.series,
            self.arcs.len(),
            self.assigner.assignment().len()
        );
        self.views.clear();
        self.arcs.clear();
    }
}
