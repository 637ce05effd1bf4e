use serde_json::{json, Value};
use skyroute_core::views::ARC_ANGLE_OFFSET;
use skyroute_core::{
    AtlasConfig, BoundaryDataset, CountryBoundary, CountrySelection, Period, PerformanceMode,
    RecordStore, RouteAtlas, SeriesSelector, Selection, SkyrouteError, TimeSeries,
};
use skyroute_geo::{Geometry, LonLat};
use std::sync::Arc;

const HOME: &str = "臺北松山";

fn init_logging() {
    let _ = simplelog::SimpleLogger::init(simplelog::LevelFilter::Warn, simplelog::Config::default());
}

fn feature(source: &str, target: &str, period: &str, passengers: f64, from: [f64; 2], to: [f64; 2]) -> Value {
    json!({
        "type": "Feature",
        "geometry": { "type": "LineString", "coordinates": [from, to] },
        "properties": {
            "出發機場": source,
            "到達機場": target,
            "年月": period,
            "載客人次": passengers,
            "航班數": 10,
            "平均載客率": 75.0
        }
    })
}

fn square(name: &str, x0: f64, y0: f64, size: f64) -> CountryBoundary {
    CountryBoundary {
        name: name.to_string(),
        iso_code: None,
        geometry: Arc::new(Geometry::from_rings(vec![vec![
            LonLat::new(x0, y0),
            LonLat::new(x0 + size, y0),
            LonLat::new(x0 + size, y0 + size),
            LonLat::new(x0, y0 + size),
            LonLat::new(x0, y0),
        ]])),
    }
}

fn p(code: &str) -> Period {
    Period::parse(code).unwrap()
}

#[test]
fn test_renamed_airport_uses_latest_name_everywhere() {
    init_logging();
    let coord = [139.7798, 35.5494];
    // Same airport, slightly different coordinates that round to the same key.
    let later = [139.77981, 35.54942];
    let store = RecordStore::ingest(&[
        feature(HOME, "Tokyo International", "202301", 100.0, [121.5525, 25.0694], coord),
        feature(HOME, "Haneda", "202302", 120.0, [121.5525, 25.0694], later),
    ]);

    assert_eq!(store.records()[0].target, "Haneda");
    assert_eq!(store.records()[1].target, "Haneda");
    assert_eq!(store.airports().len(), 2);

    let haneda = store.airport("Haneda").unwrap();
    assert_eq!(haneda.cumulative_passengers, 220.0);
    assert_eq!(haneda.cumulative_flights, 20);
    assert!(store.airport("Tokyo International").is_none());
}

#[test]
fn test_opposite_directions_get_opposite_offsets() {
    let a = [121.2332, 25.0777];
    let b = [103.9915, 1.3644];
    let store = RecordStore::ingest(&[
        feature("A", "B", "202401", 500.0, a, b),
        feature("B", "A", "202401", 400.0, b, a),
    ]);
    let mut atlas = RouteAtlas::new(AtlasConfig::default(), store, BoundaryDataset::default());
    let flights = atlas.enhanced_flights(p("202401"));

    assert_eq!(flights.len(), 2);
    assert_eq!(flights[0].route_id, "A-B");
    assert_eq!(flights[0].arc_angle, Some(ARC_ANGLE_OFFSET));
    assert_eq!(flights[1].route_id, "B-A");
    assert_eq!(flights[1].arc_angle, Some(-ARC_ANGLE_OFFSET));
}

#[test]
fn test_cache_bound_after_31_selections() {
    let mut features = Vec::new();
    for i in 0..31u16 {
        let code = format!("{:04}{:02}", 2021 + i / 12, i % 12 + 1);
        features.push(feature("A", "B", &code, 10.0, [1.0, 1.0], [2.0, 2.0]));
    }
    let store = RecordStore::ingest(&features);
    let periods = store.periods().to_vec();
    assert_eq!(periods.len(), 31);

    let mut atlas = RouteAtlas::new(AtlasConfig::default(), store, BoundaryDataset::default());
    for period in periods {
        atlas.select(Selection::Period(period));
        let sizes = atlas.cache_sizes();
        assert!(sizes.flights <= 30, "{:?}", sizes);
        assert!(sizes.airports <= 30, "{:?}", sizes);
        assert!(atlas.arc_cache_len() <= 30);
    }
    // The 31st selection pushed each category over the bound and cleared it.
    assert_eq!(atlas.cache_sizes().flights, 0);

    for i in 0..31 {
        atlas.select(Selection::Route {
            source: format!("S{}", i),
            target: "T".to_string(),
        });
        assert!(atlas.cache_sizes().series <= 30);
    }
}

#[test]
fn test_country_without_service_returns_sentinel() {
    let store = RecordStore::ingest(&[
        feature(HOME, "Narita", "202401", 10.0, [121.5, 25.0], [140.4, 35.8]),
    ]);
    let boundaries = BoundaryDataset::new(vec![
        square("Japan", 129.0, 30.0, 17.0),
        square("Narnia", -10.0, -10.0, 5.0),
    ]);
    let mut atlas = RouteAtlas::new(AtlasConfig::default(), store, boundaries);
    atlas.run_country_assignment();

    let none = atlas.time_series(&SeriesSelector::Country(CountrySelection::ByName("Narnia".into())));
    assert_eq!(*none, TimeSeries::NoDirectService);
    assert!(none.is_no_direct_service());

    let japan = atlas.time_series(&SeriesSelector::Country(CountrySelection::ByName("Japan".into())));
    assert!(!japan.is_no_direct_service());
    assert_eq!(japan.points().len(), 1);

    // A route with no records is an empty series, not the sentinel.
    let empty = atlas.time_series(&SeriesSelector::Route {
        source: "X".into(),
        target: "Y".into(),
    });
    assert_eq!(*empty, TimeSeries::Points(Vec::new()));
}

#[test]
fn test_assignment_is_independent_of_polygon_order() {
    let polygons = vec![
        square("West", 0.0, 0.0, 10.0),
        square("Middle", 10.0, 0.0, 10.0),
        square("East", 20.0, 0.0, 10.0),
    ];
    let inside = LonLat::new(15.0, 5.0);

    let orders: [[usize; 3]; 4] = [[0, 1, 2], [2, 1, 0], [1, 0, 2], [2, 0, 1]];
    for order in orders {
        let dataset = BoundaryDataset::new(order.iter().map(|&i| polygons[i].clone()).collect());
        assert_eq!(dataset.locate(inside).map(|c| c.name.as_str()), Some("Middle"));
    }
}

#[test]
fn test_assignment_runs_in_batches_through_atlas() {
    init_logging();
    let mut features = Vec::new();
    for i in 0..250 {
        let lon = 130.0 + (i % 10) as f64;
        let lat = 31.0 + (i / 10) as f64 * 0.5;
        features.push(feature(HOME, &format!("JP{}", i), "202401", 1.0, [121.5, 25.0], [lon, lat]));
    }
    let store = RecordStore::ingest(&features);
    let boundaries = BoundaryDataset::new(vec![square("Japan", 129.0, 30.0, 17.0)]);
    let mut atlas = RouteAtlas::new(AtlasConfig::default(), store, boundaries);

    let mut ticks = 0;
    while let Some(progress) = atlas.poll_country_assignment() {
        ticks += 1;
        assert!(progress.processed <= progress.total);
        // A selection change in between does not cancel the task.
        atlas.select(Selection::Period(p("202401")));
    }

    // 251 airports at 100 per tick.
    assert_eq!(ticks, 3);
    assert!(atlas.assignment_complete());
    assert_eq!(atlas.assignment().len(), 250);
    assert!(atlas.assignment().get(HOME).is_none());

    let top = atlas.top_countries(p("202401"), 5);
    assert_eq!(top.destinations.len(), 1);
    assert_eq!(top.destinations[0].country, "Japan");
    assert_eq!(top.destinations[0].passengers, 250.0);
}

#[test]
fn test_load_from_disk_and_animate() {
    let dir = tempfile::tempdir().unwrap();
    let feed_path = dir.path().join("flights.json");
    let boundary_path = dir.path().join("countries.geojson");

    let feed = json!({
        "type": "FeatureCollection",
        "features": [
            feature(HOME, "Los Angeles", "202402", 900.0, [121.23, 25.08], [-118.41, 33.94]),
            feature("Los Angeles", HOME, "202402", 800.0, [-118.41, 33.94], [121.23, 25.08]),
            feature(HOME, "Los Angeles", "202401", 700.0, [121.23, 25.08], [-118.41, 33.94])
        ]
    });
    std::fs::write(&feed_path, feed.to_string()).unwrap();
    std::fs::write(
        &boundary_path,
        json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": { "NAME": "United States", "ISO_A2": "US" },
                "geometry": { "type": "Polygon", "coordinates": [[[-125,24],[-66,24],[-66,49],[-125,49],[-125,24]]] }
            }]
        })
        .to_string(),
    )
    .unwrap();

    let mut atlas = RouteAtlas::load(AtlasConfig::default(), &feed_path, Some(&boundary_path)).unwrap();
    assert_eq!(atlas.current_period(), Some(p("202402")));
    atlas.run_country_assignment();
    assert_eq!(atlas.assignment().country_of("Los Angeles"), Some("United States"));

    atlas.select(Selection::Period(p("202402")));
    let arcs = atlas.arcs(p("202402"));
    assert_eq!(arcs.len(), 2);
    assert!(arcs.iter().all(|a| a.is_segmented()));

    // Five aircraft per route; some are past their spawn ramp at any phase.
    let frame = atlas.frame(1000.0);
    assert!(!frame.is_empty());
    assert!(frame
        .iter()
        .all(|s| (s.target.lon - s.source.lon).abs() <= 180.0));

    atlas.select(Selection::Route {
        source: "Los Angeles".into(),
        target: HOME.into(),
    });
    let highlight = atlas.config().highlight_color;
    assert!(atlas.frame(1000.0).iter().all(|s| s.color == highlight));

    let series = atlas.subject_series().unwrap();
    assert_eq!(series.points().len(), 2);
    assert_eq!(series.points()[0].period, p("202401"));
    assert_eq!(series.points()[1].passengers, 1700.0);

    let stats = atlas.period_stats(p("202402"));
    assert_eq!(stats.total_flights, 20);

    atlas.shutdown();
}

#[test]
fn test_load_reports_missing_feed() {
    let dir = tempfile::tempdir().unwrap();
    let err = RouteAtlas::load(AtlasConfig::default(), &dir.path().join("missing.json"), None)
        .err()
        .unwrap();
    assert!(matches!(err, SkyrouteError::Feed(_)));
    assert!(err.to_string().contains("missing.json"));

    let feed_path = dir.path().join("flights.json");
    std::fs::write(&feed_path, r#"{"type": "FeatureCollection", "features": []}"#).unwrap();
    let bad_boundaries = dir.path().join("countries.geojson");
    std::fs::write(&bad_boundaries, "[]").unwrap();
    let err = RouteAtlas::load(AtlasConfig::default(), &feed_path, Some(&bad_boundaries))
        .err()
        .unwrap();
    assert!(matches!(err, SkyrouteError::Boundary(_)));
}

#[test]
fn test_open_reads_settings_and_selects_by_code() {
    let dir = tempfile::tempdir().unwrap();
    let feed_path = dir.path().join("flights.json");
    let settings = dir.path().join("settings.json");
    let feed = json!({
        "type": "FeatureCollection",
        "features": [feature("A", "B", "202401", 10.0, [1.0, 1.0], [2.0, 2.0])]
    });
    std::fs::write(&feed_path, feed.to_string()).unwrap();
    std::fs::write(&settings, r#"{"performance_mode": "low"}"#).unwrap();

    let mut atlas = RouteAtlas::open(&settings, &feed_path, None).unwrap();
    assert_eq!(atlas.config().performance_mode, PerformanceMode::Low);
    assert!(atlas.frame(500.0).is_empty());

    assert_eq!(atlas.select_period_code("202401").unwrap(), p("202401"));
    assert_eq!(atlas.current_period(), Some(p("202401")));
    assert!(matches!(
        atlas.select_period_code("2024-01"),
        Err(SkyrouteError::Period(_))
    ));
    assert_eq!(atlas.current_period(), Some(p("202401")));

    std::fs::write(&settings, "{ not json").unwrap();
    assert!(matches!(
        RouteAtlas::open(&settings, &feed_path, None),
        Err(SkyrouteError::Config(_))
    ));
}
