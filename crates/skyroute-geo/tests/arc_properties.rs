use skyroute_geo::{great_circle_arc, ArcPath, LonLat};

const TOLERANCE: f64 = 1e-7;

fn lon_close(a: f64, b: f64) -> bool {
    let d = (a - b).rem_euclid(360.0);
    d < TOLERANCE || 360.0 - d < TOLERANCE
}

fn assert_continuous(segment: &[LonLat]) {
    for pair in segment.windows(2) {
        assert!(
            (pair[1].lon - pair[0].lon).abs() <= 180.0,
            "discontinuity inside segment: {:?} -> {:?}",
            pair[0],
            pair[1]
        );
    }
}

#[test]
fn test_dateline_crossing_returns_two_segments() {
    let path = great_circle_arc(LonLat::new(179.0, 0.0), LonLat::new(-179.0, 0.0), 0.5, 100);
    let ArcPath::Segmented(segments) = &path else {
        panic!("expected a segmented path, got {:?}", path);
    };
    assert_eq!(segments.len(), 2);
    for segment in segments {
        assert_continuous(segment);
    }
    assert!(segments[0].iter().all(|p| p.lon >= 179.0 - TOLERANCE));
    assert!(segments[1].iter().all(|p| p.lon <= -179.0 + TOLERANCE));
    assert_eq!(segments[0].last().map(|p| p.lon), Some(180.0));
    assert_eq!(segments[1].first().map(|p| p.lon), Some(-180.0));
}

#[test]
fn test_dateline_crossing_at_high_latitude() {
    // Taipei to Los Angeles goes across the Pacific, eastbound over the dateline.
    let path = great_circle_arc(LonLat::new(121.23, 25.08), LonLat::new(-118.41, 33.94), 0.5, 100);
    assert_eq!(path.segment_count(), 2);
    for segment in path.segments() {
        assert_continuous(segment);
    }
}

#[test]
fn test_no_crossing_below_180_delta() {
    let path = great_circle_arc(LonLat::new(0.0, 0.0), LonLat::new(170.0, 0.0), 0.5, 64);
    match path {
        ArcPath::Single(points) => {
            assert_eq!(points.len(), 65);
            assert_continuous(&points);
        }
        other => panic!("expected a single segment, got {:?}", other),
    }
}

#[test]
fn test_direction_symmetry() {
    let cases = [
        (LonLat::new(121.23, 25.08), LonLat::new(139.78, 35.55)),
        (LonLat::new(-0.46, 51.47), LonLat::new(103.99, 1.36)),
        (LonLat::new(-73.78, 40.64), LonLat::new(28.24, -26.14)),
    ];

    for (a, b) in cases {
        let forward = great_circle_arc(a, b, 0.5, 40);
        let backward = great_circle_arc(b, a, 0.5, 40);
        let (ArcPath::Single(forward), ArcPath::Single(mut backward)) = (forward, backward) else {
            panic!("cases are chosen not to cross the dateline");
        };
        backward.reverse();
        assert_eq!(forward.len(), backward.len());
        for (f, r) in forward.iter().zip(backward.iter()) {
            assert!(lon_close(f.lon, r.lon), "{:?} vs {:?}", f, r);
            assert!((f.lat - r.lat).abs() < TOLERANCE, "{:?} vs {:?}", f, r);
        }
    }
}

#[test]
fn test_deterministic() {
    let a = LonLat::new(12.5, 41.8);
    let b = LonLat::new(-58.4, -34.6);
    assert_eq!(great_circle_arc(a, b, 0.5, 50), great_circle_arc(a, b, 0.5, 50));
}
