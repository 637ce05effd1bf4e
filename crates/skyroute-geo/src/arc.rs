// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Skyroute contributors

use crate::LonLat;
use serde::Serialize;
use std::f64::consts::PI;
use thiserror::Error;

/// Upper bound on the radial lift applied at the middle of an arc.
pub const MAX_HEIGHT_FACTOR: f64 = 0.5;

/// Angular distances (radians) below this are treated as coincident endpoints.
const COINCIDENT_EPSILON: f64 = 1e-9;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArcError {
    #[error("non-finite arc endpoint: start={start:?} end={end:?}")]
    NonFinite { start: LonLat, end: LonLat },
    #[error("non-finite height factor: {0}")]
    InvalidHeight(f64),
    #[error("antipodal endpoints have no unique great circle: start={start:?} end={end:?}")]
    Antipodal { start: LonLat, end: LonLat },
}

/// Output of [`great_circle_arc`].
///
/// A path that crosses the ±180° meridian is returned as several segments,
/// each continuous in longitude.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ArcPath {
    Single(Vec<LonLat>),
    Segmented(Vec<Vec<LonLat>>),
}

impl ArcPath {
    pub fn segments(&self) -> Vec<&[LonLat]> {
        match self {
            ArcPath::Single(points) => vec![points.as_slice()],
            ArcPath::Segmented(segments) => segments.iter().map(Vec::as_slice).collect(),
        }
    }

    pub fn segment_count(&self) -> usize {
        match self {
            ArcPath::Single(_) => 1,
            ArcPath::Segmented(segments) => segments.len(),
        }
    }

    pub fn point_count(&self) -> usize {
        match self {
            ArcPath::Single(points) => points.len(),
            ArcPath::Segmented(segments) => segments.iter().map(Vec::len).sum(),
        }
    }

    pub fn is_segmented(&self) -> bool {
        matches!(self, ArcPath::Segmented(_))
    }
}

/// Endpoints converted to radians, with the longitude delta already taking
/// the short way around the globe.
struct ArcSpan {
    phi1: f64,
    lambda1: f64,
    phi2: f64,
    lambda2: f64,
    angular_distance: f64,
    crosses_antimeridian: bool,
}

impl ArcSpan {
    /// Returns `Ok(None)` for coincident endpoints.
    fn between(start: LonLat, end: LonLat) -> Result<Option<Self>, ArcError> {
        if !start.is_finite() || !end.is_finite() {
            return Err(ArcError::NonFinite { start, end });
        }

        let crosses_antimeridian = (end.lon - start.lon).abs() > 180.0;

        let phi1 = start.lat.to_radians();
        let phi2 = end.lat.to_radians();
        let lambda1 = start.lon.to_radians();
        let mut delta_lambda = (end.lon - start.lon).to_radians();
        if crosses_antimeridian {
            delta_lambda += if delta_lambda > 0.0 { -2.0 * PI } else { 2.0 * PI };
        }

        let hav = ((phi2 - phi1) / 2.0).sin().powi(2)
            + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
        let angular_distance = 2.0 * hav.clamp(0.0, 1.0).sqrt().asin();

        if angular_distance < COINCIDENT_EPSILON {
            return Ok(None);
        }
        if PI - angular_distance < COINCIDENT_EPSILON {
            return Err(ArcError::Antipodal { start, end });
        }

        Ok(Some(Self {
            phi1,
            lambda1,
            phi2,
            lambda2: lambda1 + delta_lambda,
            angular_distance,
            crosses_antimeridian,
        }))
    }

    fn effective_height(&self, height_factor: f64) -> f64 {
        (height_factor * (self.angular_distance / PI) * 3.0).min(MAX_HEIGHT_FACTOR)
    }

    /// Spherical linear interpolation on the unit sphere.
    fn interpolate(&self, t: f64) -> [f64; 3] {
        let d = self.angular_distance;
        let a = ((1.0 - t) * d).sin() / d.sin();
        let b = (t * d).sin() / d.sin();
        [
            a * self.phi1.cos() * self.lambda1.cos() + b * self.phi2.cos() * self.lambda2.cos(),
            a * self.phi1.cos() * self.lambda1.sin() + b * self.phi2.cos() * self.lambda2.sin(),
            a * self.phi1.sin() + b * self.phi2.sin(),
        ]
    }
}

fn to_lon_lat([x, y, z]: [f64; 3]) -> LonLat {
    let lat = z.atan2((x * x + y * y).sqrt()).to_degrees();
    let mut lon = y.atan2(x).to_degrees();
    while lon > 180.0 {
        lon -= 360.0;
    }
    while lon < -180.0 {
        lon += 360.0;
    }
    LonLat::new(lon, lat)
}

/// Samples the great-circle arc between `start` and `end`.
///
/// Never fails: invalid input is logged and replaced by the straight
/// two-point pair `[start, end]`.
pub fn great_circle_arc(
    start: LonLat,
    end: LonLat,
    height_factor: f64,
    num_points: usize,
) -> ArcPath {
    match try_great_circle_arc(start, end, height_factor, num_points) {
        Ok(path) => path,
        Err(e) => {
            log::warn!("Arc geometry failed, using straight fallback: {}", e);
            ArcPath::Single(vec![start, end])
        }
    }
}

/// Samples `num_points + 1` points along the great-circle arc.
///
/// Coincident endpoints yield the two endpoints unchanged.
pub fn try_great_circle_arc(
    start: LonLat,
    end: LonLat,
    height_factor: f64,
    num_points: usize,
) -> Result<ArcPath, ArcError> {
    if !height_factor.is_finite() {
        return Err(ArcError::InvalidHeight(height_factor));
    }
    let Some(span) = ArcSpan::between(start, end)? else {
        return Ok(ArcPath::Single(vec![start, end]));
    };

    let effective_height = span.effective_height(height_factor);
    let n = num_points.max(1);
    let mut points = Vec::with_capacity(n + 1);

    for i in 0..=n {
        let t = i as f64 / n as f64;
        let [x, y, z] = span.interpolate(t);
        // Push the sample radially off the unit sphere; sin(t*pi) keeps the
        // endpoints on the surface.
        let radius = 1.0 + (t * PI).sin() * effective_height;
        points.push(to_lon_lat([x * radius, y * radius, z * radius]));
    }

    if span.crosses_antimeridian {
        let segments = split_at_antimeridian(&points);
        if segments.len() > 1 {
            return Ok(ArcPath::Segmented(segments));
        }
    }

    Ok(ArcPath::Single(points))
}

/// Radial lift for each of the `num_points + 1` samples of the matching
/// [`great_circle_arc`] call, in unit-sphere radii above the surface.
pub fn arc_lift_profile(
    start: LonLat,
    end: LonLat,
    height_factor: f64,
    num_points: usize,
) -> Vec<f64> {
    if !height_factor.is_finite() {
        return vec![0.0, 0.0];
    }
    match ArcSpan::between(start, end) {
        Ok(Some(span)) => {
            let effective_height = span.effective_height(height_factor);
            let n = num_points.max(1);
            (0..=n)
                .map(|i| ((i as f64 / n as f64) * PI).sin() * effective_height)
                .collect()
        }
        Ok(None) | Err(_) => vec![0.0, 0.0],
    }
}

/// Splits a point sequence wherever consecutive longitudes jump by more than
/// 180°, inserting the interpolated crossing point at ±180° on both sides.
pub fn split_at_antimeridian(points: &[LonLat]) -> Vec<Vec<LonLat>> {
    let Some(first) = points.first() else {
        return Vec::new();
    };

    let mut segments = Vec::new();
    let mut current = vec![*first];

    for pair in points.windows(2) {
        let (prev, curr) = (pair[0], pair[1]);
        if (curr.lon - prev.lon).abs() > 180.0 {
            // Eastbound wraps from +180 to -180, westbound the other way.
            let (exit_lon, entry_lon, to_edge, from_edge) = if prev.lon > curr.lon {
                (180.0, -180.0, 180.0 - prev.lon, 180.0 + curr.lon)
            } else {
                (-180.0, 180.0, 180.0 + prev.lon, 180.0 - curr.lon)
            };
            let total = to_edge + from_edge;
            let ratio = if total > 0.0 { to_edge / total } else { 0.0 };
            let cross_lat = prev.lat + (curr.lat - prev.lat) * ratio;

            current.push(LonLat::new(exit_lon, cross_lat));
            segments.push(std::mem::take(&mut current));
            current.push(LonLat::new(entry_lon, cross_lat));
        }
        current.push(curr);
    }

    segments.push(current);
    segments
}
