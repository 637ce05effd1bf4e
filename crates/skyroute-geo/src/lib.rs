// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Skyroute contributors

pub mod arc;
pub mod polygon;

pub use arc::{arc_lift_profile, great_circle_arc, split_at_antimeridian, try_great_circle_arc};
pub use arc::{ArcError, ArcPath};
pub use polygon::{point_in_ring, Geometry, GeometryError};

use serde::{Deserialize, Serialize};

/// Mean Earth radius used for haversine distances.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A longitude/latitude pair in degrees.
///
/// Serialized as a GeoJSON position (`[lon, lat]`). Deserialization accepts
/// positions with a trailing altitude and ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "[f64; 2]")]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
}

impl LonLat {
    pub const ORIGIN: LonLat = LonLat { lon: 0.0, lat: 0.0 };

    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    pub fn is_finite(&self) -> bool {
        self.lon.is_finite() && self.lat.is_finite()
    }

    /// True for the `(0, 0)` placeholder written for features without usable coordinates.
    pub fn is_placeholder(&self) -> bool {
        self.lon == 0.0 && self.lat == 0.0
    }
}

impl TryFrom<Vec<f64>> for LonLat {
    type Error = String;

    fn try_from(v: Vec<f64>) -> Result<Self, Self::Error> {
        match v.as_slice() {
            [lon, lat, ..] => Ok(LonLat::new(*lon, *lat)),
            _ => Err(format!("position needs at least 2 values, got {}", v.len())),
        }
    }
}

impl From<LonLat> for [f64; 2] {
    fn from(p: LonLat) -> Self {
        [p.lon, p.lat]
    }
}

impl From<LonLat> for geo::Coord<f64> {
    fn from(p: LonLat) -> Self {
        geo::Coord { x: p.lon, y: p.lat }
    }
}

impl From<geo::Coord<f64>> for LonLat {
    fn from(c: geo::Coord<f64>) -> Self {
        LonLat::new(c.x, c.y)
    }
}

impl From<[f64; 2]> for LonLat {
    fn from(p: [f64; 2]) -> Self {
        LonLat::new(p[0], p[1])
    }
}

/// Great-circle distance in kilometres (haversine).
pub fn haversine_km(a: LonLat, b: LonLat) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// Planar distance in degrees between two positions, taking the short way
/// around the antimeridian.
pub fn wrapped_planar_distance(a: LonLat, b: LonLat) -> f64 {
    let mut dx = b.lon - a.lon;
    let dy = b.lat - a.lat;
    if dx.abs() > 180.0 {
        dx = if dx > 0.0 { dx - 360.0 } else { dx + 360.0 };
    }
    (dx * dx + dy * dy).sqrt()
}
