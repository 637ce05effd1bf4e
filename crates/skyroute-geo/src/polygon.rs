// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Skyroute contributors

use crate::{haversine_km, LonLat};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeometryError {
    #[error("GeoJSON geometry error: {0}")]
    GeoJson(#[from] geojson::Error),
    #[error("geometry is not a Polygon or MultiPolygon")]
    Unsupported,
}

/// Areal boundary geometry. The exterior ring of each polygon is its outer
/// boundary; interior rings are holes.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
}

fn line_string(ring: Vec<LonLat>) -> LineString<f64> {
    ring.into_iter().map(Coord::from).collect()
}

fn polygon_from_rings(rings: Vec<Vec<LonLat>>) -> Polygon<f64> {
    let mut rings = rings.into_iter().map(line_string);
    let exterior = rings.next().unwrap_or_else(|| LineString::new(Vec::new()));
    Polygon::new(exterior, rings.collect())
}

impl Geometry {
    /// A polygon from position rings, outer ring first.
    pub fn from_rings(rings: Vec<Vec<LonLat>>) -> Self {
        Geometry::Polygon(polygon_from_rings(rings))
    }

    pub fn from_polygons(polygons: Vec<Vec<Vec<LonLat>>>) -> Self {
        Geometry::MultiPolygon(MultiPolygon::new(
            polygons.into_iter().map(polygon_from_rings).collect(),
        ))
    }

    pub fn polygons(&self) -> Vec<&Polygon<f64>> {
        match self {
            Geometry::Polygon(p) => vec![p],
            Geometry::MultiPolygon(mp) => mp.0.iter().collect(),
        }
    }

    pub fn rings(&self) -> impl Iterator<Item = &LineString<f64>> + '_ {
        self.polygons()
            .into_iter()
            .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors()))
    }

    pub fn vertex_count(&self) -> usize {
        self.rings().map(|ring| ring.0.len()).sum()
    }

    /// Even-odd containment: parity flips once per ring that contains the
    /// point, so a point inside a hole is outside the polygon.
    pub fn contains(&self, point: LonLat) -> bool {
        self.polygons().into_iter().any(|p| {
            std::iter::once(p.exterior())
                .chain(p.interiors())
                .filter(|ring| point_in_ring(point, ring))
                .count()
                % 2
                == 1
        })
    }

    /// Smallest haversine distance from `point` to any ring vertex.
    ///
    /// This is a vertex distance, not a distance to the polygon edge; a point
    /// near the middle of a long edge reports the distance to the nearer
    /// corner. Returns `f64::INFINITY` for a geometry with no vertices.
    pub fn min_vertex_distance_km(&self, point: LonLat) -> f64 {
        self.rings()
            .flat_map(|ring| ring.0.iter())
            .map(|vertex| haversine_km(point, LonLat::from(*vertex)))
            .fold(f64::INFINITY, f64::min)
    }
}

impl TryFrom<geojson::Value> for Geometry {
    type Error = GeometryError;

    fn try_from(value: geojson::Value) -> Result<Self, Self::Error> {
        let geometry: geo::Geometry<f64> = value.try_into()?;
        match geometry {
            geo::Geometry::Polygon(p) => Ok(Geometry::Polygon(p)),
            geo::Geometry::MultiPolygon(mp) => Ok(Geometry::MultiPolygon(mp)),
            _ => Err(GeometryError::Unsupported),
        }
    }
}

/// Ray casting against a single ring (planar, in degrees).
pub fn point_in_ring(point: LonLat, ring: &LineString<f64>) -> bool {
    let coords = &ring.0;
    let (x, y) = (point.lon, point.lat);
    let mut inside = false;
    let mut j = coords.len().wrapping_sub(1);

    for i in 0..coords.len() {
        let (xi, yi) = (coords[i].x, coords[i].y);
        let (xj, yj) = (coords[j].x, coords[j].y);
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }

    inside
}
