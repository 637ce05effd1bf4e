use geojson::{GeoJson, JsonObject};
use serde::Serialize;
use serde_json::Value;
use skyroute_geo::{Geometry, LonLat};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BoundaryError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),
    #[error("Boundary file is not a FeatureCollection")]
    NotFeatureCollection,
}

const NAME_KEYS: &[&str] = &["NAME", "name", "ADMIN"];
const ISO_KEYS: &[&str] = &["ISO_A2", "iso_a2"];

pub const UNKNOWN_COUNTRY: &str = "Unknown";

/// A country polygon reduced to its geometry, name and ISO code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryBoundary {
    pub name: String,
    pub iso_code: Option<String>,
    #[serde(skip)]
    pub geometry: Arc<Geometry>,
}

#[derive(Debug, Clone, Default)]
pub struct BoundaryDataset {
    countries: Vec<CountryBoundary>,
}

impl BoundaryDataset {
    pub fn new(countries: Vec<CountryBoundary>) -> Self {
        Self { countries }
    }

    pub fn load_path<P: AsRef<Path>>(path: P) -> Result<Self, BoundaryError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| BoundaryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_geojson_str(&content)
    }

    /// Parses a polygon feature collection, keeping only geometry and the
    /// name/ISO properties. Features with any other geometry are skipped.
    pub fn from_geojson_str(content: &str) -> Result<Self, BoundaryError> {
        let GeoJson::FeatureCollection(collection) = content.parse::<GeoJson>()? else {
            return Err(BoundaryError::NotFeatureCollection);
        };
        let total = collection.features.len();

        let mut countries = Vec::with_capacity(total);
        for (i, feature) in collection.features.into_iter().enumerate() {
            let Some(raw_geometry) = feature.geometry else {
                log::warn!("Boundary feature #{} has no geometry, skipping", i);
                continue;
            };
            let geometry = match Geometry::try_from(raw_geometry.value) {
                Ok(g) => g,
                Err(e) => {
                    log::warn!("Boundary feature #{} skipped: {}", i, e);
                    continue;
                }
            };

            let props = feature.properties.as_ref();
            let name = first_string(props, NAME_KEYS).unwrap_or_else(|| UNKNOWN_COUNTRY.to_string());
            let iso_code = first_string(props, ISO_KEYS).filter(|code| code != "-99");

            countries.push(CountryBoundary {
                name,
                iso_code,
                geometry: Arc::new(geometry),
            });
        }

        log::info!(
            "Loaded boundary dataset: countries={} skipped={}",
            countries.len(),
            total - countries.len()
        );
        Ok(Self { countries })
    }

    pub fn countries(&self) -> &[CountryBoundary] {
        &self.countries
    }

    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.countries.len()
    }

    /// Case-insensitive lookup by country name or ISO code.
    pub fn find(&self, query: &str) -> Option<&CountryBoundary> {
        let query = query.trim();
        self.countries.iter().find(|c| {
            c.name.eq_ignore_ascii_case(query)
                || c.iso_code
                    .as_deref()
                    .is_some_and(|code| code.eq_ignore_ascii_case(query))
        })
    }

    /// Country containing `point`, or failing that the country with the
    /// nearest ring vertex. Ties keep the first country in dataset order.
    pub fn locate(&self, point: LonLat) -> Option<&CountryBoundary> {
        if let Some(hit) = self.countries.iter().find(|c| c.geometry.contains(point)) {
            return Some(hit);
        }

        let mut nearest: Option<(&CountryBoundary, f64)> = None;
        for country in &self.countries {
            let d = country.geometry.min_vertex_distance_km(point);
            if nearest.map_or(d.is_finite(), |(_, best)| d < best) {
                nearest = Some((country, d));
            }
        }
        nearest.map(|(country, _)| country)
    }
}

fn first_string(props: Option<&JsonObject>, keys: &[&str]) -> Option<String> {
    let props = props?;
    keys.iter()
        .filter_map(|k| props.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "NAME": "Squareland", "ISO_A2": "SQ", "POP_EST": 1000 },
                "geometry": { "type": "Polygon", "coordinates": [[[0,0],[10,0],[10,10],[0,10],[0,0]]] }
            },
            {
                "type": "Feature",
                "properties": { "name": "Twin Isles", "iso_a2": "TI" },
                "geometry": { "type": "MultiPolygon", "coordinates": [
                    [[[20,0],[22,0],[22,2],[20,2],[20,0]]],
                    [[[30,0],[32,0],[32,2],[30,2],[30,0]]]
                ] }
            },
            {
                "type": "Feature",
                "properties": { "NAME": "Pointy" },
                "geometry": { "type": "Point", "coordinates": [50, 50] }
            }
        ]
    }"#;

    #[test]
    fn test_simplifies_and_skips_unsupported() {
        let dataset = BoundaryDataset::from_geojson_str(SAMPLE).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.countries()[1].name, "Twin Isles");
        assert_eq!(dataset.countries()[1].iso_code.as_deref(), Some("TI"));
        assert!(dataset.find("sq").is_some());
        assert!(dataset.find("twin isles").is_some());
        assert!(dataset.find("Pointy").is_none());
    }

    #[test]
    fn test_locate_contains_then_nearest() {
        let dataset = BoundaryDataset::from_geojson_str(SAMPLE).unwrap();
        let inside = dataset.locate(LonLat::new(31.0, 1.0)).unwrap();
        assert_eq!(inside.name, "Twin Isles");

        // Offshore, closest to Squareland's (10,10) corner.
        let nearest = dataset.locate(LonLat::new(11.0, 11.0)).unwrap();
        assert_eq!(nearest.name, "Squareland");

        assert!(BoundaryDataset::default().locate(LonLat::new(1.0, 1.0)).is_none());
    }

    #[test]
    fn test_rejects_non_collection() {
        assert!(matches!(
            BoundaryDataset::from_geojson_str(r#"{"type":"Point","coordinates":[0,0]}"#),
            Err(BoundaryError::NotFeatureCollection)
        ));
        assert!(matches!(
            BoundaryDataset::from_geojson_str("[]"),
            Err(BoundaryError::GeoJson(_))
        ));
    }

    fn block(name: &str, lon_min: f64, lon_max: f64) -> CountryBoundary {
        CountryBoundary {
            name: name.to_string(),
            iso_code: None,
            geometry: Arc::new(Geometry::from_rings(vec![vec![
                LonLat::new(lon_min, 0.0),
                LonLat::new(lon_max, 0.0),
                LonLat::new(lon_max, 1.0),
                LonLat::new(lon_min, 1.0),
                LonLat::new(lon_min, 0.0),
            ]])),
        }
    }

    #[test]
    fn test_nearest_tie_keeps_first_listed() {
        // Mirror images either side of the prime meridian; (0, 0.5) is
        // outside both and exactly as far from each.
        let west = block("West", -2.0, -1.0);
        let east = block("East", 1.0, 2.0);
        let point = LonLat::new(0.0, 0.5);
        assert_eq!(
            west.geometry.min_vertex_distance_km(point),
            east.geometry.min_vertex_distance_km(point)
        );

        let dataset = BoundaryDataset::new(vec![west.clone(), east.clone()]);
        assert_eq!(dataset.locate(point).unwrap().name, "West");

        let dataset = BoundaryDataset::new(vec![east.clone(), west.clone()]);
        assert_eq!(dataset.locate(point).unwrap().name, "East");

        let far = block("Far", 40.0, 41.0);
        let dataset = BoundaryDataset::new(vec![east.clone(), west.clone(), far]);
        assert_eq!(dataset.locate(point).unwrap().name, "East");

        let close = block("Close", 0.2, 0.4);
        let dataset = BoundaryDataset::new(vec![east, west, close]);
        assert_eq!(dataset.locate(point).unwrap().name, "Close");
    }
}
