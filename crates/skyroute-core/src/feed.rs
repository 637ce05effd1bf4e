use crate::period::Period;
use serde::Serialize;
use serde_json::{Map, Value};
use skyroute_geo::LonLat;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Not a GeoJSON FeatureCollection: {0}")]
    NotFeatureCollection(String),
}

// Property names accepted for each field. The first present key wins.
const SOURCE_NAME_KEYS: &[&str] = &["source", "origin", "出發機場"];
const TARGET_NAME_KEYS: &[&str] = &["target", "destination", "到達機場"];
const PERIOD_KEYS: &[&str] = &["period", "yearMonth", "年月"];
const PASSENGER_KEYS: &[&str] = &["passengers", "載客人次"];
const FLIGHT_KEYS: &[&str] = &["flights", "航班數"];
const LOAD_FACTOR_KEYS: &[&str] = &["loadFactor", "load_factor", "平均載客率"];
const AIRLINE_KEYS: &[&str] = &["airlines", "airlineList", "航空公司列表"];
const SOURCE_LON_KEYS: &[&str] = &["sourceLon", "source_lon", "出發經度"];
const SOURCE_LAT_KEYS: &[&str] = &["sourceLat", "source_lat", "出發緯度"];
const TARGET_LON_KEYS: &[&str] = &["targetLon", "target_lon", "到達經度"];
const TARGET_LAT_KEYS: &[&str] = &["targetLat", "target_lat", "到達緯度"];

const AIRLINE_DELIMITERS: [char; 4] = [',', '，', '、', '|'];

/// Index of a record in [`RecordStore::records`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RecordId(pub usize);

/// Coordinates rounded to 4 decimal places, e.g. `121.2332,25.0777`.
/// Airports are deduplicated by this key, never by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CoordKey(String);

impl CoordKey {
    pub fn from_position(p: LonLat) -> Self {
        CoordKey(format!("{:.4},{:.4}", p.lon, p.lat))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CoordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlightRecord {
    pub id: RecordId,
    pub source: String,
    pub target: String,
    pub period: Period,
    pub passengers: f64,
    pub flights: u64,
    pub load_factor: f64,
    pub airlines: Vec<String>,
    pub source_position: LonLat,
    pub target_position: LonLat,
    pub source_key: CoordKey,
    pub target_key: CoordKey,
    /// `source-target`, direction-sensitive.
    pub route_id: String,
    /// Set only on copies handed out by the derived views.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arc_angle: Option<f64>,
}

impl FlightRecord {
    pub fn route_id_for(source: &str, target: &str) -> String {
        format!("{}-{}", source, target)
    }

    pub fn reverse_route_id(&self) -> String {
        Self::route_id_for(&self.target, &self.source)
    }

    /// True when the record joins `a` and `b`, in either direction.
    pub fn connects(&self, a: &str, b: &str) -> bool {
        (self.source == a && self.target == b) || (self.source == b && self.target == a)
    }

    pub fn touches(&self, airport: &str) -> bool {
        self.source == airport || self.target == airport
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Airport {
    pub name: String,
    pub longitude: f64,
    pub latitude: f64,
    pub coord_key: CoordKey,
    /// Totals across every period in the feed.
    pub cumulative_passengers: f64,
    pub cumulative_flights: u64,
}

impl Airport {
    pub fn position(&self) -> LonLat {
        LonLat::new(self.longitude, self.latitude)
    }
}

/// Normalized flight records plus the period and airport indexes built over them.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: Vec<FlightRecord>,
    airports: Vec<Airport>,
    periods: Vec<Period>,
    period_index: HashMap<Period, Vec<RecordId>>,
    airport_index: HashMap<String, usize>,
    key_index: HashMap<CoordKey, usize>,
}

struct Endpoints {
    source: LonLat,
    target: LonLat,
    degraded: bool,
}

impl RecordStore {
    pub fn load_path<P: AsRef<Path>>(path: P) -> Result<Self, FeedError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| FeedError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Read flight feed {:?} ({} bytes)", path, content.len());
        Self::from_geojson_str(&content)
    }

    pub fn from_geojson_str(content: &str) -> Result<Self, FeedError> {
        let root: Value = serde_json::from_str(content)?;
        let features = root
            .get("features")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                let kind = root
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or("<untyped>");
                FeedError::NotFeatureCollection(format!("type={} has no features array", kind))
            })?;
        Ok(Self::ingest(features))
    }

    /// Builds the store from raw GeoJSON features.
    ///
    /// Runs in two passes: the first records the last name seen at every
    /// coordinate key, the second builds the records with those names so an
    /// airport renamed later in the feed shows its latest name everywhere.
    /// The feed is assumed to be in chronological order.
    pub fn ingest(features: &[Value]) -> Self {
        let mut latest_names: HashMap<CoordKey, String> = HashMap::new();
        for feature in features {
            let Some(props) = feature.get("properties").and_then(Value::as_object) else {
                continue;
            };
            let ends = extract_endpoints(feature, props);
            if ends.degraded {
                continue;
            }
            if let Some(name) = string_prop(props, SOURCE_NAME_KEYS) {
                latest_names.insert(CoordKey::from_position(ends.source), name);
            }
            if let Some(name) = string_prop(props, TARGET_NAME_KEYS) {
                latest_names.insert(CoordKey::from_position(ends.target), name);
            }
        }

        let mut store = RecordStore::default();
        let mut degraded = 0usize;
        let mut skipped = 0usize;

        for (i, feature) in features.iter().enumerate() {
            let Some(props) = feature.get("properties").and_then(Value::as_object) else {
                log::warn!("Skipping feature #{}: no properties", i);
                skipped += 1;
                continue;
            };

            let period = match first_value(props, PERIOD_KEYS).map(Period::from_json) {
                Some(Ok(p)) => p,
                Some(Err(e)) => {
                    log::warn!("Skipping feature #{}: {}", i, e);
                    skipped += 1;
                    continue;
                }
                None => {
                    log::warn!("Skipping feature #{}: no period code", i);
                    skipped += 1;
                    continue;
                }
            };

            let ends = extract_endpoints(feature, props);
            if ends.degraded {
                log::warn!(
                    "Feature #{} has no usable coordinates, using (0,0) placeholders",
                    i
                );
                degraded += 1;
            }

            let source_key = CoordKey::from_position(ends.source);
            let target_key = CoordKey::from_position(ends.target);
            let source = resolve_name(
                &latest_names,
                &source_key,
                string_prop(props, SOURCE_NAME_KEYS),
                ends.degraded,
            );
            let target = resolve_name(
                &latest_names,
                &target_key,
                string_prop(props, TARGET_NAME_KEYS),
                ends.degraded,
            );

            let passengers = number_prop(props, PASSENGER_KEYS).unwrap_or(0.0);
            let flights = number_prop(props, FLIGHT_KEYS)
                .map(|f| f.max(0.0).trunc() as u64)
                .unwrap_or(0);
            let load_factor = number_prop(props, LOAD_FACTOR_KEYS).unwrap_or(0.0);
            let airlines = parse_airlines(first_value(props, AIRLINE_KEYS));

            let id = RecordId(store.records.len());
            let record = FlightRecord {
                id,
                route_id: FlightRecord::route_id_for(&source, &target),
                source,
                target,
                period,
                passengers,
                flights,
                load_factor,
                airlines,
                source_position: ends.source,
                target_position: ends.target,
                source_key,
                target_key,
                arc_angle: None,
            };

            if !ends.degraded {
                store.accumulate_airport(&record.source, ends.source, &record.source_key, &record);
                store.accumulate_airport(&record.target, ends.target, &record.target_key, &record);
            }
            store.period_index.entry(period).or_default().push(id);
            store.records.push(record);
        }

        store.periods = store.period_index.keys().copied().collect();
        store.periods.sort();
        for (idx, airport) in store.airports.iter().enumerate() {
            store.airport_index.insert(airport.name.clone(), idx);
        }

        log::info!(
            "Ingested feed: records={} airports={} periods={} degraded={} skipped={}",
            store.records.len(),
            store.airports.len(),
            store.periods.len(),
            degraded,
            skipped
        );
        store
    }

    fn accumulate_airport(
        &mut self,
        name: &str,
        position: LonLat,
        key: &CoordKey,
        record: &FlightRecord,
    ) {
        let idx = match self.key_index.get(key) {
            Some(&idx) => idx,
            None => {
                self.airports.push(Airport {
                    name: name.to_string(),
                    longitude: position.lon,
                    latitude: position.lat,
                    coord_key: key.clone(),
                    cumulative_passengers: 0.0,
                    cumulative_flights: 0,
                });
                self.key_index.insert(key.clone(), self.airports.len() - 1);
                self.airports.len() - 1
            }
        };
        let airport = &mut self.airports[idx];
        airport.cumulative_passengers += record.passengers;
        airport.cumulative_flights = airport.cumulative_flights.saturating_add(record.flights);
    }

    pub fn records(&self) -> &[FlightRecord] {
        &self.records
    }

    pub fn record(&self, id: RecordId) -> Option<&FlightRecord> {
        self.records.get(id.0)
    }

    pub fn airports(&self) -> &[Airport] {
        &self.airports
    }

    /// Sorted ascending.
    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records_in(&self, period: Period) -> impl Iterator<Item = &FlightRecord> + '_ {
        self.period_index
            .get(&period)
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(move |id| self.records.get(id.0))
    }

    pub fn airport(&self, name: &str) -> Option<&Airport> {
        self.airport_index
            .get(name)
            .and_then(|&idx| self.airports.get(idx))
    }

    pub fn airport_at(&self, key: &CoordKey) -> Option<&Airport> {
        self.key_index
            .get(key)
            .and_then(|&idx| self.airports.get(idx))
    }

    pub fn latest_period(&self) -> Option<Period> {
        self.periods.last().copied()
    }

    pub fn previous_period(&self, period: Period) -> Option<Period> {
        let pos = self.periods.binary_search(&period).ok()?;
        pos.checked_sub(1).map(|p| self.periods[p])
    }

    /// Next period for playback; the last period wraps around to the first.
    pub fn next_period_wrapping(&self, period: Period) -> Option<Period> {
        let first = *self.periods.first()?;
        match self.periods.binary_search(&period) {
            Ok(pos) => Some(self.periods.get(pos + 1).copied().unwrap_or(first)),
            Err(pos) => Some(self.periods.get(pos).copied().unwrap_or(first)),
        }
    }
}

fn first_value<'a>(props: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| props.get(*k))
        .find(|v| !v.is_null())
}

fn string_prop(props: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    match first_value(props, keys)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Numbers may arrive as JSON numbers or numeric strings.
fn lenient_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn number_prop(props: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    first_value(props, keys).and_then(lenient_number)
}

fn position_from_value(value: &Value) -> Option<LonLat> {
    let coords = value.as_array()?;
    let lon = coords.first().and_then(lenient_number)?;
    let lat = coords.get(1).and_then(lenient_number)?;
    Some(LonLat::new(lon, lat))
}

fn extract_endpoints(feature: &Value, props: &Map<String, Value>) -> Endpoints {
    let geometry = feature.get("geometry");
    let is_line = geometry
        .and_then(|g| g.get("type"))
        .and_then(Value::as_str)
        == Some("LineString");
    if is_line {
        if let Some(coords) = geometry
            .and_then(|g| g.get("coordinates"))
            .and_then(Value::as_array)
            .filter(|c| c.len() >= 2)
        {
            if let (Some(source), Some(target)) =
                (position_from_value(&coords[0]), position_from_value(&coords[1]))
            {
                return Endpoints {
                    source,
                    target,
                    degraded: false,
                };
            }
        }
    }

    let from_props = (
        number_prop(props, SOURCE_LON_KEYS),
        number_prop(props, SOURCE_LAT_KEYS),
        number_prop(props, TARGET_LON_KEYS),
        number_prop(props, TARGET_LAT_KEYS),
    );
    if let (Some(slon), Some(slat), Some(tlon), Some(tlat)) = from_props {
        return Endpoints {
            source: LonLat::new(slon, slat),
            target: LonLat::new(tlon, tlat),
            degraded: false,
        };
    }

    Endpoints {
        source: LonLat::ORIGIN,
        target: LonLat::ORIGIN,
        degraded: true,
    }
}

fn resolve_name(
    latest: &HashMap<CoordKey, String>,
    key: &CoordKey,
    own: Option<String>,
    degraded: bool,
) -> String {
    if !degraded {
        if let Some(name) = latest.get(key) {
            return name.clone();
        }
    }
    own.unwrap_or_else(|| key.to_string())
}

/// Accepts an array, a delimited string, or a lone scalar.
fn parse_airlines(value: Option<&Value>) -> Vec<String> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => {
            match AIRLINE_DELIMITERS.iter().find(|d| s.contains(**d)) {
                Some(delim) => s
                    .split(*delim)
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .map(str::to_string)
                    .collect(),
                None if s.trim().is_empty() => Vec::new(),
                None => vec![s.trim().to_string()],
            }
        }
        Some(other) => vec![other.to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn feature(source: &str, target: &str, period: &str, from: [f64; 2], to: [f64; 2]) -> Value {
        json!({
            "type": "Feature",
            "geometry": { "type": "LineString", "coordinates": [from, to] },
            "properties": {
                "source": source,
                "target": target,
                "period": period,
                "passengers": 1000,
                "flights": 10,
                "loadFactor": 80.5,
                "airlines": "China Airlines, EVA Air"
            }
        })
    }

    #[test]
    fn test_ingest_builds_indexes() {
        let features = vec![
            feature("TPE", "NRT", "202401", [121.2332, 25.0777], [140.3929, 35.772]),
            feature("NRT", "TPE", "202401", [140.3929, 35.772], [121.2332, 25.0777]),
            feature("TPE", "HKG", "202402", [121.2332, 25.0777], [113.9185, 22.308]),
        ];
        let store = RecordStore::ingest(&features);

        assert_eq!(store.records().len(), 3);
        assert_eq!(store.airports().len(), 3);
        assert_eq!(store.periods().len(), 2);
        assert_eq!(store.records_in(Period::parse("202401").unwrap()).count(), 2);

        let tpe = store.airport("TPE").unwrap();
        assert_eq!(tpe.cumulative_flights, 30);
        assert_eq!(tpe.cumulative_passengers, 3000.0);
        assert_eq!(tpe.coord_key.as_str(), "121.2332,25.0777");

        let first = &store.records()[0];
        assert_eq!(first.route_id, "TPE-NRT");
        assert_eq!(first.airlines, vec!["China Airlines", "EVA Air"]);
        assert!(first.connects("NRT", "TPE"));
    }

    #[test]
    fn test_property_coordinates_and_string_numbers() {
        let features = vec![json!({
            "type": "Feature",
            "geometry": null,
            "properties": {
                "出發機場": "臺北松山",
                "到達機場": "東京羽田",
                "年月": 202312,
                "載客人次": "1520.0",
                "航班數": "12.7",
                "平均載客率": "77.1",
                "出發經度": "121.5525",
                "出發緯度": "25.0694",
                "到達經度": 139.7798,
                "到達緯度": 35.5494,
                "航空公司列表": "中華航空、長榮航空"
            }
        })];
        let store = RecordStore::ingest(&features);
        let record = &store.records()[0];

        assert_eq!(record.source, "臺北松山");
        assert_eq!(record.period.code(), "202312");
        assert_eq!(record.passengers, 1520.0);
        assert_eq!(record.flights, 12);
        assert_eq!(record.source_position, LonLat::new(121.5525, 25.0694));
        assert_eq!(record.airlines, vec!["中華航空", "長榮航空"]);
    }

    #[test]
    fn test_missing_coordinates_degrade_to_placeholder() {
        let features = vec![json!({
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": [1.0, 2.0] },
            "properties": { "source": "A", "target": "B", "period": "202401" }
        })];
        let store = RecordStore::ingest(&features);

        assert_eq!(store.records().len(), 1);
        let record = &store.records()[0];
        assert!(record.source_position.is_placeholder());
        assert!(record.target_position.is_placeholder());
        assert_eq!(record.source, "A");
        assert!(store.airports().is_empty());
    }

    #[test]
    fn test_features_without_period_are_skipped() {
        let mut bad = feature("A", "B", "202401", [1.0, 1.0], [2.0, 2.0]);
        bad["properties"]["period"] = json!("2024-01");
        let features = vec![bad, json!({ "type": "Feature" })];
        let store = RecordStore::ingest(&features);
        assert!(store.is_empty());
    }

    #[test]
    fn test_huge_flight_counts_saturate() {
        let mut huge = feature("A", "B", "202401", [1.0, 1.0], [2.0, 2.0]);
        huge["properties"]["flights"] = json!(1e30);
        let store = RecordStore::ingest(&[huge.clone(), huge]);

        assert_eq!(store.records()[0].flights, u64::MAX);
        assert_eq!(store.airport("A").unwrap().cumulative_flights, u64::MAX);
    }

    #[test]
    fn test_airline_shapes() {
        assert_eq!(parse_airlines(Some(&json!("A|B| C"))), vec!["A", "B", "C"]);
        assert_eq!(parse_airlines(Some(&json!("甲，乙"))), vec!["甲", "乙"]);
        assert_eq!(parse_airlines(Some(&json!("Solo"))), vec!["Solo"]);
        assert_eq!(parse_airlines(Some(&json!(["X", "Y"]))), vec!["X", "Y"]);
        assert_eq!(parse_airlines(Some(&json!(42))), vec!["42"]);
        assert!(parse_airlines(None).is_empty());
        assert!(parse_airlines(Some(&Value::Null)).is_empty());
    }

    #[test]
    fn test_period_navigation() {
        let features = vec![
            feature("A", "B", "202311", [1.0, 1.0], [2.0, 2.0]),
            feature("A", "B", "202401", [1.0, 1.0], [2.0, 2.0]),
            feature("A", "B", "202312", [1.0, 1.0], [2.0, 2.0]),
        ];
        let store = RecordStore::ingest(&features);
        let p = |c: &str| Period::parse(c).unwrap();

        assert_eq!(store.periods(), &[p("202311"), p("202312"), p("202401")]);
        assert_eq!(store.previous_period(p("202312")), Some(p("202311")));
        assert_eq!(store.previous_period(p("202311")), None);
        assert_eq!(store.next_period_wrapping(p("202312")), Some(p("202401")));
        assert_eq!(store.next_period_wrapping(p("202401")), Some(p("202311")));
        assert_eq!(store.latest_period(), Some(p("202401")));
    }

    #[test]
    fn test_rejects_non_collection() {
        assert!(matches!(
            RecordStore::from_geojson_str(r#"{"type": "Feature"}"#),
            Err(FeedError::NotFeatureCollection(_))
        ));
        assert!(matches!(
            RecordStore::from_geojson_str("not json"),
            Err(FeedError::Json(_))
        ));
    }
}
