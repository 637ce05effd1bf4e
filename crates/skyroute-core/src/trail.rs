//! Fading trail geometry for simulated aircraft moving along route arcs.

use crate::color::{PassengerColorScale, Rgba};
use crate::feed::{FlightRecord, RecordId};
use serde::Serialize;
use skyroute_geo::{wrapped_planar_distance, ArcPath, LonLat};

const MIN_AIRCRAFT: usize = 1;
const MAX_AIRCRAFT: usize = 5;
/// Aircraft per degree of planar route length.
const AIRCRAFT_PER_DEGREE: f64 = 2.0;
/// Phase shift between consecutive routes so they do not move in lockstep.
const ROUTE_PHASE_STEP: f64 = 0.1;

const TRAIL_FRACTION: f64 = 0.15;
const MIN_TRAIL_POINTS: usize = 3;
const MAX_TRAIL_POINTS: usize = 10;

const HEAD_WIDTH: f64 = 2.5;
const GLOW_WIDTH: f64 = 4.0;
const GLOW_OPACITY: f64 = 0.7;
const GLOW_BLUR: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrailKind {
    Head,
    Glow,
    Tail,
}

/// One straight piece of a trail. `flight` indexes the canonical record list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrailSegment {
    pub source: LonLat,
    pub target: LonLat,
    pub color: Rgba,
    pub width: f64,
    pub opacity: f64,
    pub blur: f64,
    pub flight: RecordId,
    pub route_index: usize,
    pub aircraft: usize,
    pub kind: TrailKind,
}

/// Number of aircraft drawn on a route, from its planar length.
pub fn aircraft_count(source: LonLat, target: LonLat) -> usize {
    let distance = wrapped_planar_distance(source, target);
    let count = (distance * AIRCRAFT_PER_DEGREE).ceil();
    if !count.is_finite() {
        return MIN_AIRCRAFT;
    }
    (count.max(0.0) as usize).clamp(MIN_AIRCRAFT, MAX_AIRCRAFT)
}

fn trail_points(segment_len: usize) -> usize {
    ((segment_len as f64 * TRAIL_FRACTION).floor() as usize).clamp(MIN_TRAIL_POINTS, MAX_TRAIL_POINTS)
}

/// Maps a global phase to `(segment, local phase)`, giving each segment a
/// share of time proportional to its sample count.
fn locate(segments: &[&[LonLat]], phase: f64) -> (usize, f64) {
    if segments.len() <= 1 {
        return (0, phase);
    }
    let total: usize = segments.iter().map(|s| s.len()).sum();
    if total == 0 {
        return (0, phase);
    }

    let mut accumulated = 0.0;
    for (j, segment) in segments.iter().enumerate() {
        let share = segment.len() as f64 / total as f64;
        let start = accumulated;
        accumulated += share;
        if phase < accumulated {
            return (j, (phase - start) / share);
        }
    }
    (segments.len() - 1, 1.0)
}

#[derive(Debug, Clone)]
pub struct TrailAnimator {
    cycle_ms: u64,
    highlight: Rgba,
}

impl TrailAnimator {
    pub fn new(cycle_ms: u64, highlight: Rgba) -> Self {
        Self {
            cycle_ms: cycle_ms.max(1),
            highlight,
        }
    }

    pub fn highlight(&self) -> Rgba {
        self.highlight
    }

    /// Normalized phase in `[0, 1)` for an elapsed clock time.
    pub fn phase_at(&self, elapsed_ms: f64) -> f64 {
        let cycle = self.cycle_ms as f64;
        let phase = elapsed_ms.rem_euclid(cycle) / cycle;
        if phase.is_finite() {
            phase
        } else {
            0.0
        }
    }

    /// Trail segments for every aircraft of one route.
    ///
    /// Nothing is emitted for an aircraft until its sample index reaches the
    /// trail length.
    pub fn trail(
        &self,
        flight: &FlightRecord,
        route_index: usize,
        arc: &ArcPath,
        color: Rgba,
        phase: f64,
    ) -> Vec<TrailSegment> {
        let segments = arc.segments();
        let count = aircraft_count(flight.source_position, flight.target_position);
        let mut out = Vec::new();

        for aircraft in 0..count {
            let offset = (aircraft as f64 / count as f64 + route_index as f64 * ROUTE_PHASE_STEP) % 1.0;
            let current = (phase + offset) % 1.0;
            let (segment_index, local) = locate(&segments, current);

            let Some(segment) = segments.get(segment_index).filter(|s| s.len() >= 2) else {
                continue;
            };
            let len = segment.len();
            let index = ((local * len as f64).floor().max(0.0) as usize).min(len - 1);
            let trail_len = trail_points(len);
            if index < trail_len {
                continue;
            }

            let points = &segment[index - trail_len..=index];
            let n = points.len();
            let make = |source: LonLat, target: LonLat, width: f64, opacity: f64, blur: f64, kind| {
                TrailSegment {
                    source,
                    target,
                    color,
                    width,
                    opacity,
                    blur,
                    flight: flight.id,
                    route_index,
                    aircraft,
                    kind,
                }
            };

            let (lead_from, lead_to) = (points[n - 2], points[n - 1]);
            out.push(make(lead_from, lead_to, HEAD_WIDTH, 1.0, 0.0, TrailKind::Head));
            out.push(make(lead_from, lead_to, GLOW_WIDTH, GLOW_OPACITY, GLOW_BLUR, TrailKind::Glow));

            for s in 0..n - 2 {
                // 0 at the tail end, approaching 1 near the head.
                let fade = (s as f64 / (n - 2) as f64).sqrt();
                out.push(make(
                    points[s],
                    points[s + 1],
                    0.5 + 1.5 * fade,
                    0.1 + 0.7 * fade,
                    2.0 - 2.0 * fade,
                    TrailKind::Tail,
                ));
            }
        }
        out
    }

    /// Trails for every visible flight in one tick. `arcs[i]` is the arc of
    /// `flights[i]`; a route matching `selected_route` in either direction is
    /// drawn in the highlight color.
    pub fn frame(
        &self,
        flights: &[FlightRecord],
        arcs: &[ArcPath],
        scale: &PassengerColorScale,
        selected_route: Option<(&str, &str)>,
        phase: f64,
    ) -> Vec<TrailSegment> {
        if flights.len() != arcs.len() {
            log::warn!(
                "Trail frame got {} flights but {} arcs; extra entries ignored",
                flights.len(),
                arcs.len()
            );
        }
        flights
            .iter()
            .zip(arcs)
            .enumerate()
            .flat_map(|(route_index, (flight, arc))| {
                let highlighted = selected_route.is_some_and(|(a, b)| flight.connects(a, b));
                let color = if highlighted {
                    self.highlight
                } else {
                    scale.color(flight.passengers)
                };
                self.trail(flight, route_index, arc, color, phase)
            })
            .collect()
    }
}
