use crate::feed::FlightRecord;
use serde::Serialize;

pub type Rgba = [u8; 4];

/// Color for routes with no passengers.
pub const BASE_BLUE: Rgba = [59, 130, 246, 255];
const GREEN: [f64; 3] = [0.0, 200.0, 0.0];
const YELLOW: [f64; 3] = [255.0, 255.0, 0.0];
const RED: [f64; 3] = [255.0, 0.0, 0.0];

/// Log-scaled passenger ramp: blue, green, yellow, red.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PassengerColorScale {
    pub min: f64,
    pub max: f64,
}

impl PassengerColorScale {
    /// Domain is `[max(1, min), max]` over the given flights.
    pub fn from_flights(flights: &[FlightRecord]) -> Self {
        if flights.is_empty() {
            return Self { min: 0.0, max: 0.0 };
        }
        let min = flights
            .iter()
            .map(|f| f.passengers)
            .fold(f64::INFINITY, f64::min);
        let max = flights
            .iter()
            .map(|f| f.passengers)
            .fold(f64::NEG_INFINITY, f64::max);
        Self {
            min: min.max(1.0),
            max,
        }
    }

    /// Position of `passengers` on the log domain, clamped to `[0, 1]`.
    /// A degenerate domain maps everything to the midpoint.
    pub fn normalize(&self, passengers: f64) -> f64 {
        if self.min <= 0.0 || self.max <= 0.0 {
            return 0.0;
        }
        let lo = self.min.ln();
        let hi = self.max.ln();
        if (hi - lo).abs() < f64::EPSILON {
            return 0.5;
        }
        ((passengers.max(f64::MIN_POSITIVE).ln() - lo) / (hi - lo)).clamp(0.0, 1.0)
    }

    pub fn color(&self, passengers: f64) -> Rgba {
        if passengers <= 0.0 || self.max <= 0.0 {
            return BASE_BLUE;
        }
        let t = self.normalize(passengers);
        let blue = [
            f64::from(BASE_BLUE[0]),
            f64::from(BASE_BLUE[1]),
            f64::from(BASE_BLUE[2]),
        ];
        let rgb = if t < 0.33 {
            mix(blue, GREEN, t * 3.0)
        } else if t < 0.66 {
            mix(GREEN, YELLOW, (t - 0.33) * 3.0)
        } else {
            mix(YELLOW, RED, (t - 0.66) * 3.0)
        };
        [rgb[0], rgb[1], rgb[2], 255]
    }
}

fn mix(from: [f64; 3], to: [f64; 3], t: f64) -> [u8; 3] {
    let t = t.clamp(0.0, 1.0);
    let channel = |i: usize| (from[i] * (1.0 - t) + to[i] * t).floor().clamp(0.0, 255.0) as u8;
    [channel(0), channel(1), channel(2)]
}
