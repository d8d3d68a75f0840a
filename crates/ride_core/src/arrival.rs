//! Proximity checks that decide "driver arrived" transitions.

use crate::geo::{distance_m, Coordinate};

/// Distance below which a driver counts as being at the pickup or dropoff.
pub const DEFAULT_ARRIVAL_THRESHOLD_M: f64 = 50.0;

/// True when `a` and `b` are at most `threshold_m` metres apart.
pub fn is_within(threshold_m: f64, a: Coordinate, b: Coordinate) -> bool {
    distance_m(a, b) <= threshold_m
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrivalDetector {
    threshold_m: f64,
}

impl Default for ArrivalDetector {
    fn default() -> Self {
        Self::new(DEFAULT_ARRIVAL_THRESHOLD_M)
    }
}

impl ArrivalDetector {
    pub fn new(threshold_m: f64) -> Self {
        Self { threshold_m }
    }

    pub fn threshold_m(&self) -> f64 {
        self.threshold_m
    }

    pub fn is_within(&self, a: Coordinate, b: Coordinate) -> bool {
        is_within(self.threshold_m, a, b)
    }

    /// Arrival check against an optional target; no target means no arrival.
    pub fn has_reached(&self, position: Coordinate, target: Option<Coordinate>) -> bool {
        target.is_some_and(|target| self.is_within(position, target))
    }
}
