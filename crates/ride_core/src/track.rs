//! Running distance travelled by the assigned driver.
//!
//! The total is advisory: the server's completion summary wins when it
//! carries a distance.

use crate::geo::{distance_km, Coordinate};
use crate::session::DriverAssignment;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DriverTrackSmoother;

impl DriverTrackSmoother {
    /// Kilometres between consecutive samples; zero for the first sample.
    pub fn accumulate(prev: Option<Coordinate>, next: Coordinate) -> f64 {
        prev.map(|prev| distance_km(prev, next)).unwrap_or(0.0)
    }

    /// Move the driver to `next`. Distance is only added when `counting`.
    pub fn advance(&self, driver: &mut DriverAssignment, next: Coordinate, counting: bool) {
        if counting {
            let step = Self::accumulate(driver.last_known_position, next);
            if step.is_finite() {
                driver.cumulative_traveled_km += step;
            }
        }
        driver.last_known_position = Some(next);
    }
}
