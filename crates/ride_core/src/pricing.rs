//! Flat-rate fare table for quoting trips on the client.
//!
//! Formula: `fare = round((base_fare + distance_km * per_km) * multiplier)`
//! where the multiplier doubles the fare for return trips.

use serde::{Deserialize, Serialize};

use crate::session::VehicleClass;

/// Fare multiplier applied when the rider books a return trip.
pub const RETURN_TRIP_MULTIPLIER: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FareRate {
    /// Flat amount charged for every trip.
    pub base_fare: f64,
    /// Amount charged per kilometre.
    pub per_km: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FareTable {
    pub bike: FareRate,
    pub taxi: FareRate,
    pub cargo: FareRate,
    pub return_multiplier: f64,
}

impl Default for FareTable {
    fn default() -> Self {
        Self {
            bike: FareRate {
                base_fare: 20.0,
                per_km: 8.0,
            },
            taxi: FareRate {
                base_fare: 50.0,
                per_km: 15.0,
            },
            cargo: FareRate {
                base_fare: 80.0,
                per_km: 25.0,
            },
            return_multiplier: RETURN_TRIP_MULTIPLIER,
        }
    }
}

impl FareTable {
    pub fn rate(&self, class: VehicleClass) -> FareRate {
        match class {
            VehicleClass::Bike => self.bike,
            VehicleClass::Taxi => self.taxi,
            VehicleClass::Cargo => self.cargo,
        }
    }

    /// Quote a trip. An absent, negative or non-finite distance yields `None`
    /// so an unrouted trip can never be booked for free.
    pub fn estimate(
        &self,
        class: VehicleClass,
        distance_km: Option<f64>,
        return_trip: bool,
    ) -> Option<f64> {
        let distance_km = distance_km.filter(|d| d.is_finite() && *d >= 0.0)?;
        let rate = self.rate(class);
        let multiplier = if return_trip {
            self.return_multiplier
        } else {
            1.0
        };
        Some(((rate.base_fare + distance_km * rate.per_km) * multiplier).round())
    }
}

/// Quote with the default table.
pub fn estimate(class: VehicleClass, distance_km: Option<f64>, return_trip: bool) -> Option<f64> {
    FareTable::default().estimate(class, distance_km, return_trip)
}
