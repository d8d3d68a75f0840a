//! The ride session aggregate and the types it is built from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;

/// Ride lifecycle status.
///
/// Ordering between statuses is defined by the transition table in
/// [`crate::machine`], not by the declaration order here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RideStatus {
    Idle,
    Searching,
    OnTheWay,
    Arrived,
    Started,
    Completed,
}

impl RideStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RideStatus::Idle => "idle",
            RideStatus::Searching => "searching",
            RideStatus::OnTheWay => "onTheWay",
            RideStatus::Arrived => "arrived",
            RideStatus::Started => "started",
            RideStatus::Completed => "completed",
        }
    }

    /// Statuses during which a driver is assigned and tracked.
    pub fn has_driver(&self) -> bool {
        matches!(
            self,
            RideStatus::OnTheWay | RideStatus::Arrived | RideStatus::Started
        )
    }

    /// Statuses during which a ride exists on the dispatch side.
    pub fn is_active(&self) -> bool {
        matches!(self, RideStatus::Searching) || self.has_driver()
    }

    /// A new booking may only be created from these statuses.
    pub fn accepts_booking(&self) -> bool {
        matches!(self, RideStatus::Idle | RideStatus::Completed)
    }
}

impl std::fmt::Display for RideStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleClass {
    Bike,
    Taxi,
    Cargo,
}

impl VehicleClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleClass::Bike => "bike",
            VehicleClass::Taxi => "taxi",
            VehicleClass::Cargo => "cargo",
        }
    }

    /// Parse the vehicle type strings used on the wire. `port` is the legacy
    /// name for cargo vehicles.
    pub fn from_wire(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bike" => Some(VehicleClass::Bike),
            "taxi" => Some(VehicleClass::Taxi),
            "cargo" | "port" => Some(VehicleClass::Cargo),
            _ => None,
        }
    }
}

/// The driver bound to a ride once acceptance has been processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverAssignment {
    pub driver_id: String,
    pub display_name: String,
    pub mobile: String,
    pub vehicle_class: VehicleClass,
    pub last_known_position: Option<Coordinate>,
    #[serde(default)]
    pub cumulative_traveled_km: f64,
}

/// Server-provided completion figures; every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSummary {
    pub distance_km: Option<f64>,
    pub travel_time: Option<String>,
    pub charge: Option<f64>,
}

/// What the rider is shown once a ride completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionSummary {
    pub distance_km: f64,
    pub travel_time: Option<String>,
    pub charge: Option<f64>,
}

/// Trip details captured when the rider submits a booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDetails {
    pub pickup: Coordinate,
    pub dropoff: Coordinate,
    pub vehicle_class: VehicleClass,
    pub quoted_fare: Option<f64>,
    pub booked_at: DateTime<Utc>,
}

/// Ride state read back from durable storage at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveredRide {
    pub ride_id: String,
    pub booked_at: DateTime<Utc>,
    pub driver: Option<DriverAssignment>,
    pub pickup: Option<Coordinate>,
    pub dropoff: Option<Coordinate>,
    pub otp: Option<String>,
    pub vehicle_class: Option<VehicleClass>,
    pub quoted_fare: Option<f64>,
    /// Last saved phase; only `Arrived` and `Started` are resumed as such.
    #[serde(default)]
    pub status: Option<RideStatus>,
    #[serde(default)]
    pub driver_arrived_notified: bool,
    #[serde(default)]
    pub completion_notified: bool,
}

/// The single live ride per client. Only [`crate::machine::RideStateMachine`]
/// produces new values of this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideSession {
    pub ride_id: Option<String>,
    pub status: RideStatus,
    pub booked_at: Option<DateTime<Utc>>,
    pub driver: Option<DriverAssignment>,
    pub pickup: Option<Coordinate>,
    pub dropoff: Option<Coordinate>,
    pub vehicle_class: Option<VehicleClass>,
    pub quoted_fare: Option<f64>,
    pub otp: Option<String>,
    pub driver_arrived_notified: bool,
    pub completion_notified: bool,
    pub completion: Option<CompletionSummary>,
}

impl Default for RideSession {
    fn default() -> Self {
        Self::idle()
    }
}

impl RideSession {
    pub fn idle() -> Self {
        Self {
            ride_id: None,
            status: RideStatus::Idle,
            booked_at: None,
            driver: None,
            pickup: None,
            dropoff: None,
            vehicle_class: None,
            quoted_fare: None,
            otp: None,
            driver_arrived_notified: false,
            completion_notified: false,
            completion: None,
        }
    }

    /// Idle with nothing in flight: the only state recovery may seed.
    pub fn is_pristine(&self) -> bool {
        self.status == RideStatus::Idle && self.ride_id.is_none() && self.booked_at.is_none()
    }

    /// Idle with a booking request sent but not yet acknowledged.
    pub fn booking_in_flight(&self) -> bool {
        self.status == RideStatus::Idle && self.booked_at.is_some()
    }

    pub fn driver_id(&self) -> Option<&str> {
        self.driver.as_ref().map(|driver| driver.driver_id.as_str())
    }

    pub fn is_assigned_to(&self, driver_id: &str) -> bool {
        self.driver_id() == Some(driver_id)
    }

    /// True when the session is bound to `ride_id`.
    pub fn is_ride(&self, ride_id: &str) -> bool {
        self.ride_id.as_deref() == Some(ride_id)
    }
}
