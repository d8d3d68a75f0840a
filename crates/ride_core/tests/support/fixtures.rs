#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use ride_core::geo::Coordinate;
use ride_core::reconciler::{Channel, RawEvent};
use ride_core::session::{BookingDetails, VehicleClass};
use ride_core::signal::{
    AcceptancePayload, DriverLocationPayload, RideCompletedPayload, RideStatusPayload,
};

/// Metres per degree of latitude on the shared mean earth radius.
pub const METRES_PER_DEGREE_LAT: f64 = 111_194.93;

pub const RIDER_ID: &str = "U7";

pub fn pickup() -> Coordinate {
    Coordinate::new(11.33, 77.71)
}

pub fn dropoff() -> Coordinate {
    Coordinate::new(11.02, 77.01)
}

pub fn booked_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap()
}

/// The point `metres` due north of `origin`.
pub fn offset_north(origin: Coordinate, metres: f64) -> Coordinate {
    Coordinate::new(origin.latitude + metres / METRES_PER_DEGREE_LAT, origin.longitude)
}

pub fn taxi_booking() -> BookingDetails {
    BookingDetails {
        pickup: pickup(),
        dropoff: dropoff(),
        vehicle_class: VehicleClass::Taxi,
        quoted_fare: Some(1_340.0),
        booked_at: booked_at(),
    }
}

pub fn acceptance_payload(ride_id: &str, driver_id: &str, position: Coordinate) -> AcceptancePayload {
    AcceptancePayload {
        ride_id: Some(ride_id.to_string()),
        driver_id: Some(driver_id.to_string()),
        driver_name: Some(format!("Driver {driver_id}")),
        driver_mobile: Some("9000000000".to_string()),
        vehicle_type: Some("taxi".to_string()),
        driver_lat: Some(position.latitude),
        driver_lng: Some(position.longitude),
        target_user_id: Some(RIDER_ID.to_string()),
        success: Some(true),
    }
}

pub fn accepted(channel: Channel, ride_id: &str, driver_id: &str, position: Coordinate) -> RawEvent {
    RawEvent::Acceptance {
        channel,
        payload: acceptance_payload(ride_id, driver_id, position),
    }
}

pub fn live_location(driver_id: &str, position: Coordinate) -> RawEvent {
    RawEvent::DriverLocation(DriverLocationPayload {
        driver_id: Some(driver_id.to_string()),
        lat: Some(position.latitude),
        lng: Some(position.longitude),
        status: Some("onRide".to_string()),
    })
}

pub fn status_update(ride_id: &str, status: &str) -> RawEvent {
    RawEvent::RideStatus {
        channel: Channel::StatusUpdate,
        payload: RideStatusPayload {
            ride_id: Some(ride_id.to_string()),
            status: Some(status.to_string()),
            ..RideStatusPayload::default()
        },
    }
}

pub fn completed(ride_id: &str, distance: Option<f64>, charge: Option<f64>) -> RawEvent {
    RawEvent::RideCompleted(RideCompletedPayload {
        ride_id: Some(ride_id.to_string()),
        distance,
        travel_time: Some("42 mins".to_string()),
        charge,
    })
}
