//! Durable copy of the live ride, written only from transition effects.
//!
//! Keys: `currentRideId`, `acceptedDriver` (JSON), `bookedAt` (RFC 3339) and
//! `rideTrip` (JSON, including the phase and notification flags). Anything
//! unreadable is treated as absent and cleared.

use chrono::{DateTime, Utc};
use ride_core::geo::Coordinate;
use ride_core::session::{DriverAssignment, RecoveredRide, RideSession, RideStatus, VehicleClass};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::adapters::store::KeyValueStore;
use crate::error::StoreError;

pub const KEY_CURRENT_RIDE_ID: &str = "currentRideId";
pub const KEY_ACCEPTED_DRIVER: &str = "acceptedDriver";
pub const KEY_BOOKED_AT: &str = "bookedAt";
pub const KEY_RIDE_TRIP: &str = "rideTrip";

const ALL_KEYS: [&str; 4] = [
    KEY_CURRENT_RIDE_ID,
    KEY_ACCEPTED_DRIVER,
    KEY_BOOKED_AT,
    KEY_RIDE_TRIP,
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PersistedTrip {
    pickup: Option<Coordinate>,
    dropoff: Option<Coordinate>,
    otp: Option<String>,
    vehicle_class: Option<VehicleClass>,
    quoted_fare: Option<f64>,
    status: Option<RideStatus>,
    driver_arrived_notified: bool,
    completion_notified: bool,
}

#[derive(Debug, thiserror::Error)]
enum LoadError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{key} is corrupt: {details}")]
    Corrupt { key: &'static str, details: String },
}

pub struct PersistedRideStore<S> {
    store: S,
}

impl<S: KeyValueStore> PersistedRideStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    /// Read the saved ride. `now` stands in for a missing `bookedAt`.
    pub async fn load(&self, now: DateTime<Utc>) -> Option<RecoveredRide> {
        match self.read(now).await {
            Ok(recovered) => recovered,
            Err(err) => {
                warn!(error = %err, "discarding unreadable persisted ride");
                if let Err(err) = self.clear().await {
                    warn!(error = %err, "failed to clear persisted ride");
                }
                None
            }
        }
    }

    async fn read(&self, now: DateTime<Utc>) -> Result<Option<RecoveredRide>, LoadError> {
        let Some(ride_id) = self
            .store
            .get(KEY_CURRENT_RIDE_ID)
            .await?
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
        else {
            return Ok(None);
        };

        let driver = match self.store.get(KEY_ACCEPTED_DRIVER).await? {
            Some(raw) => Some(parse_json::<DriverAssignment>(KEY_ACCEPTED_DRIVER, &raw)?),
            None => None,
        };
        let booked_at = match self.store.get(KEY_BOOKED_AT).await? {
            Some(raw) => DateTime::parse_from_rfc3339(raw.trim())
                .map(|at| at.with_timezone(&Utc))
                .map_err(|err| LoadError::Corrupt {
                    key: KEY_BOOKED_AT,
                    details: err.to_string(),
                })?,
            None => now,
        };
        let trip = match self.store.get(KEY_RIDE_TRIP).await? {
            Some(raw) => parse_json::<PersistedTrip>(KEY_RIDE_TRIP, &raw)?,
            None => PersistedTrip::default(),
        };

        info!(ride_id = %ride_id, has_driver = driver.is_some(), "recovered persisted ride");
        Ok(Some(RecoveredRide {
            ride_id,
            booked_at,
            driver,
            pickup: trip.pickup,
            dropoff: trip.dropoff,
            otp: trip.otp,
            vehicle_class: trip.vehicle_class,
            quoted_fare: trip.quoted_fare,
            status: trip.status,
            driver_arrived_notified: trip.driver_arrived_notified,
            completion_notified: trip.completion_notified,
        }))
    }

    /// Write the ride-scoped parts of `session`; a session without a ride
    /// clears the store instead.
    pub async fn save(&self, session: &RideSession) -> Result<(), StoreError> {
        let Some(ride_id) = session.ride_id.as_deref() else {
            return self.clear().await;
        };
        let trip = PersistedTrip {
            pickup: session.pickup,
            dropoff: session.dropoff,
            otp: session.otp.clone(),
            vehicle_class: session.vehicle_class,
            quoted_fare: session.quoted_fare,
            status: Some(session.status),
            driver_arrived_notified: session.driver_arrived_notified,
            completion_notified: session.completion_notified,
        };
        self.store
            .set(KEY_RIDE_TRIP, encode(KEY_RIDE_TRIP, &trip)?)
            .await?;
        if let Some(booked_at) = session.booked_at {
            self.store.set(KEY_BOOKED_AT, booked_at.to_rfc3339()).await?;
        }
        match &session.driver {
            Some(driver) => {
                self.store
                    .set(KEY_ACCEPTED_DRIVER, encode(KEY_ACCEPTED_DRIVER, driver)?)
                    .await?
            }
            None => self.store.remove(KEY_ACCEPTED_DRIVER).await?,
        }
        // Written last: recovery is keyed on it.
        self.store
            .set(KEY_CURRENT_RIDE_ID, ride_id.to_string())
            .await
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        for key in ALL_KEYS {
            self.store.remove(key).await?;
        }
        Ok(())
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(key: &'static str, raw: &str) -> Result<T, LoadError> {
    serde_json::from_str(raw).map_err(|err| LoadError::Corrupt {
        key,
        details: err.to_string(),
    })
}

fn encode<T: Serialize>(key: &'static str, value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|source| StoreError::Encode { key, source })
}
