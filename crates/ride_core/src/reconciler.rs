//! Folds signals from redundant channels into normalized ride events.
//!
//! The same logical acceptance can arrive on several channels and in any
//! order. The reconciler turns each raw signal into at most one
//! [`RideEvent`]; a repeat of an acceptance that has already been applied
//! becomes a position refresh, and an acceptance from a second driver is
//! discarded. Ordering correctness is left to the state machine guards.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::event::RideEvent;
use crate::geo::Coordinate;
use crate::session::{
    DriverAssignment, RecoveredRide, RideSession, RideStatus, ServerSummary, VehicleClass,
};
use crate::signal::{
    AcceptancePayload, BookingAckPayload, DriverLocationPayload, RideCompletedPayload,
    RideStatusPayload,
};

pub const DEFAULT_DRIVER_NAME: &str = "Driver";
pub const DEFAULT_DRIVER_MOBILE: &str = "N/A";

/// Where a signal came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Channel {
    /// `rideAccepted`
    Push,
    /// `rideAcceptedBroadcast`, addressed to one rider by `targetUserId`
    Broadcast,
    /// `backupRideAccepted`
    Backup,
    /// `driverDataResponse`
    DriverData,
    /// `rideStatusResponse` and the `getRideStatus` ack
    StatusPoll,
    /// `rideStatusUpdate`
    StatusUpdate,
    Recovery,
    /// `driverLiveLocationUpdate`
    LiveLocation,
    /// `bookRide` ack and `rideCreated`
    BookingAck,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Push => "push",
            Channel::Broadcast => "broadcast",
            Channel::Backup => "backup",
            Channel::DriverData => "driverData",
            Channel::StatusPoll => "statusPoll",
            Channel::StatusUpdate => "statusUpdate",
            Channel::Recovery => "recovery",
            Channel::LiveLocation => "liveLocation",
            Channel::BookingAck => "bookingAck",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawEvent {
    Acceptance {
        channel: Channel,
        payload: AcceptancePayload,
    },
    RideStatus {
        channel: Channel,
        payload: RideStatusPayload,
    },
    DriverLocation(DriverLocationPayload),
    RideCompleted(RideCompletedPayload),
    BookingCreated(BookingAckPayload),
    Recovered(RecoveredRide),
}

impl RawEvent {
    pub fn channel(&self) -> Channel {
        match self {
            RawEvent::Acceptance { channel, .. } | RawEvent::RideStatus { channel, .. } => *channel,
            RawEvent::DriverLocation(_) => Channel::LiveLocation,
            RawEvent::RideCompleted(_) => Channel::Push,
            RawEvent::BookingCreated(_) => Channel::BookingAck,
            RawEvent::Recovered(_) => Channel::Recovery,
        }
    }
}

/// Why a raw signal produced no event. Discards are diagnostics, not failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Discard {
    #[error("{channel} payload is missing {field}")]
    Malformed {
        channel: Channel,
        field: &'static str,
    },
    #[error("driver {driver_id} sent an invalid coordinate")]
    InvalidCoordinate { driver_id: String },
    #[error("broadcast is addressed to another rider")]
    NotAddressedToRider,
    #[error("{channel} reported failure")]
    Unsuccessful { channel: Channel },
    #[error("ride {ride_id} is not the current ride")]
    ForeignRide { ride_id: String },
    #[error("driver {assigned} already accepted; ignoring {driver_id}")]
    FirstAcceptanceWins { assigned: String, driver_id: String },
    #[error("driver {driver_id} is not assigned to this ride")]
    OtherDriver { driver_id: String },
    #[error("no ride is active")]
    NoActiveRide,
    #[error("unknown ride status {status:?}")]
    UnknownStatus { status: String },
    #[error("ride {ride_id} is still waiting for a driver")]
    Pending { ride_id: String },
    #[error("persisted ride ignored because a session is already live")]
    AlreadyLive,
    #[error("ride {ride_id} is already confirmed")]
    Duplicate { ride_id: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reconciled {
    Apply(RideEvent),
    Discard(Discard),
}

impl From<Result<RideEvent, Discard>> for Reconciled {
    fn from(result: Result<RideEvent, Discard>) -> Self {
        match result {
            Ok(event) => Reconciled::Apply(event),
            Err(discard) => Reconciled::Discard(discard),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RideAcceptanceReconciler {
    rider_id: Option<String>,
}

impl RideAcceptanceReconciler {
    /// `rider_id` filters broadcast acceptances; without one every broadcast
    /// is discarded.
    pub fn new(rider_id: Option<String>) -> Self {
        Self { rider_id }
    }

    pub fn rider_id(&self) -> Option<&str> {
        self.rider_id.as_deref()
    }

    pub fn reconcile(&self, session: &RideSession, raw: RawEvent) -> Reconciled {
        match raw {
            RawEvent::Acceptance { channel, payload } => self.acceptance(session, channel, payload),
            RawEvent::RideStatus { channel, payload } => self.ride_status(session, channel, payload),
            RawEvent::DriverLocation(payload) => driver_location(session, payload),
            RawEvent::RideCompleted(payload) => ride_completed(session, payload),
            RawEvent::BookingCreated(payload) => booking_created(session, payload),
            RawEvent::Recovered(recovered) => recovered_ride(session, recovered),
        }
        .into()
    }

    fn acceptance(
        &self,
        session: &RideSession,
        channel: Channel,
        payload: AcceptancePayload,
    ) -> Result<RideEvent, Discard> {
        match channel {
            Channel::Broadcast => {
                let addressed = matches!(
                    (&payload.target_user_id, &self.rider_id),
                    (Some(target), Some(rider)) if target == rider
                );
                if !addressed {
                    return Err(Discard::NotAddressedToRider);
                }
            }
            Channel::DriverData if payload.success == Some(false) => {
                return Err(Discard::Unsuccessful { channel });
            }
            _ => {}
        }

        let ride_id = payload.ride_id.ok_or(Discard::Malformed {
            channel,
            field: "rideId",
        })?;
        let driver_id = payload.driver_id.ok_or(Discard::Malformed {
            channel,
            field: "driverId",
        })?;

        match &session.ride_id {
            Some(current) if *current != ride_id => {
                return Err(Discard::ForeignRide { ride_id });
            }
            None if !session.booking_in_flight() => return Err(Discard::NoActiveRide),
            _ => {}
        }

        let position = Coordinate::from_parts(payload.driver_lat, payload.driver_lng);
        if let Some(assigned) = session.driver_id() {
            if assigned != driver_id {
                return Err(Discard::FirstAcceptanceWins {
                    assigned: assigned.to_string(),
                    driver_id,
                });
            }
            if session.status != RideStatus::Searching {
                return Ok(RideEvent::DriverPositionRefresh {
                    driver_id,
                    position,
                });
            }
        }

        let vehicle_class = payload
            .vehicle_type
            .as_deref()
            .and_then(VehicleClass::from_wire)
            .or(session.vehicle_class)
            .unwrap_or(VehicleClass::Taxi);
        Ok(RideEvent::DriverAssigned {
            ride_id,
            driver: DriverAssignment {
                driver_id,
                display_name: non_blank(payload.driver_name)
                    .unwrap_or_else(|| DEFAULT_DRIVER_NAME.to_string()),
                mobile: non_blank(payload.driver_mobile)
                    .unwrap_or_else(|| DEFAULT_DRIVER_MOBILE.to_string()),
                vehicle_class,
                last_known_position: position,
                cumulative_traveled_km: 0.0,
            },
        })
    }

    fn ride_status(
        &self,
        session: &RideSession,
        channel: Channel,
        payload: RideStatusPayload,
    ) -> Result<RideEvent, Discard> {
        let ride_id = payload.ride_id.clone().ok_or(Discard::Malformed {
            channel,
            field: "rideId",
        })?;
        let status = payload
            .status
            .as_deref()
            .map(|status| status.trim().to_ascii_lowercase());

        match status.as_deref() {
            Some("completed") => {
                bound_to_ride(session, &ride_id)?;
                Ok(RideEvent::RideCompleted {
                    ride_id: Some(ride_id),
                    summary: ServerSummary {
                        distance_km: payload.distance,
                        travel_time: payload.travel_time,
                        charge: payload.charge,
                    },
                })
            }
            Some("started") => {
                bound_to_ride(session, &ride_id)?;
                Ok(RideEvent::RideStarted { ride_id })
            }
            Some("arrived") => {
                bound_to_ride(session, &ride_id)?;
                Ok(RideEvent::ArrivalReported { ride_id })
            }
            _ if payload.driver_id.is_some() => {
                self.acceptance(session, channel, payload.as_acceptance())
            }
            None | Some("searching" | "pending" | "requested") => {
                bound_to_ride(session, &ride_id)?;
                Err(Discard::Pending { ride_id })
            }
            Some(other) => Err(Discard::UnknownStatus {
                status: other.to_string(),
            }),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn bound_to_ride(session: &RideSession, ride_id: &str) -> Result<(), Discard> {
    match &session.ride_id {
        Some(current) if current == ride_id => Ok(()),
        Some(_) => Err(Discard::ForeignRide {
            ride_id: ride_id.to_string(),
        }),
        None => Err(Discard::NoActiveRide),
    }
}

fn driver_location(
    session: &RideSession,
    payload: DriverLocationPayload,
) -> Result<RideEvent, Discard> {
    let driver_id = payload.driver_id.ok_or(Discard::Malformed {
        channel: Channel::LiveLocation,
        field: "driverId",
    })?;
    if !session.status.has_driver() {
        return Err(Discard::NoActiveRide);
    }
    if !session.is_assigned_to(&driver_id) {
        return Err(Discard::OtherDriver { driver_id });
    }
    let position = Coordinate::from_parts(payload.lat, payload.lng)
        .ok_or_else(|| Discard::InvalidCoordinate {
            driver_id: driver_id.clone(),
        })?;
    Ok(RideEvent::DriverPositionRefresh {
        driver_id,
        position: Some(position),
    })
}

fn ride_completed(
    session: &RideSession,
    payload: RideCompletedPayload,
) -> Result<RideEvent, Discard> {
    match &payload.ride_id {
        Some(ride_id) => bound_to_ride(session, ride_id)?,
        None if session.ride_id.is_none() => return Err(Discard::NoActiveRide),
        None => {}
    }
    Ok(RideEvent::RideCompleted {
        ride_id: payload.ride_id,
        summary: ServerSummary {
            distance_km: payload.distance,
            travel_time: payload.travel_time,
            charge: payload.charge,
        },
    })
}

fn booking_created(session: &RideSession, payload: BookingAckPayload) -> Result<RideEvent, Discard> {
    if payload.success == Some(false) {
        if !session.booking_in_flight() {
            return Err(Discard::Unsuccessful {
                channel: Channel::BookingAck,
            });
        }
        return Ok(RideEvent::BookingFailed {
            reason: non_blank(payload.message).unwrap_or_else(|| "booking rejected".to_string()),
        });
    }
    let ride_id = payload.ride_id.ok_or(Discard::Malformed {
        channel: Channel::BookingAck,
        field: "rideId",
    })?;
    if session.is_ride(&ride_id) {
        // An acceptance that overtook the ack left the ride without its OTP.
        if session.status.has_driver() && session.otp.is_none() && payload.otp.is_some() {
            return Ok(RideEvent::BookingAcknowledged {
                ride_id,
                otp: payload.otp,
            });
        }
        return Err(Discard::Duplicate { ride_id });
    }
    if !session.booking_in_flight() {
        return Err(match session.ride_id {
            Some(_) => Discard::ForeignRide { ride_id },
            None => Discard::NoActiveRide,
        });
    }
    Ok(RideEvent::BookingAcknowledged {
        ride_id,
        otp: payload.otp,
    })
}

fn recovered_ride(session: &RideSession, recovered: RecoveredRide) -> Result<RideEvent, Discard> {
    if !session.is_pristine() {
        return Err(Discard::AlreadyLive);
    }
    Ok(RideEvent::SessionRecovered(recovered))
}
