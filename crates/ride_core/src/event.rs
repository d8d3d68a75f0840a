//! Normalized ride events and the side effects transitions emit.
//!
//! Events are produced by the reconciler (for transport signals) or by the
//! client runtime (for commands and timer ticks). Effects are data: the caller
//! performs them after adopting the new session.

use serde::Serialize;

use crate::geo::Coordinate;
use crate::session::{
    BookingDetails, CompletionSummary, DriverAssignment, RecoveredRide, RideStatus, ServerSummary,
    VehicleClass,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RideEvent {
    BookingSubmitted(BookingDetails),
    BookingAcknowledged {
        ride_id: String,
        otp: Option<String>,
    },
    BookingFailed {
        reason: String,
    },
    SessionRecovered(RecoveredRide),
    DriverAssigned {
        ride_id: String,
        driver: DriverAssignment,
    },
    DriverPositionRefresh {
        driver_id: String,
        position: Option<Coordinate>,
    },
    ArrivalReported {
        ride_id: String,
    },
    RideStarted {
        ride_id: String,
    },
    RideCompleted {
        ride_id: Option<String>,
        summary: ServerSummary,
    },
    AcceptancePollTick {
        ride_id: Option<String>,
    },
    NoDriverTimeout {
        ride_id: Option<String>,
    },
    ArrivalRecheck {
        ride_id: Option<String>,
    },
    RiderLocationTick {
        ride_id: Option<String>,
        position: Coordinate,
    },
    TransportReconnected,
    RiderCancelled,
    ResetAcknowledged,
}

impl RideEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RideEvent::BookingSubmitted(_) => "bookingSubmitted",
            RideEvent::BookingAcknowledged { .. } => "bookingAcknowledged",
            RideEvent::BookingFailed { .. } => "bookingFailed",
            RideEvent::SessionRecovered(_) => "sessionRecovered",
            RideEvent::DriverAssigned { .. } => "driverAssigned",
            RideEvent::DriverPositionRefresh { .. } => "driverPositionRefresh",
            RideEvent::ArrivalReported { .. } => "arrivalReported",
            RideEvent::RideStarted { .. } => "rideStarted",
            RideEvent::RideCompleted { .. } => "rideCompleted",
            RideEvent::AcceptancePollTick { .. } => "acceptancePollTick",
            RideEvent::NoDriverTimeout { .. } => "noDriverTimeout",
            RideEvent::ArrivalRecheck { .. } => "arrivalRecheck",
            RideEvent::RiderLocationTick { .. } => "riderLocationTick",
            RideEvent::TransportReconnected => "transportReconnected",
            RideEvent::RiderCancelled => "riderCancelled",
            RideEvent::ResetAcknowledged => "resetAcknowledged",
        }
    }
}

/// Timers owned by the transition table. Each one is started by the
/// transition that enters its phase and cancelled by the one that leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TimerKind {
    AcceptancePoll,
    NoDriverTimeout,
    ArrivalRecheck,
    RiderLocationBroadcast,
}

impl TimerKind {
    pub const ALL: [TimerKind; 4] = [
        TimerKind::AcceptancePoll,
        TimerKind::NoDriverTimeout,
        TimerKind::ArrivalRecheck,
        TimerKind::RiderLocationBroadcast,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimerKind::AcceptancePoll => "acceptancePoll",
            TimerKind::NoDriverTimeout => "noDriverTimeout",
            TimerKind::ArrivalRecheck => "arrivalRecheck",
            TimerKind::RiderLocationBroadcast => "riderLocationBroadcast",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        TimerKind::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    pub fn is_repeating(&self) -> bool {
        !matches!(self, TimerKind::NoDriverTimeout)
    }

    /// Whether a tick of this timer is still meaningful in `status`.
    pub fn scoped_to(&self, status: RideStatus) -> bool {
        match self {
            TimerKind::AcceptancePoll | TimerKind::NoDriverTimeout => {
                status == RideStatus::Searching
            }
            TimerKind::ArrivalRecheck => status == RideStatus::OnTheWay,
            TimerKind::RiderLocationBroadcast => status.has_driver(),
        }
    }

    /// The event a tick of this timer feeds into the state machine.
    ///
    /// The rider location broadcast has nothing to send until the device has
    /// reported a position, so it yields `None` without one.
    pub fn tick_event(
        &self,
        ride_id: Option<String>,
        rider_position: Option<Coordinate>,
    ) -> Option<RideEvent> {
        match self {
            TimerKind::AcceptancePoll => Some(RideEvent::AcceptancePollTick { ride_id }),
            TimerKind::NoDriverTimeout => Some(RideEvent::NoDriverTimeout { ride_id }),
            TimerKind::ArrivalRecheck => Some(RideEvent::ArrivalRecheck { ride_id }),
            TimerKind::RiderLocationBroadcast => rider_position
                .map(|position| RideEvent::RiderLocationTick { ride_id, position }),
        }
    }
}

/// User-visible notifications.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Notice {
    BookingConfirmed {
        ride_id: String,
        otp: Option<String>,
    },
    BookingFailed {
        reason: String,
    },
    DriverAccepted {
        driver_id: String,
        display_name: String,
        mobile: String,
        vehicle_class: VehicleClass,
    },
    DriverArrived {
        display_name: String,
        otp: Option<String>,
    },
    RideStarted,
    RideCompleted(CompletionSummary),
    NoDriverFound,
    RideCancelled,
}

/// Messages for the driver and dispatch side.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Outbound {
    RequestRideStatus {
        ride_id: String,
    },
    DriverReachedDestination {
        ride_id: String,
        driver_id: String,
        distance_km: f64,
    },
    RiderLocation {
        ride_id: String,
        position: Coordinate,
    },
    CancelRide {
        ride_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum Effect {
    Persist,
    ClearPersisted,
    StartTimer(TimerKind),
    CancelTimer(TimerKind),
    Notify(Notice),
    Emit(Outbound),
}

impl Effect {
    /// Cancel every ride-scoped timer ("clear all").
    pub fn cancel_all_timers() -> impl Iterator<Item = Effect> {
        TimerKind::ALL.into_iter().map(Effect::CancelTimer)
    }
}
