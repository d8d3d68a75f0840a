//! Ride state machine.
//!
//! [`RideStateMachine::transition`] is the single function that produces new
//! [`RideSession`] values. It is pure: it takes the current session and one
//! normalized event and returns the next session plus the effects the caller
//! must perform. Every timer an effect starts is cancelled by the transition
//! that leaves the timer's phase.
//!
//! Replays are idempotent. A duplicate event returns the session unchanged
//! with no effects; an event that is invalid for the current status is
//! reported through [`RejectedTransition`] instead.

use thiserror::Error;

use crate::arrival::ArrivalDetector;
use crate::event::{Effect, Notice, Outbound, RideEvent, TimerKind};
use crate::geo::Coordinate;
use crate::otp::is_valid_otp;
use crate::session::{
    BookingDetails, CompletionSummary, DriverAssignment, RecoveredRide, RideSession, RideStatus,
    ServerSummary,
};
use crate::track::DriverTrackSmoother;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("not valid from the current status")]
    InvalidFromStatus,
    #[error("event belongs to a different ride")]
    RideMismatch,
    #[error("another driver is assigned to this ride")]
    DriverMismatch,
    #[error("a booking is already in flight")]
    BookingInFlight,
    #[error("no booking is in flight")]
    NoBookingInFlight,
    #[error("timer fired after its phase ended")]
    StaleTimer,
    #[error("a started ride cannot be cancelled")]
    RideInProgress,
}

/// Diagnostic for an event the current session cannot accept.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{event} rejected while {status}: {reason}")]
pub struct RejectedTransition {
    pub event: &'static str,
    pub status: RideStatus,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub session: RideSession,
    pub effects: Vec<Effect>,
    pub rejected: Option<RejectedTransition>,
}

impl Transition {
    fn applied(session: RideSession, effects: Vec<Effect>) -> Self {
        Self {
            session,
            effects,
            rejected: None,
        }
    }

    fn unchanged(session: &RideSession) -> Self {
        Self::applied(session.clone(), Vec::new())
    }

    fn rejected(session: &RideSession, event: &'static str, reason: RejectReason) -> Self {
        Self {
            session: session.clone(),
            effects: Vec::new(),
            rejected: Some(RejectedTransition {
                event,
                status: session.status,
                reason,
            }),
        }
    }

    pub fn is_rejected(&self) -> bool {
        self.rejected.is_some()
    }
}

type Outcome = Result<Transition, RejectReason>;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RideStateMachine {
    arrival: ArrivalDetector,
    track: DriverTrackSmoother,
}

impl RideStateMachine {
    pub fn new(arrival: ArrivalDetector) -> Self {
        Self {
            arrival,
            track: DriverTrackSmoother,
        }
    }

    pub fn arrival(&self) -> &ArrivalDetector {
        &self.arrival
    }

    pub fn transition(&self, session: &RideSession, event: &RideEvent) -> Transition {
        let outcome = match event {
            RideEvent::BookingSubmitted(details) => booking_submitted(session, details),
            RideEvent::BookingAcknowledged { ride_id, otp } => {
                booking_acknowledged(session, ride_id, otp.as_deref())
            }
            RideEvent::BookingFailed { reason } => booking_failed(session, reason),
            RideEvent::SessionRecovered(recovered) => session_recovered(session, recovered),
            RideEvent::DriverAssigned { ride_id, driver } => {
                self.driver_assigned(session, ride_id, driver)
            }
            RideEvent::DriverPositionRefresh {
                driver_id,
                position,
            } => self.position_refresh(session, driver_id, *position),
            RideEvent::ArrivalReported { ride_id } => arrival_reported(session, ride_id),
            RideEvent::RideStarted { ride_id } => ride_started(session, ride_id),
            RideEvent::RideCompleted { ride_id, summary } => {
                ride_completed(session, ride_id.as_deref(), summary)
            }
            RideEvent::AcceptancePollTick { ride_id } => acceptance_poll_tick(session, ride_id),
            RideEvent::NoDriverTimeout { ride_id } => no_driver_timeout(session, ride_id),
            RideEvent::ArrivalRecheck { ride_id } => self.arrival_recheck(session, ride_id),
            RideEvent::RiderLocationTick { ride_id, position } => {
                rider_location_tick(session, ride_id, *position)
            }
            RideEvent::TransportReconnected => Ok(transport_reconnected(session)),
            RideEvent::RiderCancelled => rider_cancelled(session),
            RideEvent::ResetAcknowledged => reset_acknowledged(session),
        };
        outcome.unwrap_or_else(|reason| Transition::rejected(session, event.name(), reason))
    }

    fn driver_assigned(
        &self,
        session: &RideSession,
        ride_id: &str,
        driver: &DriverAssignment,
    ) -> Outcome {
        match session.status {
            RideStatus::Searching if session.is_ride(ride_id) => Ok(assign(session, ride_id, driver)),
            RideStatus::Searching => Err(RejectReason::RideMismatch),
            // The acceptance overtook the booking acknowledgement.
            RideStatus::Idle if session.booking_in_flight() => Ok(assign(session, ride_id, driver)),
            RideStatus::OnTheWay | RideStatus::Arrived | RideStatus::Started => {
                if !session.is_ride(ride_id) {
                    return Err(RejectReason::RideMismatch);
                }
                if !session.is_assigned_to(&driver.driver_id) {
                    return Err(RejectReason::DriverMismatch);
                }
                self.position_refresh(session, &driver.driver_id, driver.last_known_position)
            }
            _ => Err(RejectReason::InvalidFromStatus),
        }
    }

    fn position_refresh(
        &self,
        session: &RideSession,
        driver_id: &str,
        position: Option<Coordinate>,
    ) -> Outcome {
        if !session.status.has_driver() {
            return Err(RejectReason::InvalidFromStatus);
        }
        if !session.is_assigned_to(driver_id) {
            return Err(RejectReason::DriverMismatch);
        }
        let Some(position) = position else {
            return Ok(Transition::unchanged(session));
        };

        let mut next = session.clone();
        let counting = matches!(session.status, RideStatus::OnTheWay | RideStatus::Started);
        if let Some(driver) = next.driver.as_mut() {
            self.track.advance(driver, position, counting);
        }
        let mut effects = Vec::new();
        self.evaluate_proximity(&mut next, &mut effects);
        Ok(Transition::applied(next, effects))
    }

    fn arrival_recheck(&self, session: &RideSession, ride_id: &Option<String>) -> Outcome {
        timer_in_scope(session, TimerKind::ArrivalRecheck, ride_id)?;
        let mut next = session.clone();
        let mut effects = Vec::new();
        self.evaluate_proximity(&mut next, &mut effects);
        if effects.is_empty() {
            return Ok(Transition::unchanged(session));
        }
        Ok(Transition::applied(next, effects))
    }

    /// Shared by position updates and the periodic re-check; the flags make
    /// repeated crossings of the threshold harmless.
    fn evaluate_proximity(&self, next: &mut RideSession, effects: &mut Vec<Effect>) {
        let Some(position) = next.driver.as_ref().and_then(|d| d.last_known_position) else {
            return;
        };
        match next.status {
            RideStatus::OnTheWay
                if !next.driver_arrived_notified
                    && self.arrival.has_reached(position, next.pickup) =>
            {
                mark_arrived(next, effects);
            }
            // Completion is confirmed by the server; the client only reports
            // that the destination was reached.
            RideStatus::Started
                if !next.completion_notified
                    && self.arrival.has_reached(position, next.dropoff) =>
            {
                next.completion_notified = true;
                if let (Some(ride_id), Some(driver)) = (&next.ride_id, &next.driver) {
                    effects.push(Effect::Emit(Outbound::DriverReachedDestination {
                        ride_id: ride_id.clone(),
                        driver_id: driver.driver_id.clone(),
                        distance_km: driver.cumulative_traveled_km,
                    }));
                }
                effects.push(Effect::Persist);
            }
            _ => {}
        }
    }
}

fn booking_submitted(session: &RideSession, details: &BookingDetails) -> Outcome {
    if !session.status.accepts_booking() {
        return Err(RejectReason::InvalidFromStatus);
    }
    if session.booking_in_flight() {
        return Err(RejectReason::BookingInFlight);
    }
    let next = RideSession {
        booked_at: Some(details.booked_at),
        pickup: Some(details.pickup),
        dropoff: Some(details.dropoff),
        vehicle_class: Some(details.vehicle_class),
        quoted_fare: details.quoted_fare,
        ..RideSession::idle()
    };
    Ok(Transition::applied(next, Vec::new()))
}

fn booking_acknowledged(session: &RideSession, ride_id: &str, otp: Option<&str>) -> Outcome {
    if session.is_ride(ride_id) {
        return Ok(late_acknowledgement(session, ride_id, otp));
    }
    if !session.booking_in_flight() {
        return Err(RejectReason::NoBookingInFlight);
    }
    let otp = otp.filter(|otp| is_valid_otp(otp)).map(str::to_string);
    let mut next = session.clone();
    next.ride_id = Some(ride_id.to_string());
    next.otp = otp.clone();
    next.status = RideStatus::Searching;
    Ok(Transition::applied(
        next,
        vec![
            Effect::Persist,
            Effect::StartTimer(TimerKind::AcceptancePoll),
            Effect::StartTimer(TimerKind::NoDriverTimeout),
            Effect::Notify(Notice::BookingConfirmed {
                ride_id: ride_id.to_string(),
                otp,
            }),
        ],
    ))
}

/// The ack for a ride a driver already accepted still carries the OTP and
/// the booking confirmation the rider has not seen yet.
fn late_acknowledgement(session: &RideSession, ride_id: &str, otp: Option<&str>) -> Transition {
    let Some(otp) = otp.filter(|otp| is_valid_otp(otp)) else {
        return Transition::unchanged(session);
    };
    if !session.status.has_driver() || session.otp.is_some() {
        return Transition::unchanged(session);
    }
    let mut next = session.clone();
    next.otp = Some(otp.to_string());
    Transition::applied(
        next,
        vec![
            Effect::Persist,
            Effect::Notify(Notice::BookingConfirmed {
                ride_id: ride_id.to_string(),
                otp: Some(otp.to_string()),
            }),
        ],
    )
}

fn booking_failed(session: &RideSession, reason: &str) -> Outcome {
    if !session.booking_in_flight() {
        return Err(RejectReason::NoBookingInFlight);
    }
    Ok(Transition::applied(
        RideSession::idle(),
        vec![Effect::Notify(Notice::BookingFailed {
            reason: reason.to_string(),
        })],
    ))
}

fn session_recovered(session: &RideSession, recovered: &RecoveredRide) -> Outcome {
    if !session.is_pristine() {
        return Err(RejectReason::InvalidFromStatus);
    }
    let mut next = RideSession {
        ride_id: Some(recovered.ride_id.clone()),
        booked_at: Some(recovered.booked_at),
        pickup: recovered.pickup,
        dropoff: recovered.dropoff,
        vehicle_class: recovered.vehicle_class,
        quoted_fare: recovered.quoted_fare,
        otp: recovered.otp.clone().filter(|otp| is_valid_otp(otp)),
        ..RideSession::idle()
    };
    let mut effects = match &recovered.driver {
        Some(driver) => {
            next.driver = Some(driver.clone());
            next.status = match recovered.status {
                Some(status @ (RideStatus::Arrived | RideStatus::Started)) => status,
                _ => RideStatus::OnTheWay,
            };
            // Reaching Arrived or Started has already alerted the rider.
            next.driver_arrived_notified =
                recovered.driver_arrived_notified || next.status != RideStatus::OnTheWay;
            next.completion_notified = recovered.completion_notified;
            let mut effects = Vec::with_capacity(3);
            if next.status == RideStatus::OnTheWay {
                effects.push(Effect::StartTimer(TimerKind::ArrivalRecheck));
            }
            effects.push(Effect::StartTimer(TimerKind::RiderLocationBroadcast));
            effects
        }
        None => {
            next.status = RideStatus::Searching;
            vec![
                Effect::StartTimer(TimerKind::AcceptancePoll),
                Effect::StartTimer(TimerKind::NoDriverTimeout),
            ]
        }
    };
    effects.push(Effect::Emit(Outbound::RequestRideStatus {
        ride_id: recovered.ride_id.clone(),
    }));
    Ok(Transition::applied(next, effects))
}

fn assign(session: &RideSession, ride_id: &str, driver: &DriverAssignment) -> Transition {
    let mut driver = driver.clone();
    driver.cumulative_traveled_km = 0.0;
    let notice = Notice::DriverAccepted {
        driver_id: driver.driver_id.clone(),
        display_name: driver.display_name.clone(),
        mobile: driver.mobile.clone(),
        vehicle_class: driver.vehicle_class,
    };

    let mut next = session.clone();
    next.ride_id = Some(ride_id.to_string());
    next.status = RideStatus::OnTheWay;
    next.driver = Some(driver);
    Transition::applied(
        next,
        vec![
            Effect::Persist,
            Effect::CancelTimer(TimerKind::AcceptancePoll),
            Effect::CancelTimer(TimerKind::NoDriverTimeout),
            Effect::Notify(notice),
            Effect::StartTimer(TimerKind::ArrivalRecheck),
            Effect::StartTimer(TimerKind::RiderLocationBroadcast),
        ],
    )
}

fn mark_arrived(next: &mut RideSession, effects: &mut Vec<Effect>) {
    next.status = RideStatus::Arrived;
    next.driver_arrived_notified = true;
    let display_name = next
        .driver
        .as_ref()
        .map(|driver| driver.display_name.clone())
        .unwrap_or_else(|| "Driver".to_string());
    effects.push(Effect::Notify(Notice::DriverArrived {
        display_name,
        otp: next.otp.clone(),
    }));
    effects.push(Effect::CancelTimer(TimerKind::ArrivalRecheck));
    effects.push(Effect::Persist);
}

fn arrival_reported(session: &RideSession, ride_id: &str) -> Outcome {
    if !session.is_ride(ride_id) {
        return Err(RejectReason::RideMismatch);
    }
    match session.status {
        RideStatus::OnTheWay if !session.driver_arrived_notified => {
            let mut next = session.clone();
            let mut effects = Vec::new();
            mark_arrived(&mut next, &mut effects);
            Ok(Transition::applied(next, effects))
        }
        RideStatus::OnTheWay | RideStatus::Arrived | RideStatus::Started | RideStatus::Completed => {
            Ok(Transition::unchanged(session))
        }
        _ => Err(RejectReason::InvalidFromStatus),
    }
}

fn ride_started(session: &RideSession, ride_id: &str) -> Outcome {
    if !session.is_ride(ride_id) {
        return Err(RejectReason::RideMismatch);
    }
    match session.status {
        RideStatus::OnTheWay | RideStatus::Arrived => {
            let mut next = session.clone();
            next.status = RideStatus::Started;
            Ok(Transition::applied(
                next,
                vec![
                    Effect::CancelTimer(TimerKind::ArrivalRecheck),
                    Effect::Persist,
                    Effect::Notify(Notice::RideStarted),
                ],
            ))
        }
        RideStatus::Started | RideStatus::Completed => Ok(Transition::unchanged(session)),
        _ => Err(RejectReason::InvalidFromStatus),
    }
}

fn ride_completed(session: &RideSession, ride_id: Option<&str>, summary: &ServerSummary) -> Outcome {
    if let Some(ride_id) = ride_id {
        if !session.is_ride(ride_id) {
            return Err(RejectReason::RideMismatch);
        }
    }
    match session.status {
        RideStatus::Completed => Ok(Transition::unchanged(session)),
        RideStatus::OnTheWay | RideStatus::Arrived | RideStatus::Started => {
            let traveled_km = session
                .driver
                .as_ref()
                .map(|driver| driver.cumulative_traveled_km)
                .unwrap_or(0.0);
            let completion = CompletionSummary {
                distance_km: summary.distance_km.unwrap_or(traveled_km),
                travel_time: summary.travel_time.clone(),
                charge: summary.charge.or(session.quoted_fare),
            };
            let mut next = session.clone();
            next.status = RideStatus::Completed;
            next.completion_notified = true;
            next.completion = Some(completion.clone());
            Ok(Transition::applied(
                next,
                vec![
                    Effect::Notify(Notice::RideCompleted(completion)),
                    Effect::ClearPersisted,
                    Effect::CancelTimer(TimerKind::ArrivalRecheck),
                    Effect::CancelTimer(TimerKind::RiderLocationBroadcast),
                ],
            ))
        }
        _ => Err(RejectReason::InvalidFromStatus),
    }
}

/// Guard for timer ticks: the phase and the ride must both still match.
fn timer_in_scope(
    session: &RideSession,
    timer: TimerKind,
    ride_id: &Option<String>,
) -> Result<String, RejectReason> {
    if !timer.scoped_to(session.status) || session.ride_id != *ride_id {
        return Err(RejectReason::StaleTimer);
    }
    session.ride_id.clone().ok_or(RejectReason::StaleTimer)
}

fn acceptance_poll_tick(session: &RideSession, ride_id: &Option<String>) -> Outcome {
    let ride_id = timer_in_scope(session, TimerKind::AcceptancePoll, ride_id)?;
    Ok(Transition::applied(
        session.clone(),
        vec![Effect::Emit(Outbound::RequestRideStatus { ride_id })],
    ))
}

fn no_driver_timeout(session: &RideSession, ride_id: &Option<String>) -> Outcome {
    timer_in_scope(session, TimerKind::NoDriverTimeout, ride_id)?;
    Ok(Transition::applied(
        RideSession::idle(),
        vec![
            Effect::CancelTimer(TimerKind::AcceptancePoll),
            Effect::ClearPersisted,
            Effect::Notify(Notice::NoDriverFound),
        ],
    ))
}

fn rider_location_tick(
    session: &RideSession,
    ride_id: &Option<String>,
    position: Coordinate,
) -> Outcome {
    let ride_id = timer_in_scope(session, TimerKind::RiderLocationBroadcast, ride_id)?;
    Ok(Transition::applied(
        session.clone(),
        vec![Effect::Emit(Outbound::RiderLocation { ride_id, position })],
    ))
}

fn transport_reconnected(session: &RideSession) -> Transition {
    match (&session.ride_id, session.status.is_active()) {
        (Some(ride_id), true) => Transition::applied(
            session.clone(),
            vec![Effect::Emit(Outbound::RequestRideStatus {
                ride_id: ride_id.clone(),
            })],
        ),
        _ => Transition::unchanged(session),
    }
}

fn rider_cancelled(session: &RideSession) -> Outcome {
    match session.status {
        RideStatus::Idle if session.booking_in_flight() => Ok(Transition::applied(
            RideSession::idle(),
            vec![Effect::Notify(Notice::RideCancelled)],
        )),
        RideStatus::Searching | RideStatus::OnTheWay | RideStatus::Arrived => {
            let mut effects: Vec<Effect> = Effect::cancel_all_timers().collect();
            effects.push(Effect::ClearPersisted);
            if let Some(ride_id) = &session.ride_id {
                effects.push(Effect::Emit(Outbound::CancelRide {
                    ride_id: ride_id.clone(),
                }));
            }
            effects.push(Effect::Notify(Notice::RideCancelled));
            Ok(Transition::applied(RideSession::idle(), effects))
        }
        RideStatus::Started => Err(RejectReason::RideInProgress),
        _ => Err(RejectReason::InvalidFromStatus),
    }
}

fn reset_acknowledged(session: &RideSession) -> Outcome {
    if session.status != RideStatus::Completed {
        return Err(RejectReason::InvalidFromStatus);
    }
    let mut effects: Vec<Effect> = Effect::cancel_all_timers().collect();
    effects.push(Effect::ClearPersisted);
    Ok(Transition::applied(RideSession::idle(), effects))
}
