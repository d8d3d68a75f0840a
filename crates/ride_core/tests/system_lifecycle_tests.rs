mod support;

use ride_core::event::{Effect, Notice, Outbound, RideEvent, TimerKind};
use ride_core::machine::RejectReason;
use ride_core::reconciler::{Channel, Discard, RawEvent};
use ride_core::session::{
    CompletionSummary, DriverAssignment, RecoveredRide, RideSession, RideStatus, VehicleClass,
};
use ride_core::signal::BookingAckPayload;

use support::fixtures::{
    accepted, booked_at, completed, dropoff, live_location, offset_north, pickup, status_update,
    taxi_booking,
};
use support::harness::RideHarness;

fn ride_through_to_completion(harness: &mut RideHarness, distance: Option<f64>, charge: Option<f64>) {
    harness.book("R1", "4821");
    harness.signal(accepted(Channel::Push, "R1", "D9", offset_north(pickup(), 400.0)));
    harness.signal(live_location("D9", offset_north(pickup(), 10.0)));
    harness.signal(status_update("R1", "started"));
    harness.signal(live_location("D9", dropoff()));
    harness.signal(completed("R1", distance, charge));
}

#[test]
fn completed_ride_resets_to_a_clean_idle_session() {
    let mut harness = RideHarness::default();
    ride_through_to_completion(&mut harness, Some(84.2), Some(1_300.0));
    assert_eq!(harness.session.status, RideStatus::Completed);
    assert!(harness.session.driver_arrived_notified);
    assert!(harness.session.completion_notified);

    let effects = harness.apply(RideEvent::ResetAcknowledged);
    assert!(effects.contains(&Effect::ClearPersisted));
    for kind in TimerKind::ALL {
        assert!(effects.contains(&Effect::CancelTimer(kind)));
    }
    assert_eq!(harness.session, RideSession::idle());
    assert!(!harness.session.driver_arrived_notified);
    assert!(!harness.session.completion_notified);
    assert!(harness.session.driver.is_none());
    assert!(harness.session.ride_id.is_none());
    assert!(harness.session.otp.is_none());
}

#[test]
fn server_summary_wins_over_local_figures() {
    let mut harness = RideHarness::default();
    ride_through_to_completion(&mut harness, Some(84.2), Some(1_300.0));
    assert!(harness.notices().contains(&&Notice::RideCompleted(CompletionSummary {
        distance_km: 84.2,
        travel_time: Some("42 mins".to_string()),
        charge: Some(1_300.0),
    })));
}

#[test]
fn completion_falls_back_to_local_distance_and_quoted_fare() {
    let mut harness = RideHarness::default();
    ride_through_to_completion(&mut harness, None, None);
    let traveled = harness
        .session
        .driver
        .as_ref()
        .expect("driver")
        .cumulative_traveled_km;
    let summary = harness.session.completion.clone().expect("summary");
    assert_eq!(summary.distance_km, traveled);
    assert_eq!(summary.charge, Some(1_340.0));
}

#[test]
fn completion_replays_and_late_status_do_not_regress() {
    let mut harness = RideHarness::default();
    ride_through_to_completion(&mut harness, Some(84.2), Some(1_300.0));
    let effects = harness.signal(completed("R1", Some(90.0), Some(2_000.0)));
    assert!(effects.is_empty());
    harness.signal(status_update("R1", "started"));
    harness.signal(status_update("R1", "arrived"));
    assert_eq!(harness.session.status, RideStatus::Completed);
    assert_eq!(
        harness.count_notices(|n| matches!(n, Notice::RideCompleted(_))),
        1
    );
}

#[test]
fn no_driver_timeout_returns_to_idle() {
    let mut harness = RideHarness::default();
    harness.book("R1", "4821");
    let effects = harness.tick(TimerKind::NoDriverTimeout);
    assert_eq!(harness.session, RideSession::idle());
    assert!(effects.contains(&Effect::ClearPersisted));
    assert!(effects.contains(&Effect::CancelTimer(TimerKind::AcceptancePoll)));
    assert!(effects.contains(&Effect::Notify(Notice::NoDriverFound)));
}

#[test]
fn acceptance_poll_requests_status_for_the_current_ride() {
    let mut harness = RideHarness::default();
    harness.book("R1", "4821");
    let effects = harness.tick(TimerKind::AcceptancePoll);
    assert_eq!(
        effects,
        vec![Effect::Emit(Outbound::RequestRideStatus {
            ride_id: "R1".to_string()
        })]
    );
}

#[test]
fn stale_timeout_from_a_cancelled_ride_does_not_touch_the_rebooked_one() {
    let mut harness = RideHarness::default();
    harness.book("R1", "4821");
    let effects = harness.apply(RideEvent::RiderCancelled);
    assert!(effects.contains(&Effect::Emit(Outbound::CancelRide {
        ride_id: "R1".to_string()
    })));
    harness.book("R2", "4821");

    let effects = harness.apply(RideEvent::NoDriverTimeout {
        ride_id: Some("R1".to_string()),
    });
    assert!(effects.is_empty());
    assert_eq!(harness.session.status, RideStatus::Searching);
    assert_eq!(harness.session.ride_id.as_deref(), Some("R2"));
    assert_eq!(
        harness.rejections.last().map(|r| r.reason),
        Some(RejectReason::StaleTimer)
    );
}

#[test]
fn started_ride_cannot_be_cancelled() {
    let mut harness = RideHarness::default();
    harness.book("R1", "4821");
    harness.signal(accepted(Channel::Push, "R1", "D9", pickup()));
    harness.signal(status_update("R1", "started"));
    let effects = harness.apply(RideEvent::RiderCancelled);
    assert!(effects.is_empty());
    assert_eq!(harness.session.status, RideStatus::Started);
}

#[test]
fn cancelling_an_unacknowledged_booking_needs_no_remote_call() {
    let mut harness = RideHarness::default();
    harness.apply(RideEvent::BookingSubmitted(taxi_booking()));
    let effects = harness.apply(RideEvent::RiderCancelled);
    assert_eq!(effects, vec![Effect::Notify(Notice::RideCancelled)]);
    assert!(harness.session.is_pristine());
}

#[test]
fn second_booking_while_one_is_in_flight_is_rejected() {
    let mut harness = RideHarness::default();
    harness.apply(RideEvent::BookingSubmitted(taxi_booking()));
    harness.apply(RideEvent::BookingSubmitted(taxi_booking()));
    assert_eq!(
        harness.rejections.last().map(|r| r.reason),
        Some(RejectReason::BookingInFlight)
    );
}

#[test]
fn failed_booking_returns_to_pristine_idle() {
    let mut harness = RideHarness::default();
    harness.apply(RideEvent::BookingSubmitted(taxi_booking()));
    harness.signal(RawEvent::BookingCreated(BookingAckPayload {
        success: Some(false),
        ride_id: None,
        otp: None,
        message: Some("no vehicles in area".to_string()),
    }));
    assert!(harness.session.is_pristine());
    assert!(harness.notices().contains(&&Notice::BookingFailed {
        reason: "no vehicles in area".to_string()
    }));
}

fn recovered(driver: Option<DriverAssignment>) -> RecoveredRide {
    RecoveredRide {
        ride_id: "R1".to_string(),
        booked_at: booked_at(),
        driver,
        pickup: Some(pickup()),
        dropoff: Some(dropoff()),
        otp: Some("4821".to_string()),
        vehicle_class: Some(VehicleClass::Taxi),
        quoted_fare: Some(1_340.0),
        status: None,
        driver_arrived_notified: false,
        completion_notified: false,
    }
}

fn saved_driver() -> DriverAssignment {
    DriverAssignment {
        driver_id: "D9".to_string(),
        display_name: "Ravi".to_string(),
        mobile: "9000000000".to_string(),
        vehicle_class: VehicleClass::Taxi,
        last_known_position: Some(offset_north(pickup(), 900.0)),
        cumulative_traveled_km: 0.4,
    }
}

#[test]
fn recovery_with_a_saved_driver_resumes_tracking() {
    let mut harness = RideHarness::default();
    let effects = harness.signal(RawEvent::Recovered(recovered(Some(saved_driver()))));
    assert_eq!(harness.session.status, RideStatus::OnTheWay);
    assert_eq!(harness.session.driver_id(), Some("D9"));
    assert_eq!(
        effects,
        vec![
            Effect::StartTimer(TimerKind::ArrivalRecheck),
            Effect::StartTimer(TimerKind::RiderLocationBroadcast),
            Effect::Emit(Outbound::RequestRideStatus {
                ride_id: "R1".to_string()
            }),
        ]
    );
}

#[test]
fn recovery_after_arrival_does_not_alert_again() {
    let mut harness = RideHarness::default();
    let mut saved = recovered(Some(saved_driver()));
    saved.status = Some(RideStatus::Arrived);
    saved.driver_arrived_notified = true;
    let effects = harness.signal(RawEvent::Recovered(saved));
    assert_eq!(harness.session.status, RideStatus::Arrived);
    assert!(harness.session.driver_arrived_notified);
    assert!(!effects.contains(&Effect::StartTimer(TimerKind::ArrivalRecheck)));
    assert!(effects.contains(&Effect::StartTimer(TimerKind::RiderLocationBroadcast)));

    harness.signal(status_update("R1", "arrived"));
    harness.signal(live_location("D9", pickup()));
    assert_eq!(
        harness.count_notices(|notice| matches!(notice, Notice::DriverArrived { .. })),
        0
    );

    harness.signal(status_update("R1", "started"));
    assert_eq!(harness.session.status, RideStatus::Started);
}

#[test]
fn recovered_started_ride_keeps_its_destination_flag() {
    let mut harness = RideHarness::default();
    let mut saved = recovered(Some(saved_driver()));
    saved.status = Some(RideStatus::Started);
    saved.completion_notified = true;
    harness.signal(RawEvent::Recovered(saved));
    assert_eq!(harness.session.status, RideStatus::Started);
    assert!(harness.session.driver_arrived_notified);

    let effects = harness.signal(live_location("D9", dropoff()));
    assert!(!effects
        .iter()
        .any(|effect| matches!(effect, Effect::Emit(Outbound::DriverReachedDestination { .. }))));
}

#[test]
fn recovery_without_a_driver_resumes_searching() {
    let mut harness = RideHarness::default();
    let effects = harness.signal(RawEvent::Recovered(recovered(None)));
    assert_eq!(harness.session.status, RideStatus::Searching);
    assert!(effects.contains(&Effect::StartTimer(TimerKind::NoDriverTimeout)));

    harness.signal(RawEvent::Recovered(recovered(None)));
    assert_eq!(harness.discards, vec![Discard::AlreadyLive]);
}

#[test]
fn reconnect_resyncs_only_an_active_ride() {
    let mut harness = RideHarness::default();
    assert!(harness.apply(RideEvent::TransportReconnected).is_empty());

    harness.book("R1", "4821");
    assert_eq!(
        harness.apply(RideEvent::TransportReconnected),
        vec![Effect::Emit(Outbound::RequestRideStatus {
            ride_id: "R1".to_string()
        })]
    );
}

#[test]
fn rider_location_is_broadcast_while_a_driver_is_assigned() {
    let mut harness = RideHarness::default();
    harness.book("R1", "4821");
    assert!(harness.tick(TimerKind::RiderLocationBroadcast).is_empty());

    harness.signal(accepted(Channel::Push, "R1", "D9", offset_north(pickup(), 400.0)));
    let effects = harness.tick(TimerKind::RiderLocationBroadcast);
    assert_eq!(
        effects,
        vec![Effect::Emit(Outbound::RiderLocation {
            ride_id: "R1".to_string(),
            position: pickup(),
        })]
    );
}
