#![allow(dead_code)]

use ride_core::event::{Effect, Notice, RideEvent, TimerKind};
use ride_core::machine::{RejectedTransition, RideStateMachine};
use ride_core::reconciler::{Discard, RawEvent, Reconciled, RideAcceptanceReconciler};
use ride_core::signal::BookingAckPayload;
use ride_core::session::RideSession;

use super::fixtures::{taxi_booking, RIDER_ID};

/// Drives reconciler and state machine together, recording every outcome.
pub struct RideHarness {
    pub machine: RideStateMachine,
    pub reconciler: RideAcceptanceReconciler,
    pub session: RideSession,
    pub effects: Vec<Effect>,
    pub discards: Vec<Discard>,
    pub rejections: Vec<RejectedTransition>,
}

impl Default for RideHarness {
    fn default() -> Self {
        Self::new(RideStateMachine::default())
    }
}

impl RideHarness {
    pub fn new(machine: RideStateMachine) -> Self {
        Self {
            machine,
            reconciler: RideAcceptanceReconciler::new(Some(RIDER_ID.to_string())),
            session: RideSession::idle(),
            effects: Vec::new(),
            discards: Vec::new(),
            rejections: Vec::new(),
        }
    }

    /// Reconcile a raw signal and apply it; returns the effects of this step.
    pub fn signal(&mut self, raw: RawEvent) -> Vec<Effect> {
        match self.reconciler.reconcile(&self.session, raw) {
            Reconciled::Apply(event) => self.apply(event),
            Reconciled::Discard(discard) => {
                self.discards.push(discard);
                Vec::new()
            }
        }
    }

    pub fn apply(&mut self, event: RideEvent) -> Vec<Effect> {
        let transition = self.machine.transition(&self.session, &event);
        if let Some(rejected) = transition.rejected {
            self.rejections.push(rejected);
        }
        self.session = transition.session;
        self.effects.extend(transition.effects.iter().cloned());
        transition.effects
    }

    /// Fire the tick a timer would deliver right now.
    pub fn tick(&mut self, kind: TimerKind) -> Vec<Effect> {
        let position = self
            .session
            .pickup
            .or(self.session.dropoff);
        match kind.tick_event(self.session.ride_id.clone(), position) {
            Some(event) => self.apply(event),
            None => Vec::new(),
        }
    }

    /// Submit the standard taxi booking and acknowledge it.
    pub fn book(&mut self, ride_id: &str, otp: &str) {
        self.apply(RideEvent::BookingSubmitted(taxi_booking()));
        self.signal(RawEvent::BookingCreated(BookingAckPayload {
            success: Some(true),
            ride_id: Some(ride_id.to_string()),
            otp: Some(otp.to_string()),
            message: None,
        }));
    }

    pub fn notices(&self) -> Vec<&Notice> {
        self.effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::Notify(notice) => Some(notice),
                _ => None,
            })
            .collect()
    }

    pub fn count_notices(&self, matches: impl Fn(&Notice) -> bool) -> usize {
        self.notices().into_iter().filter(|notice| matches(notice)).count()
    }

    pub fn count_effects(&self, matches: impl Fn(&Effect) -> bool) -> usize {
        self.effects.iter().filter(|effect| matches(effect)).count()
    }
}
