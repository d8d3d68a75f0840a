//! Ride timers as tokio tasks feeding the client inbox.
//!
//! Every arm gets a fresh generation. A tick is only acted on while its
//! generation is still the armed one, so an abort that races a tick already
//! queued in the inbox cannot resurrect a cancelled timer.

use std::collections::HashMap;
use std::time::Duration;

use ride_core::event::TimerKind;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::debug;

use crate::config::ClientConfig;
use crate::runtime::Inbound;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerCadence {
    pub acceptance_poll: Duration,
    pub no_driver_timeout: Duration,
    pub arrival_recheck: Duration,
    pub location_broadcast: Duration,
}

impl TimerCadence {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            acceptance_poll: config.acceptance_poll,
            no_driver_timeout: config.no_driver_timeout,
            arrival_recheck: config.arrival_recheck,
            location_broadcast: config.location_broadcast,
        }
    }

    pub fn period(&self, kind: TimerKind) -> Duration {
        match kind {
            TimerKind::AcceptancePoll => self.acceptance_poll,
            TimerKind::NoDriverTimeout => self.no_driver_timeout,
            TimerKind::ArrivalRecheck => self.arrival_recheck,
            TimerKind::RiderLocationBroadcast => self.location_broadcast,
        }
    }
}

struct ArmedTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

pub(crate) struct TimerSet {
    tx: mpsc::Sender<Inbound>,
    cadence: TimerCadence,
    armed: HashMap<TimerKind, ArmedTimer>,
    next_generation: u64,
}

impl TimerSet {
    pub(crate) fn new(tx: mpsc::Sender<Inbound>, cadence: TimerCadence) -> Self {
        Self {
            tx,
            cadence,
            armed: HashMap::new(),
            next_generation: 0,
        }
    }

    /// (Re)arm `kind` for `ride_id`. Re-arming replaces the previous task.
    pub(crate) fn start(&mut self, kind: TimerKind, ride_id: Option<String>) {
        let period = self.cadence.period(kind);
        self.start_after(kind, ride_id, period);
    }

    /// Like [`TimerSet::start`], but the first tick fires after `first`
    /// instead of a full period.
    pub(crate) fn start_after(&mut self, kind: TimerKind, ride_id: Option<String>, first: Duration) {
        self.cancel(kind);
        self.next_generation += 1;
        let generation = self.next_generation;
        let period = self.cadence.period(kind).max(Duration::from_millis(1));
        let first = first.max(Duration::from_millis(1));
        let tx = self.tx.clone();

        let handle = tokio::spawn(async move {
            let tick = || Inbound::Timer {
                kind,
                generation,
                ride_id: ride_id.clone(),
            };
            if kind.is_repeating() {
                let mut interval = interval_at(Instant::now() + first, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    interval.tick().await;
                    if tx.send(tick()).await.is_err() {
                        break;
                    }
                }
            } else {
                sleep(first).await;
                let _ = tx.send(tick()).await;
            }
        });
        debug!(timer = kind.as_str(), generation, ?first, ?period, "timer armed");
        self.armed.insert(kind, ArmedTimer { generation, handle });
    }

    pub(crate) fn cancel(&mut self, kind: TimerKind) {
        if let Some(armed) = self.armed.remove(&kind) {
            armed.handle.abort();
            debug!(timer = kind.as_str(), generation = armed.generation, "timer cancelled");
        }
    }

    pub(crate) fn cancel_all(&mut self) {
        for kind in TimerKind::ALL {
            self.cancel(kind);
        }
    }

    #[cfg(test)]
    pub(crate) fn is_armed(&self, kind: TimerKind) -> bool {
        self.armed.contains_key(&kind)
    }

    /// Accept a tick if it belongs to the current arm. One-shot timers are
    /// disarmed by their only tick.
    pub(crate) fn accept_tick(&mut self, kind: TimerKind, generation: u64) -> bool {
        let current = self
            .armed
            .get(&kind)
            .is_some_and(|armed| armed.generation == generation);
        if current && !kind.is_repeating() {
            self.armed.remove(&kind);
        }
        current
    }
}

impl Drop for TimerSet {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
