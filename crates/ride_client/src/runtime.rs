//! The single-writer ride client.
//!
//! One tokio task owns the [`RideSession`]. Transport deliveries, device
//! positions, timer ticks, commands and the results of spawned network calls
//! all arrive on one inbox and are handled strictly one at a time; only
//! [`RideStateMachine::transition`] ever produces the next session. Results
//! of async calls are re-validated against the session current at the time
//! they arrive, never against the one that started them.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use ride_core::arrival::ArrivalDetector;
use ride_core::event::{Effect, Notice, Outbound, RideEvent, TimerKind};
use ride_core::geo::Coordinate;
use ride_core::machine::RideStateMachine;
use ride_core::otp::generate_otp;
use ride_core::reconciler::{Channel, Discard, RawEvent, Reconciled, RideAcceptanceReconciler};
use ride_core::session::{BookingDetails, RideSession, VehicleClass};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::adapters::pricing::{build_estimator, PriceEstimator, QuoteRequest};
use crate::adapters::store::KeyValueStore;
use crate::adapters::transport::{Transport, TransportEvent, TransportSink};
use crate::clock::{Clock, SystemClock};
use crate::config::ClientConfig;
use crate::error::{BookingError, ClientClosed, PricingError, TransportError, WireError};
use crate::persisted::PersistedRideStore;
use crate::timers::{TimerCadence, TimerSet};
use crate::wire::{self, RiderIdentity, WireMessage, SUBSCRIBED_EVENTS};

/// A pickup, dropoff or stop as chosen by the rider.
#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub position: Coordinate,
    pub address: Option<String>,
}

impl Place {
    pub fn new(position: Coordinate) -> Self {
        Self {
            position,
            address: None,
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookingRequest {
    pub pickup: Place,
    pub dropoff: Place,
    pub stop: Option<Place>,
    pub vehicle_class: VehicleClass,
    /// Routed trip distance; booking is refused without one.
    pub distance_km: Option<f64>,
    pub travel_time: Option<String>,
    pub return_trip: bool,
}

impl BookingRequest {
    pub fn quote_request(&self) -> QuoteRequest {
        QuoteRequest {
            vehicle_class: self.vehicle_class,
            distance_km: self.distance_km,
            pickup: self.pickup.position,
            dropoff: self.dropoff.position,
            stop: self.stop.as_ref().map(|stop| stop.position),
            return_trip: self.return_trip,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookingConfirmation {
    pub ride_id: String,
    pub otp: Option<String>,
    pub fare: f64,
}

type BookingReply = oneshot::Sender<Result<BookingConfirmation, BookingError>>;

#[derive(Debug)]
pub(crate) enum Command {
    Book {
        request: BookingRequest,
        reply: BookingReply,
    },
    Cancel,
    AcknowledgeCompletion,
    Snapshot {
        reply: oneshot::Sender<RideSession>,
    },
}

#[derive(Debug)]
pub(crate) enum Inbound {
    Transport(TransportEvent),
    DeviceLocation(Coordinate),
    Timer {
        kind: TimerKind,
        generation: u64,
        ride_id: Option<String>,
    },
    Command(Command),
    BookingPriced {
        attempt: u64,
        result: Result<f64, PricingError>,
    },
    BookingSubmitted {
        attempt: u64,
        result: Result<Value, TransportError>,
    },
    StatusAck {
        ride_id: String,
        result: Result<Value, TransportError>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

struct PendingBooking {
    attempt: u64,
    request: BookingRequest,
    otp: String,
    booked_at: DateTime<Utc>,
    fare: Option<f64>,
    reply: BookingReply,
}

enum PersistOp {
    Save(RideSession),
    Clear,
}

pub struct RideClientBuilder<S> {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    store: S,
    estimator: Option<Arc<dyn PriceEstimator>>,
    clock: Option<Arc<dyn Clock>>,
    rng_seed: Option<u64>,
}

impl<S: KeyValueStore> RideClientBuilder<S> {
    /// Replace the estimator `config.pricing` would select.
    pub fn estimator(mut self, estimator: Arc<dyn PriceEstimator>) -> Self {
        self.estimator = Some(estimator);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Deterministic OTP generation.
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub fn build(self) -> (RideClient<S>, ClientHandle, mpsc::UnboundedReceiver<Notice>) {
        let (tx, inbox) = mpsc::channel(self.config.inbox_capacity.max(1));
        let (notices, notice_rx) = mpsc::unbounded_channel();
        let estimator = self
            .estimator
            .unwrap_or_else(|| build_estimator(&self.config));
        let rng = match self.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let rider = RiderIdentity {
            user_id: self.config.user_id.clone(),
            customer_id: self.config.customer_id.clone(),
            user_name: self.config.user_name.clone(),
            user_mobile: self.config.user_mobile.clone(),
        };

        let client = RideClient {
            machine: RideStateMachine::new(ArrivalDetector::new(self.config.arrival_threshold_m)),
            reconciler: RideAcceptanceReconciler::new(self.config.user_id.clone()),
            session: RideSession::idle(),
            timers: TimerSet::new(tx.clone(), TimerCadence::from_config(&self.config)),
            ack_timeout: self.config.ack_timeout,
            no_driver_timeout: self.config.no_driver_timeout,
            rider,
            transport: self.transport,
            estimator: Arc::clone(&estimator),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            rng,
            store: Some(PersistedRideStore::new(self.store)),
            persist_tx: None,
            inbox,
            tx: tx.clone(),
            notices,
            rider_position: None,
            pending: None,
            next_attempt: 0,
        };
        (client, ClientHandle { tx, estimator }, notice_rx)
    }

    pub fn spawn(self) -> (ClientHandle, mpsc::UnboundedReceiver<Notice>, JoinHandle<()>) {
        let (client, handle, notices) = self.build();
        (handle, notices, tokio::spawn(client.run()))
    }
}

pub struct RideClient<S> {
    machine: RideStateMachine,
    reconciler: RideAcceptanceReconciler,
    session: RideSession,
    timers: TimerSet,
    ack_timeout: Duration,
    no_driver_timeout: Duration,
    rider: RiderIdentity,
    transport: Arc<dyn Transport>,
    estimator: Arc<dyn PriceEstimator>,
    clock: Arc<dyn Clock>,
    rng: StdRng,
    store: Option<PersistedRideStore<S>>,
    persist_tx: Option<mpsc::UnboundedSender<PersistOp>>,
    inbox: mpsc::Receiver<Inbound>,
    tx: mpsc::Sender<Inbound>,
    notices: mpsc::UnboundedSender<Notice>,
    rider_position: Option<Coordinate>,
    pending: Option<PendingBooking>,
    next_attempt: u64,
}

impl<S: KeyValueStore> RideClient<S> {
    pub fn builder(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        store: S,
    ) -> RideClientBuilder<S> {
        RideClientBuilder {
            config,
            transport,
            store,
            estimator: None,
            clock: None,
            rng_seed: None,
        }
    }

    pub async fn run(mut self) {
        for event in SUBSCRIBED_EVENTS {
            if let Err(err) = self.transport.subscribe(event).await {
                warn!(event, error = %err, "subscribe failed");
            }
        }

        // The store is read once, before anything in the inbox is handled.
        let writer = match self.store.take() {
            Some(store) => {
                let recovered = store.load(self.clock.now()).await;
                let (persist_tx, persist_rx) = mpsc::unbounded_channel();
                self.persist_tx = Some(persist_tx);
                let writer = tokio::spawn(persistence_writer(store, persist_rx));
                if let Some(recovered) = recovered {
                    self.handle_raw(RawEvent::Recovered(recovered));
                }
                Some(writer)
            }
            None => None,
        };

        let mut stopped_by = None;
        while let Some(message) = self.inbox.recv().await {
            if let ControlFlow::Break(reply) = self.handle(message) {
                stopped_by = Some(reply);
                break;
            }
        }

        self.timers.cancel_all();
        if let Some(pending) = self.pending.take() {
            let _ = pending.reply.send(Err(BookingError::Closed));
        }
        for event in SUBSCRIBED_EVENTS {
            if let Err(err) = self.transport.unsubscribe(event).await {
                debug!(event, error = %err, "unsubscribe failed");
            }
        }
        self.persist_tx = None;
        if let Some(writer) = writer {
            if let Err(err) = writer.await {
                warn!(error = %err, "persistence writer panicked");
            }
        }
        info!(status = %self.session.status, "ride client stopped");
        if let Some(reply) = stopped_by {
            let _ = reply.send(());
        }
    }

    fn handle(&mut self, message: Inbound) -> ControlFlow<oneshot::Sender<()>> {
        match message {
            Inbound::Transport(event) => self.on_transport(event),
            Inbound::DeviceLocation(position) => self.on_device_location(position),
            Inbound::Timer {
                kind,
                generation,
                ride_id,
            } => self.on_timer(kind, generation, ride_id),
            Inbound::Command(command) => self.on_command(command),
            Inbound::BookingPriced { attempt, result } => self.on_booking_priced(attempt, result),
            Inbound::BookingSubmitted { attempt, result } => {
                self.on_booking_submitted(attempt, result)
            }
            Inbound::StatusAck { ride_id, result } => self.on_status_ack(ride_id, result),
            Inbound::Shutdown { reply } => return ControlFlow::Break(reply),
        }
        ControlFlow::Continue(())
    }

    fn on_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                info!("transport connected");
                if let Some(user_id) = self.rider.user_id.clone() {
                    self.send(wire::register_user(&user_id));
                }
                self.apply(RideEvent::TransportReconnected);
            }
            TransportEvent::Disconnected { reason } => {
                warn!(%reason, "transport disconnected");
            }
            TransportEvent::ConnectError { reason } => {
                warn!(%reason, "transport connect error");
            }
            TransportEvent::Message { event, payload } => match wire::decode(&event, payload) {
                Ok(raw) => self.handle_raw(raw),
                Err(WireError::UnknownEvent(name)) => {
                    debug!(event = %name, "ignoring unsubscribed event");
                }
                Err(err) => warn!(error = %err, "dropping malformed transport message"),
            },
        }
    }

    fn on_device_location(&mut self, position: Coordinate) {
        match Coordinate::checked(position.latitude, position.longitude) {
            Some(position) => self.rider_position = Some(position),
            None => warn!(
                latitude = position.latitude,
                longitude = position.longitude,
                "ignoring invalid device location"
            ),
        }
    }

    fn on_timer(&mut self, kind: TimerKind, generation: u64, ride_id: Option<String>) {
        if !self.timers.accept_tick(kind, generation) {
            debug!(timer = kind.as_str(), generation, "dropping tick from a cancelled timer");
            return;
        }
        if ride_id != self.session.ride_id {
            debug!(timer = kind.as_str(), ?ride_id, "dropping tick for another ride");
            return;
        }
        match kind.tick_event(ride_id, self.rider_position) {
            Some(event) => {
                self.apply(event);
            }
            None => debug!(timer = kind.as_str(), "no device location to broadcast yet"),
        }
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Book { request, reply } => self.on_book(request, reply),
            Command::Cancel => self.on_cancel(),
            Command::AcknowledgeCompletion => {
                self.apply(RideEvent::ResetAcknowledged);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.session.clone());
            }
        }
    }

    fn on_book(&mut self, request: BookingRequest, reply: BookingReply) {
        if self.pending.is_some() || self.session.booking_in_flight() {
            let _ = reply.send(Err(BookingError::InFlight));
            return;
        }
        if !self.session.status.accepts_booking() {
            let _ = reply.send(Err(BookingError::RideActive(self.session.status)));
            return;
        }

        self.next_attempt += 1;
        let attempt = self.next_attempt;
        let otp = generate_otp(self.rider.customer_id.as_deref(), &mut self.rng);
        let quote = request.quote_request();
        let estimator = Arc::clone(&self.estimator);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = estimator.estimate(&quote).await;
            let _ = tx.send(Inbound::BookingPriced { attempt, result }).await;
        });

        info!(
            attempt,
            vehicle_class = request.vehicle_class.as_str(),
            "pricing booking"
        );
        self.pending = Some(PendingBooking {
            attempt,
            request,
            otp,
            booked_at: self.clock.now(),
            fare: None,
            reply,
        });
    }

    fn take_pending(&mut self, attempt: u64) -> Option<PendingBooking> {
        if self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.attempt == attempt)
        {
            self.pending.take()
        } else {
            None
        }
    }

    fn on_booking_priced(&mut self, attempt: u64, result: Result<f64, PricingError>) {
        let Some(mut pending) = self.take_pending(attempt) else {
            debug!(attempt, "price arrived for an abandoned booking");
            return;
        };
        let fare = match result {
            Ok(fare) => fare,
            Err(err) => {
                warn!(attempt, error = %err, "price lookup failed");
                let _ = pending.reply.send(Err(BookingError::Pricing(err)));
                return;
            }
        };

        let details = BookingDetails {
            pickup: pending.request.pickup.position,
            dropoff: pending.request.dropoff.position,
            vehicle_class: pending.request.vehicle_class,
            quoted_fare: Some(fare),
            booked_at: pending.booked_at,
        };
        if !self.apply(RideEvent::BookingSubmitted(details)) {
            let _ = pending
                .reply
                .send(Err(BookingError::RideActive(self.session.status)));
            return;
        }

        pending.fare = Some(fare);
        let payload = wire::booking_payload(&pending.request, &self.rider, &pending.otp, fare);
        let transport = Arc::clone(&self.transport);
        let tx = self.tx.clone();
        let timeout = self.ack_timeout;
        tokio::spawn(async move {
            let message = WireMessage {
                event: wire::EVENT_BOOK_RIDE,
                payload,
            };
            let result = emit_with_ack(transport.as_ref(), message, timeout).await;
            let _ = tx.send(Inbound::BookingSubmitted { attempt, result }).await;
        });
        info!(attempt, fare, "booking submitted");
        self.pending = Some(pending);
    }

    fn on_booking_submitted(&mut self, attempt: u64, result: Result<Value, TransportError>) {
        let Some(pending) = self.take_pending(attempt) else {
            self.release_abandoned_ride(attempt, result);
            return;
        };
        let fare = pending.fare.unwrap_or_default();

        let payload = match result {
            Ok(payload) => payload,
            Err(err) => {
                warn!(attempt, error = %err, "booking was not acknowledged");
                self.apply(RideEvent::BookingFailed {
                    reason: err.to_string(),
                });
                let _ = pending.reply.send(Err(BookingError::Transport(err)));
                return;
            }
        };
        let mut ack = match wire::decode_booking_ack(payload) {
            Ok(ack) => ack,
            Err(err) => {
                let reason = err.to_string();
                self.apply(RideEvent::BookingFailed {
                    reason: reason.clone(),
                });
                let _ = pending.reply.send(Err(BookingError::Rejected(reason)));
                return;
            }
        };
        if ack.otp.is_none() {
            ack.otp = Some(pending.otp.clone());
        }
        let message = ack.message.clone();
        self.handle_raw(RawEvent::BookingCreated(ack));

        let outcome = match self.session.ride_id.clone() {
            Some(ride_id) => Ok(BookingConfirmation {
                ride_id,
                otp: self.session.otp.clone(),
                fare,
            }),
            None => {
                let reason = message.unwrap_or_else(|| "booking rejected".to_string());
                if self.session.booking_in_flight() {
                    self.apply(RideEvent::BookingFailed {
                        reason: reason.clone(),
                    });
                }
                Err(BookingError::Rejected(reason))
            }
        };
        let _ = pending.reply.send(outcome);
    }

    /// A booking cancelled while its submission was in flight may still have
    /// created a ride on the server; cancel it there too.
    fn release_abandoned_ride(&mut self, attempt: u64, result: Result<Value, TransportError>) {
        let Some(ack) = result
            .ok()
            .and_then(|payload| wire::decode_booking_ack(payload).ok())
        else {
            debug!(attempt, "abandoned booking was not created");
            return;
        };
        if ack.success == Some(false) {
            return;
        }
        let Some(ride_id) = ack.ride_id else {
            return;
        };
        if self.session.is_ride(&ride_id) {
            return;
        }
        info!(attempt, ride_id = %ride_id, "cancelling ride created for an abandoned booking");
        self.send(wire::encode(&Outbound::CancelRide { ride_id }));
    }

    fn on_cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            let _ = pending.reply.send(Err(BookingError::Cancelled));
            if self.session.is_pristine() {
                info!(attempt = pending.attempt, "booking cancelled during price lookup");
                self.notify(Notice::RideCancelled);
                return;
            }
        }
        self.apply(RideEvent::RiderCancelled);
    }

    fn on_status_ack(&mut self, ride_id: String, result: Result<Value, TransportError>) {
        match result {
            Ok(payload) => match wire::decode_status_ack(&ride_id, payload) {
                Ok(raw) => self.handle_raw(raw),
                Err(err) => debug!(ride_id = %ride_id, error = %err, "unusable status answer"),
            },
            Err(err) => debug!(ride_id = %ride_id, error = %err, "status poll got no answer"),
        }
    }

    fn handle_raw(&mut self, raw: RawEvent) {
        let channel = raw.channel();
        match self.reconciler.reconcile(&self.session, raw) {
            Reconciled::Apply(event) => {
                self.apply(event);
            }
            Reconciled::Discard(discard) => log_discard(channel, &discard),
        }
    }

    /// Run one transition and carry out its effects. Returns false when the
    /// event was rejected.
    fn apply(&mut self, event: RideEvent) -> bool {
        let transition = self.machine.transition(&self.session, &event);
        if let Some(rejected) = transition.rejected {
            debug!(
                event = rejected.event,
                status = %rejected.status,
                reason = %rejected.reason,
                "transition rejected"
            );
            return false;
        }

        let before = self.session.status;
        self.session = transition.session;
        if self.session.status != before {
            info!(
                ride_id = self.session.ride_id.as_deref().unwrap_or("-"),
                driver_id = self.session.driver_id().unwrap_or("-"),
                from = %before,
                status = %self.session.status,
                event = event.name(),
                "ride status changed"
            );
        }
        for effect in transition.effects {
            self.perform(effect);
        }
        true
    }

    fn perform(&mut self, effect: Effect) {
        match effect {
            Effect::Persist => self.persist(PersistOp::Save(self.session.clone())),
            Effect::ClearPersisted => self.persist(PersistOp::Clear),
            Effect::StartTimer(TimerKind::NoDriverTimeout) => {
                let remaining = self.no_driver_remaining();
                self.timers.start_after(
                    TimerKind::NoDriverTimeout,
                    self.session.ride_id.clone(),
                    remaining,
                );
            }
            Effect::StartTimer(kind) => self.timers.start(kind, self.session.ride_id.clone()),
            Effect::CancelTimer(kind) => self.timers.cancel(kind),
            Effect::Notify(notice) => self.notify(notice),
            Effect::Emit(outbound) => self.emit(&outbound),
        }
    }

    /// The no-driver window is measured from `bookedAt`, so a ride recovered
    /// after a restart only gets what is left of it.
    fn no_driver_remaining(&self) -> Duration {
        let Some(booked_at) = self.session.booked_at else {
            return self.no_driver_timeout;
        };
        let elapsed = (self.clock.now() - booked_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        self.no_driver_timeout.saturating_sub(elapsed)
    }

    fn persist(&self, op: PersistOp) {
        if let Some(tx) = &self.persist_tx {
            if tx.send(op).is_err() {
                warn!("persistence writer has stopped");
            }
        }
    }

    fn notify(&self, notice: Notice) {
        if self.notices.send(notice).is_err() {
            debug!("notice receiver dropped");
        }
    }

    fn emit(&self, outbound: &Outbound) {
        let message = wire::encode(outbound);
        match outbound {
            Outbound::RequestRideStatus { ride_id } => {
                let ride_id = ride_id.clone();
                let transport = Arc::clone(&self.transport);
                let tx = self.tx.clone();
                let timeout = self.ack_timeout;
                tokio::spawn(async move {
                    let result = emit_with_ack(transport.as_ref(), message, timeout).await;
                    let _ = tx.send(Inbound::StatusAck { ride_id, result }).await;
                });
            }
            _ => self.send(message),
        }
    }

    fn send(&self, message: WireMessage) {
        let transport = Arc::clone(&self.transport);
        tokio::spawn(async move {
            let WireMessage { event, payload } = message;
            if let Err(err) = transport.emit(event, payload).await {
                warn!(event, error = %err, "emit failed");
            }
        });
    }
}

async fn emit_with_ack(
    transport: &dyn Transport,
    message: WireMessage,
    timeout: Duration,
) -> Result<Value, TransportError> {
    let WireMessage { event, payload } = message;
    match tokio::time::timeout(timeout, transport.emit_with_ack(event, payload)).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::AckTimeout {
            event: event.to_string(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

fn log_discard(channel: Channel, discard: &Discard) {
    match discard {
        Discard::Malformed { .. } | Discard::InvalidCoordinate { .. } => {
            warn!(channel = %channel, reason = %discard, "discarding malformed signal");
        }
        _ => debug!(channel = %channel, reason = %discard, "signal discarded"),
    }
}

async fn persistence_writer<S: KeyValueStore>(
    store: PersistedRideStore<S>,
    mut rx: mpsc::UnboundedReceiver<PersistOp>,
) {
    while let Some(op) = rx.recv().await {
        let result = match &op {
            PersistOp::Save(session) => store.save(session).await,
            PersistOp::Clear => store.clear().await,
        };
        if let Err(err) = result {
            warn!(error = %err, "persisting ride state failed");
        }
    }
}

/// Cloneable front door to a running [`RideClient`].
#[derive(Clone)]
pub struct ClientHandle {
    tx: mpsc::Sender<Inbound>,
    estimator: Arc<dyn PriceEstimator>,
}

impl ClientHandle {
    async fn send(&self, message: Inbound) -> Result<(), ClientClosed> {
        self.tx.send(message).await.map_err(|_| ClientClosed)
    }

    /// Price the trip, submit it and wait for the server to assign a ride id.
    pub async fn book(&self, request: BookingRequest) -> Result<BookingConfirmation, BookingError> {
        let (reply, rx) = oneshot::channel();
        self.send(Inbound::Command(Command::Book { request, reply }))
            .await?;
        rx.await.map_err(|_| BookingError::Closed)?
    }

    pub async fn cancel(&self) -> Result<(), ClientClosed> {
        self.send(Inbound::Command(Command::Cancel)).await
    }

    /// Dismiss the completion summary and return to idle.
    pub async fn acknowledge_completion(&self) -> Result<(), ClientClosed> {
        self.send(Inbound::Command(Command::AcknowledgeCompletion))
            .await
    }

    pub async fn snapshot(&self) -> Result<RideSession, ClientClosed> {
        let (reply, rx) = oneshot::channel();
        self.send(Inbound::Command(Command::Snapshot { reply }))
            .await?;
        rx.await.map_err(|_| ClientClosed)
    }

    /// Quote a trip without booking it.
    pub async fn quote(&self, request: &QuoteRequest) -> Result<f64, PricingError> {
        self.estimator.estimate(request).await
    }

    pub async fn report_device_location(&self, position: Coordinate) -> Result<(), ClientClosed> {
        self.send(Inbound::DeviceLocation(position)).await
    }

    pub fn transport_sink(&self) -> TransportSink {
        TransportSink::new(self.tx.clone())
    }

    /// Stop the client once queued input is handled and pending writes are flushed.
    pub async fn shutdown(&self) -> Result<(), ClientClosed> {
        let (reply, rx) = oneshot::channel();
        self.send(Inbound::Shutdown { reply }).await?;
        rx.await.map_err(|_| ClientClosed)
    }
}
