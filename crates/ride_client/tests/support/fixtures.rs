use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use ride_client::adapters::pricing::PriceEstimator;
use ride_client::clock::ManualClock;
use ride_client::{
    BookingRequest, ClientConfig, ClientHandle, MemoryStore, Place, RideClient, TransportSink,
};
use ride_core::event::Notice;
use ride_core::geo::Coordinate;
use ride_core::session::VehicleClass;
use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use super::loopback::LoopbackTransport;

pub const RIDER_ID: &str = "U7";
pub const METRES_PER_DEGREE_LAT: f64 = 111_194.93;

pub fn pickup() -> Coordinate {
    Coordinate::new(11.33, 77.71)
}

pub fn dropoff() -> Coordinate {
    Coordinate::new(11.02, 77.01)
}

pub fn offset_north(origin: Coordinate, metres: f64) -> Coordinate {
    Coordinate::new(origin.latitude + metres / METRES_PER_DEGREE_LAT, origin.longitude)
}

pub fn booked_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap()
}

pub fn config() -> ClientConfig {
    ClientConfig::default()
        .with_user_id(RIDER_ID)
        .with_customer_id("C1042")
        .with_profile("Asha", "9876543210")
}

/// 86 km by taxi: 50 + 86 * 15 = 1340.
pub fn taxi_request() -> BookingRequest {
    BookingRequest {
        pickup: Place::new(pickup()).with_address("Erode bus stand"),
        dropoff: Place::new(dropoff()).with_address("Coimbatore junction"),
        stop: None,
        vehicle_class: VehicleClass::Taxi,
        distance_km: Some(86.0),
        travel_time: Some("2 hours".to_string()),
        return_trip: false,
    }
}

pub fn booking_ack(ride_id: &str, otp: &str) -> Value {
    json!({ "success": true, "rideId": ride_id, "otp": otp })
}

pub fn acceptance(ride_id: &str, driver_id: &str, position: Coordinate) -> Value {
    json!({
        "rideId": ride_id,
        "driverId": driver_id,
        "driverName": format!("Driver {driver_id}"),
        "driverMobile": "9000000000",
        "vehicleType": "taxi",
        "driverLat": position.latitude,
        "driverLng": position.longitude,
        "targetUserId": RIDER_ID,
        "success": true,
    })
}

pub struct RunningClient {
    pub handle: ClientHandle,
    pub sink: TransportSink,
    pub notices: UnboundedReceiver<Notice>,
    pub transport: Arc<LoopbackTransport>,
    pub store: MemoryStore,
    pub task: JoinHandle<()>,
}

impl RunningClient {
    pub fn start(config: ClientConfig, store: MemoryStore) -> Self {
        Self::start_with(config, store, None)
    }

    pub fn start_with(
        config: ClientConfig,
        store: MemoryStore,
        estimator: Option<Arc<dyn PriceEstimator>>,
    ) -> Self {
        let transport = LoopbackTransport::new();
        let mut builder = RideClient::builder(config, transport.clone(), store.clone())
            .clock(Arc::new(ManualClock::new(booked_at())))
            .rng_seed(7);
        if let Some(estimator) = estimator {
            builder = builder.estimator(estimator);
        }
        let (handle, notices, task) = builder.spawn();
        let sink = handle.transport_sink();
        Self {
            handle,
            sink,
            notices,
            transport,
            store,
            task,
        }
    }

    /// Collect every notice published so far.
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        let mut notices = Vec::new();
        while let Ok(notice) = self.notices.try_recv() {
            notices.push(notice);
        }
        notices
    }

    pub async fn push(&self, event: &str, payload: Value) {
        self.sink.message(event, payload).await.expect("client running");
    }
}

/// Let spawned work run to quiescence without moving the paused clock far.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
