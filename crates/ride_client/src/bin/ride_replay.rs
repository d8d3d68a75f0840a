//! Replay a recorded signal stream through the reconciler and state machine.
//!
//! Input is JSON lines of `{"event": ..., "payload": ...}`. Transport event
//! names are decoded as the client would decode them; a few local events
//! stand in for rider actions and timers:
//!
//! - `book` with `{pickup, dropoff, vehicleType, distance, wantReturn}`
//! - `connect`, `cancel`, `reset`
//! - `tick` with `{"timer": "acceptancePoll"}`
//! - `riderLocation` with `{lat, lng}`
//!
//! One JSON line is printed per input line with the resulting status and
//! effects, or why the input was dropped.

use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;

use chrono::Utc;
use clap::Parser;
use ride_client::logging::init_logging;
use ride_client::wire;
use ride_core::arrival::{ArrivalDetector, DEFAULT_ARRIVAL_THRESHOLD_M};
use ride_core::event::{RideEvent, TimerKind};
use ride_core::geo::Coordinate;
use ride_core::machine::RideStateMachine;
use ride_core::pricing::FareTable;
use ride_core::reconciler::{Reconciled, RideAcceptanceReconciler};
use ride_core::session::{BookingDetails, RideSession, VehicleClass};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "ride_replay",
    about = "Replay a recorded ride signal stream and print every transition"
)]
struct Cli {
    /// JSON lines file; reads stdin when omitted
    input: Option<PathBuf>,
    /// Rider id used to filter targeted broadcasts
    #[arg(long, env = "RIDE_USER_ID")]
    rider_id: Option<String>,
    /// Pickup and dropoff arrival radius in metres
    #[arg(long, default_value_t = DEFAULT_ARRIVAL_THRESHOLD_M)]
    threshold_m: f64,
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Deserialize)]
struct Line {
    event: String,
    #[serde(default)]
    payload: Value,
}

#[derive(Debug, Deserialize)]
struct Point {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookLine {
    pickup: Point,
    dropoff: Point,
    vehicle_type: String,
    distance: Option<f64>,
    #[serde(default)]
    want_return: bool,
}

#[derive(Debug, Deserialize)]
struct TickLine {
    timer: String,
}

struct Replay {
    machine: RideStateMachine,
    reconciler: RideAcceptanceReconciler,
    fares: FareTable,
    session: RideSession,
    rider_position: Option<Coordinate>,
}

impl Replay {
    fn step(&mut self, line: Line) -> Value {
        let event = match self.local_event(&line) {
            Some(Ok(event)) => event,
            Some(Err(dropped)) => return json!({ "event": line.event, "dropped": dropped }),
            None => match wire::decode(&line.event, line.payload) {
                Ok(raw) => match self.reconciler.reconcile(&self.session, raw) {
                    Reconciled::Apply(event) => event,
                    Reconciled::Discard(discard) => {
                        return json!({
                            "event": line.event,
                            "status": self.session.status,
                            "discarded": discard.to_string(),
                        })
                    }
                },
                Err(err) => return json!({ "event": line.event, "dropped": err.to_string() }),
            },
        };

        let transition = self.machine.transition(&self.session, &event);
        if let Some(rejected) = &transition.rejected {
            return json!({
                "event": line.event,
                "status": self.session.status,
                "rejected": rejected.to_string(),
            });
        }
        self.session = transition.session;
        json!({
            "event": line.event,
            "applied": event.name(),
            "status": self.session.status,
            "effects": transition.effects,
        })
    }

    /// `None` for transport events, which go through the reconciler.
    fn local_event(&mut self, line: &Line) -> Option<Result<RideEvent, String>> {
        let ride_id = self.session.ride_id.clone();
        let event = match line.event.as_str() {
            "connect" => Ok(RideEvent::TransportReconnected),
            "cancel" => Ok(RideEvent::RiderCancelled),
            "reset" => Ok(RideEvent::ResetAcknowledged),
            "book" => self.booking(&line.payload),
            "riderLocation" => {
                return Some(match parse::<Point>(&line.payload) {
                    Ok(point) => match Coordinate::checked(point.lat, point.lng) {
                        Some(position) => {
                            self.rider_position = Some(position);
                            Err("device location recorded".to_string())
                        }
                        None => Err("invalid device location".to_string()),
                    },
                    Err(err) => Err(err),
                })
            }
            "tick" => parse::<TickLine>(&line.payload).and_then(|tick| {
                let kind = TimerKind::from_name(&tick.timer)
                    .ok_or_else(|| format!("unknown timer {}", tick.timer))?;
                kind.tick_event(ride_id, self.rider_position)
                    .ok_or_else(|| "no device location to broadcast".to_string())
            }),
            _ => return None,
        };
        Some(event)
    }

    fn booking(&self, payload: &Value) -> Result<RideEvent, String> {
        let book: BookLine = parse(payload)?;
        let vehicle_class = VehicleClass::from_wire(&book.vehicle_type)
            .ok_or_else(|| format!("unknown vehicle type {}", book.vehicle_type))?;
        let pickup = Coordinate::checked(book.pickup.lat, book.pickup.lng)
            .ok_or_else(|| "invalid pickup".to_string())?;
        let dropoff = Coordinate::checked(book.dropoff.lat, book.dropoff.lng)
            .ok_or_else(|| "invalid dropoff".to_string())?;
        let quoted_fare = self
            .fares
            .estimate(vehicle_class, book.distance, book.want_return)
            .ok_or_else(|| "trip has no distance to price".to_string())?;
        Ok(RideEvent::BookingSubmitted(BookingDetails {
            pickup,
            dropoff,
            vehicle_class,
            quoted_fare: Some(quoted_fare),
            booked_at: Utc::now(),
        }))
    }
}

fn parse<T: for<'de> Deserialize<'de>>(payload: &Value) -> Result<T, String> {
    serde_json::from_value(payload.clone()).map_err(|err| err.to_string())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let reader: Box<dyn BufRead> = match &cli.input {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(BufReader::new(io::stdin())),
    };
    let mut replay = Replay {
        machine: RideStateMachine::new(ArrivalDetector::new(cli.threshold_m)),
        reconciler: RideAcceptanceReconciler::new(cli.rider_id),
        fares: FareTable::default(),
        session: RideSession::idle(),
        rider_position: None,
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut steps = 0usize;
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let parsed: Line = match serde_json::from_str(&line) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(line = index + 1, error = %err, "skipping unparsable line");
                continue;
            }
        };
        writeln!(out, "{}", replay.step(parsed))?;
        steps += 1;
    }

    info!(steps, status = %replay.session.status, "replay finished");
    writeln!(out, "{}", serde_json::to_string(&replay.session)?)?;
    Ok(())
}
