//! Event names and JSON payload shapes spoken with the dispatch server.

use ride_core::event::Outbound;
use ride_core::reconciler::{Channel, RawEvent};
use ride_core::signal::{BookingAckPayload, RideStatusPayload};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::error::WireError;
use crate::runtime::{BookingRequest, Place};

pub const EVENT_BOOK_RIDE: &str = "bookRide";
pub const EVENT_GET_RIDE_STATUS: &str = "getRideStatus";
pub const EVENT_REGISTER_USER: &str = "registerUser";

/// Inbound events the client listens for.
pub const SUBSCRIBED_EVENTS: [&str; 9] = [
    "rideAccepted",
    "rideAcceptedBroadcast",
    "backupRideAccepted",
    "driverDataResponse",
    "rideStatusResponse",
    "rideStatusUpdate",
    "rideCompleted",
    "rideCreated",
    "driverLiveLocationUpdate",
];

#[derive(Debug, Clone, PartialEq)]
pub struct WireMessage {
    pub event: &'static str,
    pub payload: Value,
}

/// Rider details sent with every booking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RiderIdentity {
    pub user_id: Option<String>,
    pub customer_id: Option<String>,
    pub user_name: Option<String>,
    pub user_mobile: Option<String>,
}

pub fn decode(event: &str, payload: Value) -> Result<RawEvent, WireError> {
    let acceptance = |channel: Channel, payload: Value| -> Result<RawEvent, WireError> {
        Ok(RawEvent::Acceptance {
            channel,
            payload: parse(event, payload)?,
        })
    };
    let status = |channel: Channel, payload: Value| -> Result<RawEvent, WireError> {
        Ok(RawEvent::RideStatus {
            channel,
            payload: parse(event, payload)?,
        })
    };
    match event {
        "rideAccepted" => acceptance(Channel::Push, payload),
        "rideAcceptedBroadcast" => acceptance(Channel::Broadcast, payload),
        "backupRideAccepted" => acceptance(Channel::Backup, payload),
        "driverDataResponse" => acceptance(Channel::DriverData, payload),
        "rideStatusResponse" => status(Channel::StatusPoll, payload),
        "rideStatusUpdate" => status(Channel::StatusUpdate, payload),
        "rideCompleted" => Ok(RawEvent::RideCompleted(parse(event, payload)?)),
        "rideCreated" => Ok(RawEvent::BookingCreated(parse(event, payload)?)),
        "driverLiveLocationUpdate" => Ok(RawEvent::DriverLocation(parse(event, payload)?)),
        other => Err(WireError::UnknownEvent(other.to_string())),
    }
}

/// The `getRideStatus` acknowledgement; a missing `rideId` is taken from
/// the request.
pub fn decode_status_ack(ride_id: &str, payload: Value) -> Result<RawEvent, WireError> {
    let mut payload: RideStatusPayload = parse(EVENT_GET_RIDE_STATUS, payload)?;
    if payload.ride_id.is_none() {
        payload.ride_id = Some(ride_id.to_string());
    }
    Ok(RawEvent::RideStatus {
        channel: Channel::StatusPoll,
        payload,
    })
}

pub fn decode_booking_ack(payload: Value) -> Result<BookingAckPayload, WireError> {
    parse(EVENT_BOOK_RIDE, payload)
}

fn parse<T: DeserializeOwned>(event: &str, payload: Value) -> Result<T, WireError> {
    // Some servers ack with `null` when there is nothing to report.
    let payload = match payload {
        Value::Null => json!({}),
        Value::Object(_) => payload,
        other => {
            return Err(WireError::Payload {
                event: event.to_string(),
                source: <serde_json::Error as serde::de::Error>::invalid_type(
                    unexpected(&other),
                    &"a JSON object",
                ),
            })
        }
    };
    serde_json::from_value(payload).map_err(|source| WireError::Payload {
        event: event.to_string(),
        source,
    })
}

fn unexpected(value: &Value) -> serde::de::Unexpected<'_> {
    use serde::de::Unexpected;
    match value {
        Value::Bool(b) => Unexpected::Bool(*b),
        Value::Number(_) => Unexpected::Other("number"),
        Value::String(s) => Unexpected::Str(s),
        Value::Array(_) => Unexpected::Seq,
        Value::Null | Value::Object(_) => Unexpected::Map,
    }
}

pub fn encode(outbound: &Outbound) -> WireMessage {
    match outbound {
        Outbound::RequestRideStatus { ride_id } => WireMessage {
            event: EVENT_GET_RIDE_STATUS,
            payload: json!({ "rideId": ride_id }),
        },
        Outbound::DriverReachedDestination {
            ride_id,
            driver_id,
            distance_km,
        } => WireMessage {
            event: "driverReachedDestination",
            payload: json!({
                "rideId": ride_id,
                "driverId": driver_id,
                "distance": format!("{distance_km:.2}"),
            }),
        },
        Outbound::RiderLocation { ride_id, position } => WireMessage {
            event: "userLocationUpdate",
            payload: json!({
                "rideId": ride_id,
                "latitude": position.latitude,
                "longitude": position.longitude,
            }),
        },
        Outbound::CancelRide { ride_id } => WireMessage {
            event: "cancelRide",
            payload: json!({ "rideId": ride_id }),
        },
    }
}

pub fn register_user(user_id: &str) -> WireMessage {
    WireMessage {
        event: EVENT_REGISTER_USER,
        payload: json!({ "userId": user_id }),
    }
}

fn place(place: &Place) -> Value {
    json!({
        "lat": place.position.latitude,
        "lng": place.position.longitude,
        "address": place.address.as_deref().unwrap_or(""),
    })
}

pub fn booking_payload(
    request: &BookingRequest,
    rider: &RiderIdentity,
    otp: &str,
    estimated_price: f64,
) -> Value {
    json!({
        "userId": rider.user_id,
        "customerId": rider.customer_id,
        "userName": rider.user_name,
        "userMobile": rider.user_mobile,
        "pickup": place(&request.pickup),
        "drop": place(&request.dropoff),
        "stop": request.stop.as_ref().map(place),
        "vehicleType": request.vehicle_class.as_str(),
        "otp": otp,
        "estimatedPrice": estimated_price,
        "distance": request.distance_km,
        "travelTime": request.travel_time,
        "wantReturn": request.return_trip,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ride_core::geo::Coordinate;
    use ride_core::session::VehicleClass;

    #[test]
    fn known_events_decode_to_their_channels() {
        let raw = decode(
            "rideAcceptedBroadcast",
            json!({"rideId": "R1", "driverId": "D9", "targetUserId": "U7"}),
        )
        .expect("decode");
        assert_eq!(raw.channel(), Channel::Broadcast);

        let raw = decode("rideStatusResponse", json!({"rideId": "R1"})).expect("decode");
        assert_eq!(raw.channel(), Channel::StatusPoll);

        assert!(matches!(
            decode("nearbyDrivers", json!({})),
            Err(WireError::UnknownEvent(name)) if name == "nearbyDrivers"
        ));
    }

    #[test]
    fn wrong_shapes_are_payload_errors() {
        assert!(matches!(
            decode("rideAccepted", json!(["R1"])),
            Err(WireError::Payload { .. })
        ));
        assert!(matches!(
            decode("rideStatusUpdate", json!(["R1", "arrived"])),
            Err(WireError::Payload { .. })
        ));
        assert!(matches!(
            decode_booking_ack(json!("R1")),
            Err(WireError::Payload { event, .. }) if event == EVENT_BOOK_RIDE
        ));
        assert!(matches!(
            decode_status_ack("R1", json!(true)),
            Err(WireError::Payload { .. })
        ));
    }

    #[test]
    fn status_ack_inherits_ride_id() {
        let RawEvent::RideStatus { payload, .. } =
            decode_status_ack("R1", Value::Null).expect("decode")
        else {
            panic!("expected a status payload");
        };
        assert_eq!(payload.ride_id.as_deref(), Some("R1"));
    }

    #[test]
    fn destination_distance_has_two_decimals() {
        let message = encode(&Outbound::DriverReachedDestination {
            ride_id: "R1".to_string(),
            driver_id: "D9".to_string(),
            distance_km: 84.236,
        });
        assert_eq!(message.event, "driverReachedDestination");
        assert_eq!(
            message.payload,
            json!({"rideId": "R1", "driverId": "D9", "distance": "84.24"})
        );
    }

    #[test]
    fn booking_payload_carries_trip_and_rider() {
        let request = BookingRequest {
            pickup: Place::new(Coordinate::new(11.33, 77.71)).with_address("Bus stand"),
            dropoff: Place::new(Coordinate::new(11.02, 77.01)),
            stop: None,
            vehicle_class: VehicleClass::Cargo,
            distance_km: Some(84.2),
            travel_time: Some("1 hr 40 mins".to_string()),
            return_trip: true,
        };
        let rider = RiderIdentity {
            user_id: Some("U7".to_string()),
            customer_id: Some("CUST4821".to_string()),
            ..RiderIdentity::default()
        };
        let payload = booking_payload(&request, &rider, "4821", 4_370.0);
        assert_eq!(payload["vehicleType"], "cargo");
        assert_eq!(payload["pickup"]["address"], "Bus stand");
        assert_eq!(payload["drop"]["lat"], 11.02);
        assert_eq!(payload["otp"], "4821");
        assert_eq!(payload["wantReturn"], true);
        assert!(payload["stop"].is_null());
    }
}
