//! Raw payloads as they arrive from the transport.
//!
//! Every field is optional: the dispatch side omits fields freely and the
//! reconciler decides what is required. Numeric fields accept JSON numbers or
//! numeric strings.

use serde::{Deserialize, Deserializer, Serialize};

/// A number that may have been sent as a string (`"3.42"`).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum LenientNumber {
    Number(f64),
    Text(String),
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<LenientNumber>::deserialize(deserializer)?;
    Ok(match value {
        Some(LenientNumber::Number(n)) => Some(n),
        Some(LenientNumber::Text(text)) => text.trim().parse::<f64>().ok(),
        None => None,
    }
    .filter(|n| n.is_finite()))
}

/// Ride identifiers are strings on most channels but numbers on some.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum LenientId {
    Text(String),
    Number(i64),
}

fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<LenientId>::deserialize(deserializer)?;
    Ok(match value {
        Some(LenientId::Text(text)) => Some(text.trim().to_string()),
        Some(LenientId::Number(n)) => Some(n.to_string()),
        None => None,
    }
    .filter(|id| !id.is_empty()))
}

/// `rideAccepted`, `rideAcceptedBroadcast`, `backupRideAccepted`,
/// `driverDataResponse`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AcceptancePayload {
    #[serde(deserialize_with = "lenient_id")]
    pub ride_id: Option<String>,
    #[serde(deserialize_with = "lenient_id")]
    pub driver_id: Option<String>,
    pub driver_name: Option<String>,
    pub driver_mobile: Option<String>,
    pub vehicle_type: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub driver_lat: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub driver_lng: Option<f64>,
    #[serde(deserialize_with = "lenient_id")]
    pub target_user_id: Option<String>,
    pub success: Option<bool>,
}

/// `rideStatusResponse`, `rideStatusUpdate` and the `getRideStatus` ack.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RideStatusPayload {
    #[serde(deserialize_with = "lenient_id")]
    pub ride_id: Option<String>,
    pub status: Option<String>,
    #[serde(deserialize_with = "lenient_id")]
    pub driver_id: Option<String>,
    pub driver_name: Option<String>,
    pub driver_mobile: Option<String>,
    pub vehicle_type: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub driver_lat: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub driver_lng: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub distance: Option<f64>,
    pub travel_time: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub charge: Option<f64>,
}

impl RideStatusPayload {
    /// View the driver fields of a status payload as an acceptance.
    pub fn as_acceptance(&self) -> AcceptancePayload {
        AcceptancePayload {
            ride_id: self.ride_id.clone(),
            driver_id: self.driver_id.clone(),
            driver_name: self.driver_name.clone(),
            driver_mobile: self.driver_mobile.clone(),
            vehicle_type: self.vehicle_type.clone(),
            driver_lat: self.driver_lat,
            driver_lng: self.driver_lng,
            target_user_id: None,
            success: None,
        }
    }
}

/// `driverLiveLocationUpdate`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DriverLocationPayload {
    #[serde(deserialize_with = "lenient_id")]
    pub driver_id: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub lat: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub lng: Option<f64>,
    pub status: Option<String>,
}

/// `rideCompleted`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RideCompletedPayload {
    #[serde(deserialize_with = "lenient_id")]
    pub ride_id: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub distance: Option<f64>,
    pub travel_time: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub charge: Option<f64>,
}

/// The `bookRide` acknowledgement and the `rideCreated` push.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookingAckPayload {
    pub success: Option<bool>,
    #[serde(deserialize_with = "lenient_id")]
    pub ride_id: Option<String>,
    #[serde(deserialize_with = "lenient_id")]
    pub otp: Option<String>,
    pub message: Option<String>,
}
