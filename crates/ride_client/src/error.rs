//! Error types for the ride client runtime.
//!
//! Only booking and quoting surface these to callers; everything else is
//! logged at the point of failure and the session stays as it was.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store file {path} could not be read: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store file {path} could not be written: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store file {path} is not a JSON object: {details}")]
    Malformed { path: PathBuf, details: String },

    #[error("persisted value for {key} could not be encoded: {source}")]
    Encode {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("transport is disconnected")]
    Disconnected,

    #[error("no acknowledgement for {event} within {timeout_ms} ms")]
    AckTimeout { event: String, timeout_ms: u64 },

    #[error("transport failure: {0}")]
    Other(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PricingError {
    #[error("trip distance is unknown; both endpoints must be routed first")]
    MissingDistance,

    #[error("price backend request failed: {0}")]
    Backend(#[from] reqwest::Error),

    #[error("price backend declined the quote: {0}")]
    Declined(String),

    #[error("price backend returned an invalid price")]
    InvalidPrice,
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("a ride is already {0}; finish or cancel it first")]
    RideActive(ride_core::session::RideStatus),

    #[error("a booking is already being submitted")]
    InFlight,

    #[error("price lookup failed: {0}")]
    Pricing(#[from] PricingError),

    #[error("booking rejected: {0}")]
    Rejected(String),

    #[error("booking could not be sent: {0}")]
    Transport(#[from] TransportError),

    #[error("booking was cancelled before it was submitted")]
    Cancelled,

    #[error("ride client has shut down")]
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("unknown transport event {0}")]
    UnknownEvent(String),

    #[error("payload for {event} is malformed: {source}")]
    Payload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be a number, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{name} must be positive, got {value}")]
    NotPositive { name: &'static str, value: f64 },
}

/// The client task has stopped and no longer accepts input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("ride client has shut down")]
pub struct ClientClosed;

impl From<ClientClosed> for BookingError {
    fn from(_: ClientClosed) -> Self {
        BookingError::Closed
    }
}
