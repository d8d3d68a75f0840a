//! Async rider client around the `ride_core` state machine.
//!
//! The runtime owns the live ride session, drives the lifecycle timers and
//! talks to dispatch, pricing and durable storage through the collaborator
//! traits in [`adapters`].

pub mod adapters;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod persisted;
pub mod runtime;
pub mod timers;
pub mod wire;

pub use adapters::pricing::{PriceEstimator, QuoteRequest};
pub use adapters::store::{JsonFileStore, KeyValueStore, MemoryStore};
pub use adapters::transport::{Transport, TransportEvent, TransportSink};
pub use config::{ClientConfig, PricingStrategy};
pub use error::{BookingError, ClientClosed, PricingError, StoreError, TransportError};
pub use runtime::{
    BookingConfirmation, BookingRequest, ClientHandle, Place, RideClient, RideClientBuilder,
};
