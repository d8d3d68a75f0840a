//! Collaborator traits the client runtime talks through, with the adapters
//! shipped in this crate.

pub mod pricing;
pub mod store;
pub mod transport;
