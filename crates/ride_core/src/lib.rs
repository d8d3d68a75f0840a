//! Ride lifecycle domain: session model, reconciliation of redundant driver
//! signals, and the pure state machine that owns every ride transition.
//!
//! Nothing in this crate performs I/O. Callers feed [`reconciler::RawEvent`]s
//! through [`reconciler::RideAcceptanceReconciler`], apply the resulting
//! [`event::RideEvent`] with [`machine::RideStateMachine::transition`], and
//! carry out the returned [`event::Effect`]s.

pub mod arrival;
pub mod event;
pub mod geo;
pub mod machine;
pub mod otp;
pub mod pricing;
pub mod reconciler;
pub mod session;
pub mod signal;
pub mod track;
