//! Aggregate reducers for the event registry.
//!
//! The registry is a single aggregate: one ledger holding every event.

pub mod registry;

pub use registry::{RegistryAction, RegistryEnvironment, RegistryReducer};
