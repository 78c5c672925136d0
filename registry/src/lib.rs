//! Event Registry - a paid registration ledger
//!
//! Organizers publish events with a price, a participant cap and a closing
//! deadline, paying a fixed creation fee. Participants register by paying
//! exactly the event's price. The registry enforces capacity, exact payment
//! and the deadline, and emits one notification per accepted command.
//!
//! # Architecture
//!
//! ```text
//!   create_event / register_for_event
//!                 │
//!                 ▼
//!        ┌─────────────────┐   PaidRequest { caller, amount, payload }
//!        │  EventRegistry  │
//!        └────────┬────────┘
//!                 │ send_and_inspect (write lock)
//!                 ▼
//!        ┌─────────────────┐   validate → apply → journal
//!        │ RegistryReducer │
//!        └────────┬────────┘
//!                 │ Effect::Future (lock released)
//!                 ▼
//!        ┌─────────────────┐
//!        │ NotificationBus │──▶ subscribers
//!        └─────────────────┘
//! ```
//!
//! # Rules
//!
//! Creating an event checks, in order: exact creation fee, a positive
//! representable duration, a positive capacity. Registering checks, in
//! order: the event exists, it is not full, the payment equals the price,
//! the deadline has not been reached. The first failing rule is reported and
//! nothing changes.
//!
//! # Example
//!
//! ```ignore
//! let registry = EventRegistry::new(admin, RegistryConfig::from_env(), bus)?;
//!
//! let tennis = registry
//!     .create_event(alice, registry.creation_fee(), NewEvent::new("Tennis_Practice", Amount::ZERO, 10_800, 4))
//!     .await?;
//!
//! registry.register_for_event(bob, Amount::ZERO, tennis).await?;
//! assert_eq!(registry.participants(tennis).await?.len(), 1);
//! ```

pub mod aggregates;
pub mod app;
pub mod config;
pub mod error;
pub mod metrics;
pub mod notifications;
pub mod types;

pub use aggregates::{RegistryAction, RegistryEnvironment, RegistryReducer};
pub use app::{EventRegistry, RegistryStore};
pub use config::{ConfigError, RegistryConfig};
pub use error::{LedgerError, RegistryError};
pub use notifications::RegistryNotification;
pub use types::{
    AccountId, Amount, DEFAULT_CREATION_FEE, Event, EventIndex, EventStatus, NewEvent,
    PaidRequest, Registration, RegistryState, UNITS_PER_WHOLE,
};
