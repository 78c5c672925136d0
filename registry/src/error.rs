//! Error types for the event registry.

use crate::config::ConfigError;
use crate::types::{Amount, EventIndex};
use chrono::{DateTime, Utc};
use event_registry_core::notification_bus::NotificationBusError;
use event_registry_runtime::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why the ledger refused a command
///
/// A refused command leaves the ledger untouched. Every variant is
/// recoverable by resubmitting with corrected input.
#[derive(Error, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerError {
    /// The creation fee did not match the required fee exactly
    #[error("creation fee must be exactly {required}, got {supplied}")]
    InsufficientFee {
        /// Fee the registry charges
        required: Amount,
        /// Fee attached to the request
        supplied: Amount,
    },

    /// No event has this index
    #[error("event {index} does not exist ({event_count} events registered)")]
    UnknownEvent {
        /// Requested index
        index: EventIndex,
        /// Number of events at the time of the request
        event_count: usize,
    },

    /// Every seat is already taken
    #[error("event {index} is full ({max_participants} participants)")]
    EventFull {
        /// The event
        index: EventIndex,
        /// Its capacity
        max_participants: u32,
    },

    /// The payment did not match the event price exactly
    #[error("event {index} costs exactly {expected}, got {supplied}")]
    WrongPayment {
        /// The event
        index: EventIndex,
        /// Its price
        expected: Amount,
        /// Payment attached to the request
        supplied: Amount,
    },

    /// Registration deadline has been reached
    #[error("registration for event {index} closed at {closed_at}")]
    EventClosed {
        /// The event
        index: EventIndex,
        /// Its deadline
        closed_at: DateTime<Utc>,
    },

    /// Duration is zero or too large to compute a deadline
    #[error("invalid event duration: {duration_seconds} seconds")]
    InvalidDuration {
        /// Requested duration
        duration_seconds: u64,
    },

    /// Capacity must allow at least one participant
    #[error("an event needs room for at least one participant")]
    InvalidCapacity,

    /// Crediting the payment would overflow a balance
    #[error("balance overflow")]
    BalanceOverflow,
}

impl LedgerError {
    /// Short stable label, used for the `reason` metric label
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::InsufficientFee { .. } => "insufficient_fee",
            Self::UnknownEvent { .. } => "unknown_event",
            Self::EventFull { .. } => "event_full",
            Self::WrongPayment { .. } => "wrong_payment",
            Self::EventClosed { .. } => "event_closed",
            Self::InvalidDuration { .. } => "invalid_duration",
            Self::InvalidCapacity => "invalid_capacity",
            Self::BalanceOverflow => "balance_overflow",
        }
    }
}

/// Errors returned by the [`EventRegistry`](crate::EventRegistry) facade
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The ledger refused the command
    #[error(transparent)]
    Rejected(#[from] LedgerError),

    /// The store is not accepting commands
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The notification bus refused a subscription
    #[error("notification bus error: {0}")]
    Bus(#[from] NotificationBusError),

    /// The configuration is invalid
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The reducer did not record an outcome matching the command
    #[error("command finished without a matching outcome")]
    MissingOutcome,
}

impl RegistryError {
    /// The ledger rejection, if this error is one
    #[must_use]
    pub const fn ledger_error(&self) -> Option<&LedgerError> {
        match self {
            Self::Rejected(error) => Some(error),
            _ => None,
        }
    }
}
