//! Domain types for the event registry.
//!
//! Value objects (accounts, amounts, indices), the ledger entities (events and
//! their registrations) and the request envelope that pairs a payment with the
//! command it pays for.

use crate::error::LedgerError;
use crate::notifications::RegistryNotification;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Identity of a caller (organizer, participant or administrator)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(Uuid);

impl AccountId {
    /// Creates a new random `AccountId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of an event in the registry, assigned in creation order from 0
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventIndex(usize);

impl EventIndex {
    /// Wraps a raw index
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the raw index
    #[must_use]
    pub const fn value(&self) -> usize {
        self.0
    }
}

impl From<usize> for EventIndex {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

impl fmt::Display for EventIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// Amount Value Object (smallest currency unit)
// ============================================================================

/// Smallest units in one whole currency unit (10^18)
pub const UNITS_PER_WHOLE: u128 = 1_000_000_000_000_000_000;

/// Fixed fee for publishing an event: 0.01 of a whole unit
pub const DEFAULT_CREATION_FEE: Amount = Amount::new(10_000_000_000_000_000);

/// An amount of money in the smallest currency unit
///
/// All arithmetic is checked; the ledger never wraps.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Amount(u128);

impl Amount {
    /// Zero
    pub const ZERO: Self = Self(0);

    /// Creates an amount from smallest units
    #[must_use]
    pub const fn new(units: u128) -> Self {
        Self(units)
    }

    /// Creates an amount from whole currency units, `None` on overflow
    #[must_use]
    pub const fn checked_from_whole(whole: u128) -> Option<Self> {
        match whole.checked_mul(UNITS_PER_WHOLE) {
            Some(units) => Some(Self(units)),
            None => None,
        }
    }

    /// Returns the amount in smallest units
    #[must_use]
    pub const fn units(&self) -> u128 {
        self.0
    }

    /// Adds two amounts with overflow checking
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(sum) => Some(Self(sum)),
            None => None,
        }
    }

    /// Multiplies an amount by a count with overflow checking
    #[must_use]
    pub const fn checked_mul(self, count: u128) -> Option<Self> {
        match self.0.checked_mul(count) {
            Some(product) => Some(Self(product)),
            None => None,
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Requests
// ============================================================================

/// A command together with the payment that accompanies it
///
/// The payment is only moved into the ledger after every rule for the
/// payload has passed, inside the same reducer step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaidRequest<P> {
    /// Who is calling (and paying)
    pub caller: AccountId,
    /// The attached payment
    pub amount: Amount,
    /// What the payment is for
    pub payload: P,
}

impl<P> PaidRequest<P> {
    /// Creates a new paid request
    #[must_use]
    pub const fn new(caller: AccountId, amount: Amount, payload: P) -> Self {
        Self {
            caller,
            amount,
            payload,
        }
    }
}

/// Parameters of a new event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    /// Display name, not required to be unique
    pub name: String,
    /// Exact price of one registration
    pub price: Amount,
    /// Seconds from creation until registration closes
    pub duration_seconds: u64,
    /// Maximum number of registrations
    pub max_participants: u32,
}

impl NewEvent {
    /// Creates the parameters of a new event
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        price: Amount,
        duration_seconds: u64,
        max_participants: u32,
    ) -> Self {
        Self {
            name: name.into(),
            price,
            duration_seconds,
            max_participants,
        }
    }
}

// ============================================================================
// Entities
// ============================================================================

/// A participant's accepted entry into an event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// Who registered
    pub participant: AccountId,
    /// What they paid (always the event price)
    pub amount_paid: Amount,
    /// When the registration was accepted
    pub registered_at: DateTime<Utc>,
}

/// Registration status of an event, derived from capacity and deadline
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventStatus {
    /// Capacity left and the deadline has not been reached
    Open,
    /// Every seat is taken
    Full,
    /// The deadline has been reached (reported even when also full)
    Closed,
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "Open"),
            Self::Full => write!(f, "Full"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

/// A registrable activity
///
/// Everything except `participants` and `collected_funds` is fixed at creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Position in the registry
    pub index: EventIndex,
    /// Display name
    pub name: String,
    /// Exact price of one registration
    pub price: Amount,
    /// When the event was created
    pub created_at: DateTime<Utc>,
    /// Registration is refused from this instant on
    pub closes_at: DateTime<Utc>,
    /// Maximum number of registrations
    pub max_participants: u32,
    /// Who created the event
    pub organizer: AccountId,
    /// Accepted registrations in arrival order
    pub participants: Vec<Registration>,
    /// Sum of all accepted payments
    pub collected_funds: Amount,
}

impl Event {
    /// Number of accepted registrations
    #[must_use]
    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// Whether every seat is taken
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.participant_count() >= self.max_participants as usize
    }

    /// Whether the deadline has been reached at `now`
    #[must_use]
    pub fn is_closed_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.closes_at
    }

    /// Seats still available
    #[must_use]
    pub fn remaining_capacity(&self) -> usize {
        (self.max_participants as usize).saturating_sub(self.participant_count())
    }

    /// Status at `now`; `Closed` wins over `Full`
    #[must_use]
    pub fn status_at(&self, now: DateTime<Utc>) -> EventStatus {
        if self.is_closed_at(now) {
            EventStatus::Closed
        } else if self.is_full() {
            EventStatus::Full
        } else {
            EventStatus::Open
        }
    }
}

// ============================================================================
// Registry State
// ============================================================================

/// The whole ledger
///
/// Owned by a single store; every mutation goes through the reducer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegistryState {
    /// Owner of the creation-fee balance
    pub administrator: AccountId,
    /// All events, append-only, indexed by creation order
    pub events: Vec<Event>,
    /// Creation fees collected so far
    pub creation_fee_balance: Amount,
    /// One notification per accepted command, in acceptance order
    pub journal: Vec<RegistryNotification>,
    /// Outcome of the most recent command
    pub last_outcome: Option<Result<RegistryNotification, LedgerError>>,
}

impl RegistryState {
    /// Creates an empty ledger administered by `administrator`
    #[must_use]
    pub const fn new(administrator: AccountId) -> Self {
        Self {
            administrator,
            events: Vec::new(),
            creation_fee_balance: Amount::ZERO,
            journal: Vec::new(),
            last_outcome: None,
        }
    }

    /// Number of events created so far
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Looks up an event
    #[must_use]
    pub fn event(&self, index: EventIndex) -> Option<&Event> {
        self.events.get(index.value())
    }

    /// Looks up an event or reports it as unknown
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnknownEvent`] if no event has this index.
    pub fn require_event(&self, index: EventIndex) -> Result<&Event, LedgerError> {
        self.event(index).ok_or(LedgerError::UnknownEvent {
            index,
            event_count: self.events.len(),
        })
    }
}
