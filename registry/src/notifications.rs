//! Notifications emitted by the registry.
//!
//! Each accepted command yields exactly one [`RegistryNotification`]. It is
//! returned to the caller, appended to the ledger journal and published on the
//! notification bus.

use crate::types::{AccountId, Amount, EventIndex, Registration};
use chrono::{DateTime, Utc};
use event_registry_core::notification::{Notification, NotificationError, SerializedNotification};
use serde::{Deserialize, Serialize};

/// A fact about an accepted command
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryNotification {
    /// A new event was published
    EventCreated {
        /// Index assigned to the event
        index: EventIndex,
        /// Display name
        name: String,
        /// Who created it
        organizer: AccountId,
        /// Exact price of one registration
        price: Amount,
        /// Capacity
        max_participants: u32,
        /// Creation time
        created_at: DateTime<Utc>,
        /// Registration deadline
        closes_at: DateTime<Utc>,
        /// Creation fee credited to the administrator balance
        fee_paid: Amount,
    },

    /// A participant registered for an event
    UserRegistered {
        /// The event
        index: EventIndex,
        /// Who registered
        participant: AccountId,
        /// What they paid
        amount_paid: Amount,
        /// When the registration was accepted
        registered_at: DateTime<Utc>,
    },
}

impl RegistryNotification {
    /// The event this notification is about
    #[must_use]
    pub const fn event_index(&self) -> EventIndex {
        match self {
            Self::EventCreated { index, .. } | Self::UserRegistered { index, .. } => *index,
        }
    }

    /// The registration carried by a `UserRegistered` notification
    #[must_use]
    pub fn registration(&self) -> Option<Registration> {
        match self {
            Self::UserRegistered {
                participant,
                amount_paid,
                registered_at,
                ..
            } => Some(Registration {
                participant: *participant,
                amount_paid: *amount_paid,
                registered_at: *registered_at,
            }),
            Self::EventCreated { .. } => None,
        }
    }

    /// Encode for the bus, tagging the event index and journal position
    ///
    /// # Errors
    ///
    /// Returns [`NotificationError::SerializationError`] if encoding fails.
    pub fn to_serialized(&self, sequence: usize) -> Result<SerializedNotification, NotificationError> {
        let metadata = serde_json::json!({
            "event_index": self.event_index().value(),
            "sequence": sequence,
        });
        SerializedNotification::from_notification(self, Some(metadata))
    }
}

impl Notification for RegistryNotification {
    fn notification_type(&self) -> &'static str {
        match self {
            Self::EventCreated { .. } => "EventCreated.v1",
            Self::UserRegistered { .. } => "UserRegistered.v1",
        }
    }
}
