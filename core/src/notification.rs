//! Notifications emitted by the ledger.
//!
//! A notification is an immutable fact about an accepted command, for
//! example "event 3 was created" or "a participant registered for event 1".
//! Reducers record them; the runtime publishes them after the state change
//! has been committed.
//!
//! Notifications are encoded with `bincode` for the bus. The type identifier
//! carries a version suffix so that listeners can route and evolve schemas.
//!
//! # Example
//!
//! ```
//! use event_registry_core::notification::Notification;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Clone, Debug, Serialize, Deserialize)]
//! enum LedgerNotification {
//!     Opened { index: usize },
//!     Joined { index: usize, who: String },
//! }
//!
//! impl Notification for LedgerNotification {
//!     fn notification_type(&self) -> &'static str {
//!         match self {
//!             LedgerNotification::Opened { .. } => "Opened.v1",
//!             LedgerNotification::Joined { .. } => "Joined.v1",
//!         }
//!     }
//! }
//! ```

use serde::{Serialize, de::DeserializeOwned};
use std::fmt;
use thiserror::Error;

/// Error types for notification encoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotificationError {
    /// Failed to serialize a notification to bytes.
    #[error("Failed to serialize notification: {0}")]
    SerializationError(String),

    /// Failed to deserialize a notification from bytes.
    #[error("Failed to deserialize notification: {0}")]
    DeserializationError(String),
}

/// A fact emitted by the ledger for external observers.
///
/// The type identifier must be stable and versioned, e.g. `"EventCreated.v1"`.
pub trait Notification: Send + Sync + 'static {
    /// Returns the stable type identifier of this notification.
    fn notification_type(&self) -> &'static str;

    /// Serialize this notification to bincode bytes.
    ///
    /// # Errors
    ///
    /// Returns [`NotificationError::SerializationError`] if the value cannot be encoded.
    fn to_bytes(&self) -> Result<Vec<u8>, NotificationError>
    where
        Self: Serialize,
    {
        bincode::serialize(self).map_err(|e| NotificationError::SerializationError(e.to_string()))
    }

    /// Deserialize a notification from bincode bytes.
    ///
    /// # Errors
    ///
    /// Returns [`NotificationError::DeserializationError`] if the bytes are
    /// corrupted or belong to a different notification type.
    fn from_bytes(bytes: &[u8]) -> Result<Self, NotificationError>
    where
        Self: DeserializeOwned + Sized,
    {
        bincode::deserialize(bytes)
            .map_err(|e| NotificationError::DeserializationError(e.to_string()))
    }
}

/// A notification encoded for the bus.
#[derive(Clone, Debug, PartialEq)]
pub struct SerializedNotification {
    /// The notification type identifier (e.g. `"UserRegistered.v1"`).
    pub notification_type: String,

    /// The bincode-encoded payload.
    pub data: Vec<u8>,

    /// Optional routing metadata (e.g. `event_index`, `sequence`).
    pub metadata: Option<serde_json::Value>,
}

impl SerializedNotification {
    /// Create a new serialized notification.
    #[must_use]
    pub const fn new(
        notification_type: String,
        data: Vec<u8>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            notification_type,
            data,
            metadata,
        }
    }

    /// Encode a [`Notification`] together with optional metadata.
    ///
    /// # Errors
    ///
    /// Returns [`NotificationError::SerializationError`] if encoding fails.
    pub fn from_notification<N: Notification + Serialize>(
        notification: &N,
        metadata: Option<serde_json::Value>,
    ) -> Result<Self, NotificationError> {
        Ok(Self {
            notification_type: notification.notification_type().to_string(),
            data: notification.to_bytes()?,
            metadata,
        })
    }

    /// Decode the payload back into a concrete notification type.
    ///
    /// # Errors
    ///
    /// Returns [`NotificationError::DeserializationError`] if decoding fails.
    pub fn decode<N: Notification + DeserializeOwned>(&self) -> Result<N, NotificationError> {
        N::from_bytes(&self.data)
    }
}

impl fmt::Display for SerializedNotification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SerializedNotification {{ type: {}, size: {} bytes }}",
            self.notification_type,
            self.data.len()
        )
    }
}
