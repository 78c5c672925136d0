//! Notification bus abstraction.
//!
//! The ledger never talks to listeners directly. Accepted commands produce
//! notifications, and the runtime hands them to a [`NotificationBus`] once the
//! state change has been committed:
//!
//! ```text
//! ┌─────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │   Command   │────▶│     Reducer     │────▶│  Journal append  │
//! └─────────────┘     └────────┬────────┘     └──────────────────┘
//!                              │ Effect::Future
//!                              ▼
//!                     ┌─────────────────┐
//!                     │ NotificationBus │────▶ listeners
//!                     └─────────────────┘
//! ```
//!
//! Publishing runs in its own task after the reducer returns, so a slow or
//! failing bus never blocks or rolls back the ledger. The journal kept in state is the
//! source of truth; the bus is best-effort delivery.
//!
//! # Implementations
//!
//! - `InMemoryNotificationBus` in `event-registry-testing` (broadcast based,
//!   records everything it publishes)

use crate::notification::SerializedNotification;
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during bus operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotificationBusError {
    /// Failed to publish a notification to a topic
    #[error("Publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// The topic that failed
        topic: String,
        /// The reason for failure
        reason: String,
    },

    /// Failed to subscribe to topics
    #[error("Subscription failed for topics {topics:?}: {reason}")]
    SubscriptionFailed {
        /// The topics that failed to subscribe
        topics: Vec<String>,
        /// The reason for failure
        reason: String,
    },

    /// A subscriber fell behind and notifications were dropped
    #[error("Subscriber lagged, {0} notifications dropped")]
    Lagged(u64),
}

/// Stream of notifications from a subscription.
pub type NotificationStream =
    Pin<Box<dyn Stream<Item = Result<SerializedNotification, NotificationBusError>> + Send>>;

/// Publish/subscribe transport for ledger notifications.
///
/// Uses explicit `Pin<Box<dyn Future>>` returns so that reducers can capture
/// an `Arc<dyn NotificationBus>` inside effects.
pub trait NotificationBus: Send + Sync {
    /// Publish a notification to a topic.
    ///
    /// # Errors
    ///
    /// Returns [`NotificationBusError::PublishFailed`] if the transport rejects it.
    fn publish(
        &self,
        topic: &str,
        notification: &SerializedNotification,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotificationBusError>> + Send + '_>>;

    /// Subscribe to one or more topics.
    ///
    /// # Errors
    ///
    /// Returns [`NotificationBusError::SubscriptionFailed`] if the subscription
    /// cannot be established.
    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<NotificationStream, NotificationBusError>> + Send + '_>>;
}
