//! # Event Registry Testing
//!
//! Testing utilities for the event registry crates.
//!
//! This crate provides:
//! - Deterministic clocks ([`FixedClock`], [`ManualClock`])
//! - An in-memory [`NotificationBus`](event_registry_core::notification_bus::NotificationBus)
//! - A Given-When-Then harness for reducers ([`ReducerTest`])
//!
//! ## Example
//!
//! ```ignore
//! use event_registry_testing::{ManualClock, mocks::InMemoryNotificationBus};
//!
//! #[tokio::test]
//! async fn registration_closes_after_deadline() {
//!     let clock = ManualClock::starting_at_test_epoch();
//!     let bus = InMemoryNotificationBus::new();
//!     let registry =
//!         EventRegistry::with_clock(admin, config, Arc::new(clock.clone()), Arc::new(bus.clone()))?;
//!
//!     let index = registry.create_event(organizer, fee, new_event).await?;
//!     clock.advance(chrono::Duration::seconds(3601));
//!
//!     assert!(registry.register_for_event(alice, price, index).await.is_err());
//!     assert_eq!(bus.published().len(), 1);
//! }
//! ```

use chrono::{DateTime, Utc};
use event_registry_core::environment::Clock;


pub use reducer_test::{ReducerTest, assertions};

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use event_registry_core::notification::SerializedNotification;
    use event_registry_core::notification_bus::{
        NotificationBus, NotificationBusError, NotificationStream,
    };
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex, PoisonError};
    use tokio::sync::broadcast;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use event_registry_testing::mocks::FixedClock;
    /// use event_registry_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when a test tells it to
    ///
    /// Clones share the same time, so a test can keep one handle and inject
    /// another into the environment.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Create a manual clock starting at `time`
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Create a manual clock starting at the shared test epoch
        #[must_use]
        pub fn starting_at_test_epoch() -> Self {
            Self::new(test_epoch())
        }

        /// Move the clock forward
        pub fn advance(&self, by: chrono::Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }

        /// Jump to an absolute time
        pub fn set(&self, to: DateTime<Utc>) {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner) = to;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// 2025-01-01 00:00:00 UTC
    #[must_use]
    pub fn test_epoch() -> DateTime<Utc> {
        DateTime::from_timestamp(1_735_689_600, 0).unwrap_or(DateTime::UNIX_EPOCH)
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(test_epoch())
    }

    /// In-memory notification bus
    ///
    /// Records every published notification in order and fans them out to
    /// subscribers through a broadcast channel. Publishing can be switched to
    /// fail so tests can check that the ledger does not depend on delivery.
    #[derive(Clone)]
    pub struct InMemoryNotificationBus {
        published: Arc<Mutex<Vec<(String, SerializedNotification)>>>,
        sender: broadcast::Sender<(String, SerializedNotification)>,
        failing: Arc<AtomicBool>,
    }

    impl InMemoryNotificationBus {
        /// Create a new bus with room for 256 undelivered notifications per subscriber
        #[must_use]
        pub fn new() -> Self {
            let (sender, _) = broadcast::channel(256);
            Self {
                published: Arc::new(Mutex::new(Vec::new())),
                sender,
                failing: Arc::new(AtomicBool::new(false)),
            }
        }

        /// All notifications published so far, with their topic
        #[must_use]
        pub fn published(&self) -> Vec<(String, SerializedNotification)> {
            self.published
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Notification type identifiers published so far, in order
        #[must_use]
        pub fn published_types(&self) -> Vec<String> {
            self.published()
                .into_iter()
                .map(|(_, n)| n.notification_type)
                .collect()
        }

        /// Make subsequent publishes fail (or succeed again)
        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }
    }

    impl Default for InMemoryNotificationBus {
        fn default() -> Self {
            Self::new()
        }
    }

    impl std::fmt::Debug for InMemoryNotificationBus {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("InMemoryNotificationBus")
                .field("published", &self.published().len())
                .field("subscribers", &self.sender.receiver_count())
                .finish_non_exhaustive()
        }
    }

    impl NotificationBus for InMemoryNotificationBus {
        fn publish(
            &self,
            topic: &str,
            notification: &SerializedNotification,
        ) -> Pin<Box<dyn Future<Output = Result<(), NotificationBusError>> + Send + '_>> {
            let topic = topic.to_string();
            let notification = notification.clone();

            Box::pin(async move {
                if self.failing.load(Ordering::SeqCst) {
                    return Err(NotificationBusError::PublishFailed {
                        topic,
                        reason: "bus configured to fail".to_string(),
                    });
                }

                self.published
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push((topic.clone(), notification.clone()));

                // No subscribers is not an error
                let _ = self.sender.send((topic, notification));
                Ok(())
            })
        }

        fn subscribe(
            &self,
            topics: &[&str],
        ) -> Pin<Box<dyn Future<Output = Result<NotificationStream, NotificationBusError>> + Send + '_>>
        {
            let topics: Vec<String> = topics.iter().map(|t| (*t).to_string()).collect();
            let mut rx = self.sender.subscribe();

            Box::pin(async move {
                if topics.is_empty() {
                    return Err(NotificationBusError::SubscriptionFailed {
                        topics,
                        reason: "no topics given".to_string(),
                    });
                }

                let stream = async_stream::stream! {
                    loop {
                        match rx.recv().await {
                            Ok((topic, notification)) => {
                                if topics.contains(&topic) {
                                    yield Ok(notification);
                                }
                            },
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                yield Err(NotificationBusError::Lagged(skipped));
                            },
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                };

                Ok(Box::pin(stream) as NotificationStream)
            })
        }
    }
}

/// Install a `tracing` subscriber for tests
///
/// Honors `RUST_LOG` and writes through the test harness' captured output.
/// Safe to call from every test; only the first call installs anything.
pub fn init_test_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{FixedClock, InMemoryNotificationBus, ManualClock, test_clock, test_epoch};
