//! The registry facade.
//!
//! [`EventRegistry`] wraps the store and turns each call into a command,
//! returning the command's outcome as a plain `Result`. The outcome is read
//! under the same write lock the reducer ran under, so concurrent callers
//! always see the result of their own command.

use crate::aggregates::{RegistryAction, RegistryEnvironment, RegistryReducer};
use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::notifications::RegistryNotification;
use crate::types::{
    AccountId, Amount, Event, EventIndex, EventStatus, NewEvent, PaidRequest, Registration,
    RegistryState,
};
use event_registry_core::environment::{Clock, SystemClock};
use event_registry_core::notification_bus::{NotificationBus, NotificationStream};
use event_registry_runtime::Store;
use std::sync::Arc;
use std::time::Duration;

/// Store type backing the registry
pub type RegistryStore = Store<RegistryState, RegistryAction, RegistryEnvironment, RegistryReducer>;

/// Event registry: create events, register for them, read the ledger.
///
/// Cloning is cheap; clones share one ledger.
#[derive(Clone)]
pub struct EventRegistry {
    store: RegistryStore,
    clock: Arc<dyn Clock>,
    bus: Arc<dyn NotificationBus>,
    config: RegistryConfig,
}

impl EventRegistry {
    /// Create a registry using the system clock
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Config`] if the configuration is invalid.
    pub fn new(
        administrator: AccountId,
        config: RegistryConfig,
        bus: Arc<dyn NotificationBus>,
    ) -> Result<Self, RegistryError> {
        Self::with_clock(administrator, config, Arc::new(SystemClock), bus)
    }

    /// Create a registry with an explicit clock
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Config`] if the configuration is invalid.
    pub fn with_clock(
        administrator: AccountId,
        config: RegistryConfig,
        clock: Arc<dyn Clock>,
        bus: Arc<dyn NotificationBus>,
    ) -> Result<Self, RegistryError> {
        config.validate()?;

        let environment = RegistryEnvironment::new(
            Arc::clone(&clock),
            Arc::clone(&bus),
            config.notification_topic.clone(),
            config.creation_fee,
        );
        let store = Store::with_broadcast_capacity(
            RegistryState::new(administrator),
            RegistryReducer::new(),
            environment,
            config.broadcast_capacity,
        );

        tracing::info!(
            %administrator,
            creation_fee = %config.creation_fee,
            topic = %config.notification_topic,
            "Event registry initialized"
        );

        Ok(Self {
            store,
            clock,
            bus,
            config,
        })
    }

    /// Publish a new event
    ///
    /// `fee` must equal the configured creation fee exactly. Returns the index
    /// of the new event, which is the number of events before the call.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::Rejected`] with `InsufficientFee`, `InvalidDuration`,
    ///   `InvalidCapacity` or `BalanceOverflow`
    /// - [`RegistryError::Store`] if the registry is shutting down
    #[tracing::instrument(skip(self, event), fields(name = %event.name))]
    pub async fn create_event(
        &self,
        organizer: AccountId,
        fee: Amount,
        event: NewEvent,
    ) -> Result<EventIndex, RegistryError> {
        let action = RegistryAction::CreateEvent(PaidRequest::new(organizer, fee, event));
        match self.execute(action).await? {
            RegistryNotification::EventCreated { index, .. } => Ok(index),
            RegistryNotification::UserRegistered { .. } => Err(RegistryError::MissingOutcome),
        }
    }

    /// Register `participant` for an event, paying exactly its price
    ///
    /// # Errors
    ///
    /// - [`RegistryError::Rejected`] with `UnknownEvent`, `EventFull`,
    ///   `WrongPayment`, `EventClosed` or `BalanceOverflow`
    /// - [`RegistryError::Store`] if the registry is shutting down
    #[tracing::instrument(skip(self))]
    pub async fn register_for_event(
        &self,
        participant: AccountId,
        payment: Amount,
        index: EventIndex,
    ) -> Result<Registration, RegistryError> {
        let action = RegistryAction::RegisterForEvent(PaidRequest::new(participant, payment, index));
        self.execute(action)
            .await?
            .registration()
            .ok_or(RegistryError::MissingOutcome)
    }

    /// Send a command and wait for its publication
    async fn execute(&self, action: RegistryAction) -> Result<RegistryNotification, RegistryError> {
        let (outcome, mut handle) = self
            .store
            .send_and_inspect(action, |state| state.last_outcome.clone())
            .await?;

        handle.wait().await;

        match outcome {
            Some(Ok(notification)) => Ok(notification),
            Some(Err(error)) => Err(RegistryError::Rejected(error)),
            None => Err(RegistryError::MissingOutcome),
        }
    }

    /// Number of events created so far
    pub async fn event_count(&self) -> usize {
        self.store.state(RegistryState::event_count).await
    }

    /// Snapshot of one event
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Rejected`] with `UnknownEvent` for an unknown index.
    pub async fn event(&self, index: EventIndex) -> Result<Event, RegistryError> {
        Ok(self
            .store
            .state(|s| s.require_event(index).cloned())
            .await?)
    }

    /// Registrations of one event, in arrival order
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Rejected`] with `UnknownEvent` for an unknown index.
    pub async fn participants(&self, index: EventIndex) -> Result<Vec<Registration>, RegistryError> {
        Ok(self
            .store
            .state(|s| s.require_event(index).map(|e| e.participants.clone()))
            .await?)
    }

    /// Funds collected by one event
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Rejected`] with `UnknownEvent` for an unknown index.
    pub async fn collected_funds(&self, index: EventIndex) -> Result<Amount, RegistryError> {
        Ok(self
            .store
            .state(|s| s.require_event(index).map(|e| e.collected_funds))
            .await?)
    }

    /// Status of one event at the current time
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Rejected`] with `UnknownEvent` for an unknown index.
    pub async fn event_status(&self, index: EventIndex) -> Result<EventStatus, RegistryError> {
        let now = self.clock.now();
        Ok(self
            .store
            .state(|s| s.require_event(index).map(|e| e.status_at(now)))
            .await?)
    }

    /// Creation fees collected so far
    pub async fn creation_fee_balance(&self) -> Amount {
        self.store.state(|s| s.creation_fee_balance).await
    }

    /// Owner of the creation-fee balance
    pub async fn administrator(&self) -> AccountId {
        self.store.state(|s| s.administrator).await
    }

    /// Every notification emitted so far, in order
    pub async fn journal(&self) -> Vec<RegistryNotification> {
        self.store.state(|s| s.journal.clone()).await
    }

    /// Copy of the whole ledger
    pub async fn snapshot(&self) -> RegistryState {
        self.store.state(RegistryState::clone).await
    }

    /// The exact fee required to create an event
    #[must_use]
    pub const fn creation_fee(&self) -> Amount {
        self.config.creation_fee
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Subscribe to notifications published from now on
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Bus`] if the bus refuses the subscription.
    pub async fn subscribe(&self) -> Result<NotificationStream, RegistryError> {
        let topic = self.config.notification_topic.as_str();
        Ok(self.bus.subscribe(&[topic]).await?)
    }

    /// Stop accepting commands and wait for pending publications
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Store`] if publications are still running at `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), RegistryError> {
        Ok(self.store.shutdown(timeout).await?)
    }
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRegistry")
            .field("config", &self.config)
            .field("shutting_down", &self.store.is_shutting_down())
            .finish_non_exhaustive()
    }
}
