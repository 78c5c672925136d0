//! Registry aggregate.
//!
//! Validates paid commands against the ledger and applies the resulting
//! notification. Validation and application happen in one reducer call, under
//! the store's write lock, so a capacity check can never be separated from
//! the append it guards.

use crate::error::LedgerError;
use crate::notifications::RegistryNotification;
use crate::types::{
    Amount, Event, EventIndex, NewEvent, PaidRequest, Registration, RegistryState,
};
use chrono::{DateTime, Utc};
use event_registry_core::{
    SmallVec, effect::Effect, environment::Clock, notification_bus::NotificationBus,
    reducer::Reducer, smallvec,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

// ============================================================================
// Actions
// ============================================================================

/// Actions for the registry aggregate
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum RegistryAction {
    // Commands
    /// Publish a new event, paying the creation fee
    CreateEvent(PaidRequest<NewEvent>),

    /// Register the caller for an event, paying its price
    RegisterForEvent(PaidRequest<EventIndex>),

    // Feedback
    /// Publishing a journaled notification failed
    PublishFailed {
        /// Journal position of the notification
        sequence: usize,
        /// Bus error message
        reason: String,
    },
}

// ============================================================================
// Environment
// ============================================================================

/// Environment dependencies for the registry aggregate
#[derive(Clone)]
pub struct RegistryEnvironment {
    /// Clock for creation times, registration times and deadlines
    pub clock: Arc<dyn Clock>,
    /// Bus notifications are published on
    pub bus: Arc<dyn NotificationBus>,
    /// Topic notifications are published to
    pub topic: String,
    /// Exact fee required to create an event
    pub creation_fee: Amount,
    /// Serializes publication in journal order
    pub publish_order: PublishOrder,
}

impl RegistryEnvironment {
    /// Creates a new `RegistryEnvironment`
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        bus: Arc<dyn NotificationBus>,
        topic: impl Into<String>,
        creation_fee: Amount,
    ) -> Self {
        Self {
            clock,
            bus,
            topic: topic.into(),
            creation_fee,
            publish_order: PublishOrder::new(),
        }
    }
}

/// Hands out publication turns in journal order
///
/// Publish effects run in separate tasks. Each one waits until every earlier
/// journal entry has been handed to the bus, so subscribers receive
/// notifications in `sequence` order. Clones share the same position.
#[derive(Clone, Debug)]
pub struct PublishOrder {
    next: Arc<watch::Sender<usize>>,
}

impl PublishOrder {
    /// Starts at journal position 0
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Starts at `sequence`, for a ledger whose journal already has entries
    #[must_use]
    pub fn starting_at(sequence: usize) -> Self {
        let (next, _) = watch::channel(sequence);
        Self {
            next: Arc::new(next),
        }
    }

    /// Journal position allowed to publish next
    #[must_use]
    pub fn next_sequence(&self) -> usize {
        *self.next.borrow()
    }

    /// Waits until `sequence` may publish
    ///
    /// The turn passes to `sequence + 1` when the returned guard drops.
    pub async fn turn(&self, sequence: usize) -> PublishTurn {
        let mut next = self.next.subscribe();
        // `self` holds the sender, so the channel stays open while waiting
        let _ = next.wait_for(|next| *next >= sequence).await;
        PublishTurn {
            order: self.clone(),
            sequence,
        }
    }
}

impl Default for PublishOrder {
    fn default() -> Self {
        Self::new()
    }
}

/// A publication turn; dropping it lets the next sequence publish
#[derive(Debug)]
pub struct PublishTurn {
    order: PublishOrder,
    sequence: usize,
}

impl Drop for PublishTurn {
    fn drop(&mut self) {
        let done = self.sequence.saturating_add(1);
        self.order.next.send_modify(|next| {
            if *next < done {
                *next = done;
            }
        });
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the registry aggregate
#[derive(Clone, Debug, Default)]
pub struct RegistryReducer;

impl RegistryReducer {
    /// Creates a new `RegistryReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates `CreateEvent`, returning the deadline on success
    fn validate_create_event(
        state: &RegistryState,
        request: &PaidRequest<NewEvent>,
        required_fee: Amount,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, LedgerError> {
        if request.amount != required_fee {
            return Err(LedgerError::InsufficientFee {
                required: required_fee,
                supplied: request.amount,
            });
        }

        let duration_seconds = request.payload.duration_seconds;
        let closes_at = i64::try_from(duration_seconds)
            .ok()
            .filter(|seconds| *seconds > 0)
            .and_then(chrono::Duration::try_seconds)
            .and_then(|duration| now.checked_add_signed(duration))
            .ok_or(LedgerError::InvalidDuration { duration_seconds })?;

        if request.payload.max_participants == 0 {
            return Err(LedgerError::InvalidCapacity);
        }

        if state.creation_fee_balance.checked_add(request.amount).is_none() {
            return Err(LedgerError::BalanceOverflow);
        }

        Ok(closes_at)
    }

    /// Validates `RegisterForEvent`
    ///
    /// Order matters: unknown, full, wrong payment, closed, overflow.
    fn validate_register(
        state: &RegistryState,
        request: &PaidRequest<EventIndex>,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let index = request.payload;
        let event = state.require_event(index)?;

        if event.is_full() {
            return Err(LedgerError::EventFull {
                index,
                max_participants: event.max_participants,
            });
        }

        if request.amount != event.price {
            return Err(LedgerError::WrongPayment {
                index,
                expected: event.price,
                supplied: request.amount,
            });
        }

        if event.is_closed_at(now) {
            return Err(LedgerError::EventClosed {
                index,
                closed_at: event.closes_at,
            });
        }

        if event.collected_funds.checked_add(request.amount).is_none() {
            return Err(LedgerError::BalanceOverflow);
        }

        Ok(())
    }

    /// Applies an accepted notification to the ledger and journals it
    ///
    /// Callers validate first; balances saturate rather than wrap.
    fn apply_notification(state: &mut RegistryState, notification: &RegistryNotification) {
        match notification {
            RegistryNotification::EventCreated {
                index,
                name,
                organizer,
                price,
                max_participants,
                created_at,
                closes_at,
                fee_paid,
            } => {
                state.events.push(Event {
                    index: *index,
                    name: name.clone(),
                    price: *price,
                    created_at: *created_at,
                    closes_at: *closes_at,
                    max_participants: *max_participants,
                    organizer: *organizer,
                    participants: Vec::new(),
                    collected_funds: Amount::ZERO,
                });
                state.creation_fee_balance = state
                    .creation_fee_balance
                    .checked_add(*fee_paid)
                    .unwrap_or(Amount::new(u128::MAX));
            },
            RegistryNotification::UserRegistered {
                index,
                participant,
                amount_paid,
                registered_at,
            } => {
                if let Some(event) = state.events.get_mut(index.value()) {
                    event.participants.push(Registration {
                        participant: *participant,
                        amount_paid: *amount_paid,
                        registered_at: *registered_at,
                    });
                    event.collected_funds = event
                        .collected_funds
                        .checked_add(*amount_paid)
                        .unwrap_or(Amount::new(u128::MAX));
                }
            },
        }

        state.journal.push(notification.clone());
        state.last_outcome = Some(Ok(notification.clone()));
    }

    /// Records a refusal; the ledger itself is untouched
    fn reject(state: &mut RegistryState, error: LedgerError) -> SmallVec<[Effect<RegistryAction>; 4]> {
        tracing::warn!(reason = error.reason(), error = %error, "Command rejected");
        metrics::counter!("registry.commands.rejected", "reason" => error.reason()).increment(1);
        state.last_outcome = Some(Err(error));
        SmallVec::new()
    }

    /// Creates the effect publishing the notification at journal position `sequence`
    ///
    /// The effect waits for its turn, so notifications reach the bus in journal
    /// order even when commands complete concurrently.
    fn publish_effects(
        notification: &RegistryNotification,
        sequence: usize,
        env: &RegistryEnvironment,
    ) -> SmallVec<[Effect<RegistryAction>; 4]> {
        let notification = notification.clone();
        let bus = Arc::clone(&env.bus);
        let topic = env.topic.clone();
        let order = env.publish_order.clone();

        smallvec![Effect::Future(Box::pin(async move {
            let _turn = order.turn(sequence).await;

            let serialized = match notification.to_serialized(sequence) {
                Ok(serialized) => serialized,
                Err(error) => {
                    return Some(RegistryAction::PublishFailed {
                        sequence,
                        reason: error.to_string(),
                    });
                },
            };

            match bus.publish(&topic, &serialized).await {
                Ok(()) => None,
                Err(error) => Some(RegistryAction::PublishFailed {
                    sequence,
                    reason: error.to_string(),
                }),
            }
        }))]
    }

    /// Applies an accepted notification and describes its publication
    fn accept(
        state: &mut RegistryState,
        notification: RegistryNotification,
        env: &RegistryEnvironment,
    ) -> SmallVec<[Effect<RegistryAction>; 4]> {
        let sequence = state.journal.len();
        Self::apply_notification(state, &notification);
        Self::publish_effects(&notification, sequence, env)
    }
}

impl Reducer for RegistryReducer {
    type State = RegistryState;
    type Action = RegistryAction;
    type Environment = RegistryEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            RegistryAction::CreateEvent(request) => {
                let now = env.clock.now();
                let closes_at =
                    match Self::validate_create_event(state, &request, env.creation_fee, now) {
                        Ok(closes_at) => closes_at,
                        Err(error) => return Self::reject(state, error),
                    };

                let index = EventIndex::new(state.events.len());
                let PaidRequest {
                    caller,
                    amount,
                    payload,
                } = request;

                tracing::debug!(%index, organizer = %caller, name = %payload.name, "Event created");
                metrics::counter!("registry.events.created").increment(1);

                let notification = RegistryNotification::EventCreated {
                    index,
                    name: payload.name,
                    organizer: caller,
                    price: payload.price,
                    max_participants: payload.max_participants,
                    created_at: now,
                    closes_at,
                    fee_paid: amount,
                };
                Self::accept(state, notification, env)
            },

            RegistryAction::RegisterForEvent(request) => {
                let now = env.clock.now();
                if let Err(error) = Self::validate_register(state, &request, now) {
                    return Self::reject(state, error);
                }

                tracing::debug!(index = %request.payload, participant = %request.caller, "Participant registered");
                metrics::counter!("registry.registrations.accepted").increment(1);

                let notification = RegistryNotification::UserRegistered {
                    index: request.payload,
                    participant: request.caller,
                    amount_paid: request.amount,
                    registered_at: now,
                };
                Self::accept(state, notification, env)
            },

            RegistryAction::PublishFailed { sequence, reason } => {
                tracing::warn!(sequence, reason = %reason, "Notification publish failed");
                metrics::counter!("registry.notifications.publish_failed").increment(1);
                SmallVec::new()
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::types::{AccountId, DEFAULT_CREATION_FEE, EventStatus};
    use event_registry_testing::{
        InMemoryNotificationBus, ReducerTest, assertions, test_clock, test_epoch,
    };

    fn test_env() -> RegistryEnvironment {
        RegistryEnvironment::new(
            Arc::new(test_clock()),
            Arc::new(InMemoryNotificationBus::new()),
            "registry-events",
            DEFAULT_CREATION_FEE,
        )
    }

    fn create(name: &str, price: Amount, duration_seconds: u64, max_participants: u32) -> RegistryAction {
        RegistryAction::CreateEvent(PaidRequest::new(
            AccountId::new(),
            DEFAULT_CREATION_FEE,
            NewEvent::new(name, price, duration_seconds, max_participants),
        ))
    }

    fn register(index: usize, amount: Amount) -> RegistryAction {
        RegistryAction::RegisterForEvent(PaidRequest::new(
            AccountId::new(),
            amount,
            EventIndex::new(index),
        ))
    }

    fn one_whole() -> Amount {
        Amount::checked_from_whole(1).unwrap()
    }

    fn rejection(state: &RegistryState) -> LedgerError {
        match state.last_outcome.clone() {
            Some(Err(error)) => error,
            other => panic!("expected a rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn publish_turns_follow_sequence_order() {
        let order = PublishOrder::new();
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));

        let mut tasks = Vec::new();
        for sequence in (0..5).rev() {
            let order = order.clone();
            let log = Arc::clone(&log);
            tasks.push(tokio::spawn(async move {
                let _turn = order.turn(sequence).await;
                log.lock().unwrap().push(sequence);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(order.next_sequence(), 5);
    }

    #[test]
    fn resumed_order_starts_past_existing_entries() {
        let order = PublishOrder::starting_at(3);
        assert_eq!(order.next_sequence(), 3);
    }

    #[test]
    fn create_event_appends_and_credits_fee() {
        ReducerTest::new(RegistryReducer::new())
            .with_env(test_env())
            .given_state(RegistryState::new(AccountId::new()))
            .when_action(create("Tennis_Practice", Amount::ZERO, 10_800, 4))
            .then_state(|state| {
                assert_eq!(state.events.len(), 1);
                let event = &state.events[0];
                assert_eq!(event.index, EventIndex::new(0));
                assert_eq!(event.closes_at, test_epoch() + chrono::Duration::seconds(10_800));
                assert_eq!(event.status_at(test_epoch()), EventStatus::Open);
                assert_eq!(state.creation_fee_balance, DEFAULT_CREATION_FEE);
                assert_eq!(state.journal.len(), 1);
                assert!(matches!(
                    state.last_outcome,
                    Some(Ok(RegistryNotification::EventCreated { .. }))
                ));
            })
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
                assertions::assert_has_future_effect(effects);
            })
            .run();
    }

    #[test]
    fn second_event_gets_next_index() {
        ReducerTest::new(RegistryReducer::new())
            .with_env(test_env())
            .given_state(RegistryState::new(AccountId::new()))
            .given_actions(vec![create("Tennis_Practice", Amount::ZERO, 10_800, 4)])
            .when_action(create("Concert_Tickets", one_whole(), 172_800, 10))
            .then_state(|state| {
                assert_eq!(state.events[1].index, EventIndex::new(1));
                assert_eq!(state.events[0].name, "Tennis_Practice");
                assert_eq!(
                    state.creation_fee_balance,
                    DEFAULT_CREATION_FEE.checked_mul(2).unwrap()
                );
            })
            .run();
    }

    #[test]
    fn wrong_creation_fee_is_rejected_both_ways() {
        for supplied in [Amount::ZERO, Amount::new(DEFAULT_CREATION_FEE.units() + 1)] {
            ReducerTest::new(RegistryReducer::new())
                .with_env(test_env())
                .given_state(RegistryState::new(AccountId::new()))
                .when_action(RegistryAction::CreateEvent(PaidRequest::new(
                    AccountId::new(),
                    supplied,
                    NewEvent::new("Tennis_Practice", Amount::ZERO, 10_800, 4),
                )))
                .then_state(move |state| {
                    assert!(state.events.is_empty());
                    assert!(state.journal.is_empty());
                    assert_eq!(state.creation_fee_balance, Amount::ZERO);
                    assert_eq!(
                        rejection(state),
                        LedgerError::InsufficientFee {
                            required: DEFAULT_CREATION_FEE,
                            supplied,
                        }
                    );
                })
                .then_effects(assertions::assert_no_effects)
                .run();
        }
    }

    #[test]
    fn zero_or_unrepresentable_duration_is_rejected() {
        for duration_seconds in [0, u64::MAX] {
            ReducerTest::new(RegistryReducer::new())
                .with_env(test_env())
                .given_state(RegistryState::new(AccountId::new()))
                .when_action(create("Never", Amount::ZERO, duration_seconds, 4))
                .then_state(move |state| {
                    assert!(state.events.is_empty());
                    assert_eq!(rejection(state), LedgerError::InvalidDuration { duration_seconds });
                })
                .run();
        }
    }

    #[test]
    fn zero_capacity_is_rejected_after_duration() {
        ReducerTest::new(RegistryReducer::new())
            .with_env(test_env())
            .given_state(RegistryState::new(AccountId::new()))
            .when_action(create("Nobody", Amount::ZERO, 60, 0))
            .then_state(|state| {
                assert!(state.events.is_empty());
                assert_eq!(rejection(state), LedgerError::InvalidCapacity);
            })
            .run();
    }

    #[test]
    fn registration_appends_and_collects_payment() {
        ReducerTest::new(RegistryReducer::new())
            .with_env(test_env())
            .given_state(RegistryState::new(AccountId::new()))
            .given_actions(vec![
                create("Tennis_Practice", Amount::ZERO, 10_800, 4),
                create("Concert_Tickets", one_whole(), 172_800, 10),
            ])
            .when_action(register(1, one_whole()))
            .then_state(|state| {
                let concert = &state.events[1];
                assert_eq!(concert.participants.len(), 1);
                assert_eq!(concert.participants[0].amount_paid, one_whole());
                assert_eq!(concert.participants[0].registered_at, test_epoch());
                assert_eq!(concert.collected_funds, one_whole());
                assert_eq!(state.journal.len(), 3);
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn unknown_event_is_rejected() {
        ReducerTest::new(RegistryReducer::new())
            .with_env(test_env())
            .given_state(RegistryState::new(AccountId::new()))
            .given_actions(vec![create("Tennis_Practice", Amount::ZERO, 10_800, 4)])
            .when_action(register(1, Amount::ZERO))
            .then_state(|state| {
                assert_eq!(
                    rejection(state),
                    LedgerError::UnknownEvent {
                        index: EventIndex::new(1),
                        event_count: 1,
                    }
                );
                assert_eq!(state.journal.len(), 1);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn wrong_payment_leaves_event_untouched() {
        ReducerTest::new(RegistryReducer::new())
            .with_env(test_env())
            .given_state(RegistryState::new(AccountId::new()))
            .given_actions(vec![
                create("Concert_Tickets", one_whole(), 172_800, 10),
                register(0, one_whole()),
            ])
            .when_action(register(0, Amount::new(500)))
            .then_state(|state| {
                assert_eq!(
                    rejection(state),
                    LedgerError::WrongPayment {
                        index: EventIndex::new(0),
                        expected: one_whole(),
                        supplied: Amount::new(500),
                    }
                );
                assert_eq!(state.events[0].participants.len(), 1);
                assert_eq!(state.events[0].collected_funds, one_whole());
                assert_eq!(state.journal.len(), 2);
            })
            .run();
    }

    #[test]
    fn full_is_reported_before_wrong_payment() {
        ReducerTest::new(RegistryReducer::new())
            .with_env(test_env())
            .given_state(RegistryState::new(AccountId::new()))
            .given_actions(vec![
                create("Solo", Amount::new(10), 60, 1),
                register(0, Amount::new(10)),
            ])
            .when_action(register(0, Amount::new(3)))
            .then_state(|state| {
                assert_eq!(
                    rejection(state),
                    LedgerError::EventFull {
                        index: EventIndex::new(0),
                        max_participants: 1,
                    }
                );
            })
            .run();
    }

    #[test]
    fn registration_at_the_deadline_is_rejected() {
        let mut state = RegistryState::new(AccountId::new());
        let reducer = RegistryReducer::new();
        let _ = reducer.reduce(&mut state, create("Sprint", Amount::ZERO, 60, 4), &test_env());

        let closes_at = state.events[0].closes_at;
        let at_deadline = RegistryEnvironment {
            clock: Arc::new(event_registry_testing::FixedClock::new(closes_at)),
            ..test_env()
        };

        let effects = reducer.reduce(&mut state, register(0, Amount::ZERO), &at_deadline);
        assertions::assert_no_effects(&effects);
        assert_eq!(
            rejection(&state),
            LedgerError::EventClosed {
                index: EventIndex::new(0),
                closed_at: closes_at,
            }
        );
        assert!(state.events[0].participants.is_empty());
    }

    #[test]
    fn funds_overflow_is_rejected() {
        let huge = Amount::new(u128::MAX);
        ReducerTest::new(RegistryReducer::new())
            .with_env(test_env())
            .given_state(RegistryState::new(AccountId::new()))
            .given_actions(vec![create("Priceless", huge, 60, 2), register(0, huge)])
            .when_action(register(0, huge))
            .then_state(move |state| {
                assert_eq!(rejection(state), LedgerError::BalanceOverflow);
                assert_eq!(state.events[0].participants.len(), 1);
                assert_eq!(state.events[0].collected_funds, huge);
            })
            .run();
    }

    #[test]
    fn publish_failure_does_not_touch_the_ledger() {
        ReducerTest::new(RegistryReducer::new())
            .with_env(test_env())
            .given_state(RegistryState::new(AccountId::new()))
            .given_actions(vec![create("Tennis_Practice", Amount::ZERO, 10_800, 4)])
            .when_action(RegistryAction::PublishFailed {
                sequence: 0,
                reason: "broker down".to_string(),
            })
            .then_state(|state| {
                assert_eq!(state.events.len(), 1);
                assert_eq!(state.journal.len(), 1);
                assert!(matches!(state.last_outcome, Some(Ok(_))));
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }
}
