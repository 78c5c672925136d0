//! Property tests for the registry reducer.
//!
//! Commands are reduced directly against a fixed clock; effects are dropped.

#![allow(clippy::unwrap_used)]

use event_registry::{
    AccountId, Amount, DEFAULT_CREATION_FEE, EventIndex, LedgerError, NewEvent, PaidRequest,
    RegistryAction, RegistryEnvironment, RegistryNotification, RegistryReducer, RegistryState,
};
use event_registry_core::reducer::Reducer;
use event_registry_testing::{InMemoryNotificationBus, test_clock};
use proptest::prelude::*;
use std::sync::Arc;

fn env() -> RegistryEnvironment {
    RegistryEnvironment::new(
        Arc::new(test_clock()),
        Arc::new(InMemoryNotificationBus::new()),
        "registry-events",
        DEFAULT_CREATION_FEE,
    )
}

fn reduce(state: &mut RegistryState, action: RegistryAction) -> Result<RegistryNotification, LedgerError> {
    let _effects = RegistryReducer::new().reduce(state, action, &env());
    state.last_outcome.clone().unwrap()
}

fn create(state: &mut RegistryState, fee: Amount, event: NewEvent) -> Result<RegistryNotification, LedgerError> {
    reduce(
        state,
        RegistryAction::CreateEvent(PaidRequest::new(AccountId::new(), fee, event)),
    )
}

fn register(state: &mut RegistryState, index: usize, payment: Amount) -> Result<RegistryNotification, LedgerError> {
    reduce(
        state,
        RegistryAction::RegisterForEvent(PaidRequest::new(
            AccountId::new(),
            payment,
            EventIndex::new(index),
        )),
    )
}

fn ledger_only(state: &RegistryState) -> RegistryState {
    RegistryState {
        last_outcome: None,
        ..state.clone()
    }
}

/// A registration attempt: either the exact price or some other amount
#[derive(Clone, Debug)]
enum Attempt {
    Exact,
    Off(u128),
}

fn attempt() -> impl Strategy<Value = Attempt> {
    prop_oneof![
        3 => Just(Attempt::Exact),
        1 => (1u128..10_000).prop_map(Attempt::Off),
    ]
}

/// A creation request: right or wrong fee, any duration and capacity
fn creation() -> impl Strategy<Value = (bool, u64, u32)> {
    (any::<bool>(), 0u64..100_000, 0u32..6)
}

proptest! {
    /// P1 and P2: at most `max_participants` succeed, every success paid the
    /// price, and every refusal is the first failing rule.
    #[test]
    fn capacity_and_exact_payment_hold(
        max_participants in 1u32..8,
        price in 0u128..1_000,
        attempts in prop::collection::vec(attempt(), 0..40),
    ) {
        let mut state = RegistryState::new(AccountId::new());
        create(
            &mut state,
            DEFAULT_CREATION_FEE,
            NewEvent::new("Prop", Amount::new(price), 3_600, max_participants),
        )
        .unwrap();

        let mut accepted = 0usize;
        for attempt in attempts {
            let payment = match attempt {
                Attempt::Exact => Amount::new(price),
                Attempt::Off(delta) => Amount::new(price + delta),
            };
            let before = ledger_only(&state);
            let outcome = register(&mut state, 0, payment);

            let full = accepted >= max_participants as usize;
            match outcome {
                Ok(_) => {
                    prop_assert!(!full);
                    prop_assert_eq!(payment, Amount::new(price));
                    accepted += 1;
                },
                Err(LedgerError::EventFull { .. }) => {
                    prop_assert!(full);
                    prop_assert_eq!(ledger_only(&state), before);
                },
                Err(LedgerError::WrongPayment { expected, supplied, .. }) => {
                    prop_assert!(!full);
                    prop_assert_eq!(expected, Amount::new(price));
                    prop_assert_ne!(supplied, expected);
                    prop_assert_eq!(ledger_only(&state), before);
                },
                Err(other) => {
                    prop_assert!(false, "unexpected rejection {:?}", other);
                },
            }
        }

        let event = &state.events[0];
        prop_assert_eq!(event.participants.len(), accepted);
        prop_assert!(event.participants.len() <= max_participants as usize);
        prop_assert!(event.participants.iter().all(|r| r.amount_paid == event.price));
        prop_assert_eq!(
            event.collected_funds,
            event.price.checked_mul(accepted as u128).unwrap()
        );
        prop_assert_eq!(state.journal.len(), 1 + accepted);
    }

    /// P3: creation only appends, and the new index is the previous length
    #[test]
    fn creation_is_append_only(requests in prop::collection::vec(creation(), 0..25)) {
        let mut state = RegistryState::new(AccountId::new());

        for (right_fee, duration_seconds, max_participants) in requests {
            let fee = if right_fee { DEFAULT_CREATION_FEE } else { Amount::new(1) };
            let before = state.events.clone();
            let outcome = create(
                &mut state,
                fee,
                NewEvent::new("Prop", Amount::ZERO, duration_seconds, max_participants),
            );

            let valid = right_fee && duration_seconds > 0 && max_participants > 0;
            prop_assert_eq!(outcome.is_ok(), valid);

            if let Ok(RegistryNotification::EventCreated { index, .. }) = outcome {
                prop_assert_eq!(index, EventIndex::new(before.len()));
                prop_assert_eq!(state.events.len(), before.len() + 1);
            } else {
                prop_assert_eq!(state.events.len(), before.len());
            }
            prop_assert_eq!(&state.events[..before.len()], &before[..]);
        }

        prop_assert_eq!(
            state.creation_fee_balance,
            DEFAULT_CREATION_FEE.checked_mul(state.events.len() as u128).unwrap()
        );
        prop_assert_eq!(state.journal.len(), state.events.len());
    }
}
