//! Concurrency tests.
//!
//! Many tasks race for the last seats of one event. The store serializes
//! every command, so exactly `max_participants` registrations win and the
//! rest are refused as full.
//!
//! Run with: `cargo test --test concurrency_test`

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use event_registry::{
    AccountId, Amount, DEFAULT_CREATION_FEE, EventIndex, EventRegistry, LedgerError, NewEvent,
    RegistryConfig, RegistryError,
};
use event_registry_testing::{InMemoryNotificationBus, ManualClock};
use futures::StreamExt;
use std::collections::HashSet;
use std::sync::Arc;

fn registry() -> (EventRegistry, InMemoryNotificationBus) {
    let bus = InMemoryNotificationBus::new();
    let registry = EventRegistry::with_clock(
        AccountId::new(),
        RegistryConfig::default(),
        Arc::new(ManualClock::starting_at_test_epoch()),
        Arc::new(bus.clone()),
    )
    .unwrap();
    (registry, bus)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_registrations_never_exceed_capacity() {
    let (registry, bus) = registry();
    let index = registry
        .create_event(
            AccountId::new(),
            DEFAULT_CREATION_FEE,
            NewEvent::new("Last_Seats", Amount::new(25), 3_600, 10),
        )
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for _ in 0..50 {
        let registry = registry.clone();
        tasks.push(tokio::spawn(async move {
            registry
                .register_for_event(AccountId::new(), Amount::new(25), index)
                .await
        }));
    }

    let mut accepted = Vec::new();
    let mut full = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(registration) => accepted.push(registration),
            Err(RegistryError::Rejected(LedgerError::EventFull { .. })) => full += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(accepted.len(), 10);
    assert_eq!(full, 40);

    let event = registry.event(index).await.unwrap();
    assert_eq!(event.participants.len(), 10);
    assert_eq!(event.collected_funds, Amount::new(250));

    let winners: HashSet<_> = accepted.iter().map(|r| r.participant).collect();
    let recorded: HashSet<_> = event.participants.iter().map(|r| r.participant).collect();
    assert_eq!(winners, recorded);

    // One creation plus ten registrations
    assert_eq!(registry.journal().await.len(), 11);
    assert_eq!(bus.published().len(), 11);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_creations_get_distinct_consecutive_indices() {
    let (registry, _bus) = registry();

    let mut tasks = Vec::new();
    for n in 0..20 {
        let registry = registry.clone();
        tasks.push(tokio::spawn(async move {
            registry
                .create_event(
                    AccountId::new(),
                    DEFAULT_CREATION_FEE,
                    NewEvent::new(format!("Event_{n}"), Amount::ZERO, 60, 1),
                )
                .await
        }));
    }

    let mut indices = Vec::new();
    for task in tasks {
        indices.push(task.await.unwrap().unwrap());
    }
    indices.sort();

    let expected: Vec<EventIndex> = (0..20).map(EventIndex::new).collect();
    assert_eq!(indices, expected);

    let snapshot = registry.snapshot().await;
    for (position, event) in snapshot.events.iter().enumerate() {
        assert_eq!(event.index, EventIndex::new(position));
    }
    assert_eq!(
        snapshot.creation_fee_balance,
        DEFAULT_CREATION_FEE.checked_mul(20).unwrap()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn subscribers_see_concurrent_commands_in_journal_order() {
    let (registry, bus) = registry();
    let mut stream = registry.subscribe().await.unwrap();

    let index = registry
        .create_event(
            AccountId::new(),
            DEFAULT_CREATION_FEE,
            NewEvent::new("Busy_Night", Amount::ZERO, 3_600, 30),
        )
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for _ in 0..30 {
        let registry = registry.clone();
        tasks.push(tokio::spawn(async move {
            registry
                .register_for_event(AccountId::new(), Amount::ZERO, index)
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let journal = registry.journal().await;
    assert_eq!(journal.len(), 31);

    for (sequence, journaled) in journal.iter().enumerate() {
        let received = stream.next().await.unwrap().unwrap();
        assert_eq!(received.metadata.as_ref().unwrap()["sequence"], sequence);
        let decoded: event_registry::RegistryNotification = received.decode().unwrap();
        assert_eq!(&decoded, journaled);
    }
    assert_eq!(bus.published().len(), 31);
}
