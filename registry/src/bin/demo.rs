//! Event Registry Demo
//!
//! Replays a short session against an in-process registry:
//! - A free tennis practice (3 hours, 4 places) and a paid concert (2 days, 10 places)
//! - One correct and one wrong payment for the concert
//! - Five registrations for the tennis practice, the fifth refused as full
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --bin registry-demo
//! ```

use event_registry::{
    AccountId, Amount, EventIndex, EventRegistry, NewEvent, RegistryConfig, RegistryError,
    metrics::register_registry_metrics,
};
use event_registry_testing::InMemoryNotificationBus;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let config = RegistryConfig::from_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    register_registry_metrics();

    let bus = Arc::new(InMemoryNotificationBus::new());
    let administrator = AccountId::new();
    let registry = EventRegistry::new(administrator, config, bus.clone())?;

    // Print every published notification as it arrives
    let mut notifications = registry.subscribe().await?;
    let listener = tokio::spawn(async move {
        while let Some(Ok(notification)) = notifications.next().await {
            tracing::info!(%notification, metadata = ?notification.metadata, "Published");
        }
    });

    let alice = AccountId::new();
    let bob = AccountId::new();
    let jack = AccountId::new();
    let julia = AccountId::new();
    let lisa = AccountId::new();
    let fee = registry.creation_fee();

    // ========== Events ==========

    let tennis = registry
        .create_event(alice, fee, NewEvent::new("Tennis_Practice", Amount::ZERO, 10_800, 4))
        .await?;
    tracing::info!(%tennis, "Tennis_Practice created by alice");

    let one_whole = Amount::checked_from_whole(1).ok_or("amount overflow")?;
    let concert = registry
        .create_event(bob, fee, NewEvent::new("Concert_Tickets", one_whole, 172_800, 10))
        .await?;
    tracing::info!(%concert, "Concert_Tickets created by bob");

    // ========== Concert payments ==========

    registry.register_for_event(alice, one_whole, concert).await?;
    tracing::info!("alice paid the exact price for the concert");

    report(
        "jack pays 500 for the concert",
        registry.register_for_event(jack, Amount::new(500), concert).await,
    );

    // ========== Tennis capacity ==========

    let players = [
        ("alice", alice),
        ("bob", bob),
        ("jack", jack),
        ("julia", julia),
        ("lisa", lisa),
    ];
    for (name, participant) in players {
        report(
            &format!("{name} registers for tennis"),
            registry.register_for_event(participant, Amount::ZERO, tennis).await,
        );
    }

    // ========== Summary ==========

    for index in [tennis, concert] {
        summarize(&registry, index).await?;
    }
    let balance = registry.creation_fee_balance().await;
    let journal = registry.journal().await;
    tracing::info!(
        %balance,
        journal = journal.len(),
        published = bus.published().len(),
        "Registry totals"
    );

    registry.shutdown(Duration::from_secs(5)).await?;
    listener.abort();

    Ok(())
}

fn report<T>(what: &str, result: Result<T, RegistryError>) {
    match result {
        Ok(_) => tracing::info!("{what}: accepted"),
        Err(error) => tracing::warn!("{what}: refused ({error})"),
    }
}

async fn summarize(registry: &EventRegistry, index: EventIndex) -> Result<(), RegistryError> {
    let event = registry.event(index).await?;
    let status = registry.event_status(index).await?;
    tracing::info!(
        %index,
        name = %event.name,
        participants = event.participant_count(),
        max_participants = event.max_participants,
        seats_left = event.remaining_capacity(),
        collected = %event.collected_funds,
        %status,
        "Event summary"
    );
    Ok(())
}
