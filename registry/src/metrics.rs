//! Metric descriptions for the registry.
//!
//! No exporter is installed here; whoever embeds the registry chooses one.
//!
//! ## Counters
//! - `registry.events.created` - Events accepted
//! - `registry.registrations.accepted` - Registrations accepted
//! - `registry.commands.rejected{reason}` - Refused commands by [`LedgerError::reason`](crate::LedgerError::reason)
//! - `registry.notifications.publish_failed` - Notifications the bus did not take
//! - `store.commands.total` - Actions sent to the store
//! - `store.shutdown.rejected_actions` - Actions refused during shutdown
//!
//! ## Histograms
//! - `store.reducer.duration_seconds` - Time spent inside the reducer

use metrics::{describe_counter, describe_histogram};

/// Register descriptions for every metric the registry records.
///
/// Call once at startup, after installing a recorder.
pub fn register_registry_metrics() {
    describe_counter!("registry.events.created", "Number of events created");
    describe_counter!(
        "registry.registrations.accepted",
        "Number of accepted registrations"
    );
    describe_counter!(
        "registry.commands.rejected",
        "Number of refused commands by reason"
    );
    describe_counter!(
        "registry.notifications.publish_failed",
        "Number of notifications that could not be published"
    );
    describe_counter!("store.commands.total", "Number of actions sent to the store");
    describe_counter!(
        "store.shutdown.rejected_actions",
        "Number of actions refused while shutting down"
    );
    describe_histogram!(
        "store.reducer.duration_seconds",
        "Time spent running the reducer under the write lock"
    );
}
