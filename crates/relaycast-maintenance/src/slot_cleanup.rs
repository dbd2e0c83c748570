use tracing::{instrument, warn};

use relaycast_store::TenantStore;

/// Past-slot cleanup pass (spec §5, every 30 min): the same rule migration
/// step (v) applies, run standalone so it doesn't wait for a full migration.
#[instrument(skip(store))]
pub fn run(store: &TenantStore) {
    let result = store.with_conn(crate::migration::cleanup_past_slots);
    if let Err(e) = result {
        warn!(error = %e, "past-slot cleanup failed");
    }
}
