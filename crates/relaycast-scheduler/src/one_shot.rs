use chrono::Utc;
use tracing::{instrument, warn};

use relaycast_publish::PublisherGate;
use relaycast_store::TenantStore;

use crate::payload::payload_for_slot;

const ONE_SHOT_BATCH: i64 = 50;

/// One-shot pass (spec §4.6.1): slots are not reserved here — on failure the
/// slot simply stays pending and is retried on the next tick.
#[instrument(skip(store, publisher))]
pub async fn run(store: &TenantStore, publisher: &PublisherGate) {
    let now = Utc::now();
    let slots = match store.list_due_one_shot_slots(now, ONE_SHOT_BATCH) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to list due one-shot slots");
            return;
        }
    };

    for slot in slots {
        let payload = match payload_for_slot(&slot) {
            Some(p) => p,
            None => {
                warn!(slot_id = slot.id, "malformed one-shot slot, skipping");
                continue;
            }
        };

        match publisher.publish(&payload, slot.channel_id).await {
            Ok(()) => {
                if let Err(e) = store.commit_slot(slot.id, Utc::now()) {
                    warn!(slot_id = slot.id, error = %e, "failed to commit one-shot slot");
                }
            }
            Err(e) => {
                warn!(slot_id = slot.id, error = %e, "one-shot publish failed, will retry next tick");
            }
        }
    }
}
