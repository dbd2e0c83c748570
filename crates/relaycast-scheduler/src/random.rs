use chrono::{Duration, NaiveTime, TimeZone, Utc};
use rand::seq::SliceRandom;
use tracing::{info, instrument, warn};

use relaycast_core::{ChannelRef, PublishPayload};
use relaycast_fetch::{fetch_random, fingerprint};
use relaycast_publish::PublisherGate;
use relaycast_sessions::SessionPool;
use relaycast_store::Slot;

use crate::tenant::TenantContext;

const RANDOM_BATCH: i64 = 100;
const MAX_ATTEMPTS: usize = 5;

/// Random pass — the publication protocol of spec §4.6.2.
#[instrument(skip(tenant, sessions, publisher))]
pub async fn run(tenant: &TenantContext, sessions: &SessionPool, publisher: &PublisherGate) {
    let now = Utc::now();
    let slots = match tenant.store.list_due_random_slots(now, RANDOM_BATCH) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to list due random slots");
            return;
        }
    };

    for slot in slots {
        process_slot(tenant, sessions, publisher, slot).await;
    }
}

async fn process_slot(
    tenant: &TenantContext,
    sessions: &SessionPool,
    publisher: &PublisherGate,
    slot: Slot,
) {
    // Step 1: parse guard — defensive, the SQL predicate already excluded these.
    if slot.scheduled_at > Utc::now() {
        return;
    }

    // Step 2: reserve.
    match tenant.store.reserve_slot(slot.id) {
        Ok(true) => {}
        Ok(false) => return, // another worker won the race (S6)
        Err(e) => {
            warn!(slot_id = slot.id, error = %e, "reserve_slot failed");
            return;
        }
    }

    // Step 3: donors snapshot.
    let donors = match &slot.donors_snapshot {
        Some(d) if !d.is_empty() => d.clone(),
        _ => {
            let _ = tenant.store.release_slot(slot.id);
            return;
        }
    };

    let credential = match tenant.resolve_credential(&slot.credential()) {
        Ok(c) => c,
        Err(e) => {
            warn!(slot_id = slot.id, error = %e, "credential resolution failed");
            let _ = tenant.store.release_slot(slot.id);
            return;
        }
    };

    let session = match sessions.get_or_create(&credential).await {
        Ok(s) => s,
        Err(e) => {
            warn!(slot_id = slot.id, error = %e, "session acquisition failed");
            let _ = tenant.store.release_slot(slot.id);
            return;
        }
    };

    // Step 4: retry loop.
    let mut outcome = None;
    for _ in 0..MAX_ATTEMPTS {
        let donor = match donors.choose(&mut rand::thread_rng()) {
            Some(d) => d,
            None => break,
        };

        let candidate = match fetch_candidate(session.as_ref(), donor, slot.freshness_days.unwrap_or(1)).await {
            Some(c) => c,
            None => continue,
        };

        let fp = fingerprint(&candidate);
        match tenant.store.reserve_dedup(slot.channel_id, &fp, Utc::now()) {
            Ok(true) => {
                outcome = Some((candidate, fp));
                break;
            }
            Ok(false) => continue,
            Err(e) => {
                warn!(slot_id = slot.id, error = %e, "dedup reservation failed");
                continue;
            }
        }
    }

    let Some((candidate, fp)) = outcome else {
        // Step 5: all retries exhausted — absorb.
        if let Err(e) = tenant.store.commit_slot(slot.id, Utc::now()) {
            warn!(slot_id = slot.id, error = %e, "failed to absorb exhausted slot");
        }
        return;
    };

    // Step 6: safety caps.
    if tenant.max_posts_per_channel_per_day > 0 {
        let now = Utc::now();
        let today_start = Utc.from_utc_datetime(&now.date_naive().and_time(NaiveTime::MIN));
        let day_end = today_start + Duration::days(1) - Duration::seconds(1);
        match tenant.store.count_dedup_in_range(slot.channel_id, today_start, day_end) {
            Ok(count) if count >= tenant.max_posts_per_channel_per_day => {
                let _ = tenant.store.release_dedup(slot.channel_id, &fp);
                if let Err(e) = tenant.store.commit_slot(slot.id, Utc::now()) {
                    warn!(slot_id = slot.id, error = %e, "failed to absorb capped slot");
                }
                return;
            }
            Ok(_) => {}
            Err(e) => warn!(slot_id = slot.id, error = %e, "daily cap check failed"),
        }
    }

    if tenant.min_seconds_between_posts_per_channel > 0 {
        match tenant.store.last_publish_time_excluding(slot.channel_id, &fp) {
            Ok(Some(last)) => {
                let elapsed = (Utc::now() - last).num_seconds();
                if elapsed < tenant.min_seconds_between_posts_per_channel {
                    let _ = tenant.store.release_dedup(slot.channel_id, &fp);
                    let _ = tenant.store.release_slot(slot.id);
                    return;
                }
            }
            Ok(None) => {}
            Err(e) => warn!(slot_id = slot.id, error = %e, "spacing cap check failed"),
        }
    }

    // Step 7: publish.
    let payload = PublishPayload::from_candidate(candidate);
    let delay = Utc::now() - slot.scheduled_at;
    match publisher.publish(&payload, slot.channel_id).await {
        Ok(()) => {
            info!(slot_id = slot.id, delay_secs = delay.num_seconds(), "random slot published");
            if let Err(e) = tenant.store.commit_slot(slot.id, Utc::now()) {
                warn!(slot_id = slot.id, error = %e, "failed to commit published slot");
            }
            if let Some(stream_id) = slot.stream_ref {
                let _ = tenant.store.set_random_last_post_time(stream_id, Utc::now());
                if let Err(e) = tenant.store.union_future_times(stream_id) {
                    warn!(stream_id, error = %e, "failed to recompute upcoming_slot_times");
                }
            }
        }
        Err(e) => {
            // Step 9: rollback both reservations together (I1 + I5).
            warn!(slot_id = slot.id, error = %e, "random publish failed, rolling back");
            let _ = tenant.store.release_dedup(slot.channel_id, &fp);
            let _ = tenant.store.release_slot(slot.id);
        }
    }
}

async fn fetch_candidate(
    session: &dyn relaycast_sessions::ReaderSession,
    donor: &ChannelRef,
    freshness_days: i64,
) -> Option<relaycast_core::CandidatePost> {
    match fetch_random(session, donor, freshness_days).await {
        Ok(candidate) => candidate,
        Err(e) => {
            warn!(error = %e, "fetch_random failed");
            None
        }
    }
}
