use chrono::{Duration, Utc};
use relaycast_core::{ChannelRef, PublishPayload};
use relaycast_fetch::{fetch_random, fingerprint};
use relaycast_publish::PublisherGate;
use relaycast_sessions::SessionPool;
use relaycast_store::{PeriodicStream, TenantStore};
use tracing::{info, instrument, warn};

/// Fixed constants from the source system (spec §9 open question — not
/// evolved into configuration).
const INTERVAL_HOURS: i64 = 6;
const FRESHNESS_DAYS: i64 = 7;

#[instrument(skip(tenant_store, sessions, publisher))]
pub async fn run(tenant_store: &TenantStore, sessions: &SessionPool, publisher: &PublisherGate, main_credential: &str) {
    let streams = match tenant_store.list_active_periodic_streams() {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to list active periodic streams");
            return;
        }
    };

    let now = Utc::now();
    for stream in streams {
        if let Some(last) = stream.last_post_time {
            if now - last < Duration::hours(INTERVAL_HOURS) {
                continue;
            }
        }
        process_stream(tenant_store, sessions, publisher, main_credential, &stream).await;
    }
}

async fn process_stream(
    tenant_store: &TenantStore,
    sessions: &SessionPool,
    publisher: &PublisherGate,
    main_credential: &str,
    stream: &PeriodicStream,
) {
    let credential = if stream.is_public_source {
        main_credential.to_string()
    } else {
        let phone = match &stream.credential_ref {
            Some(p) => p.clone(),
            None => return,
        };
        match tenant_store.get_linked_account_by_phone(&phone) {
            Ok(Some(a)) => a.credential_string,
            _ => return,
        }
    };

    let session = match sessions.get_or_create(&credential).await {
        Ok(s) => s,
        Err(e) => {
            warn!(stream_id = stream.id, error = %e, "session acquisition failed");
            return;
        }
    };

    let candidate = match fetch_random(session.as_ref(), &stream.donor_ref, FRESHNESS_DAYS).await {
        Ok(Some(c)) => c,
        Ok(None) => return,
        Err(e) => {
            warn!(stream_id = stream.id, error = %e, "fetch_random failed");
            return;
        }
    };

    let fp = fingerprint(&candidate);
    let payload = PublishPayload::from_candidate(candidate);

    for target in &stream.targets {
        let ChannelRef::Numeric(channel_id) = target else {
            continue;
        };
        let channel_id = *channel_id;

        match tenant_store.reserve_dedup(channel_id, &fp, Utc::now()) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                warn!(channel_id, error = %e, "dedup reservation failed");
                continue;
            }
        }

        match publisher.publish(&payload, channel_id).await {
            Ok(()) => info!(channel_id, stream_id = stream.id, "periodic post published"),
            Err(e) => {
                warn!(channel_id, stream_id = stream.id, error = %e, "periodic publish failed");
                let _ = tenant_store.release_dedup(channel_id, &fp);
            }
        }
    }

    if let Err(e) = tenant_store.set_periodic_last_post_time(stream.id, Utc::now()) {
        warn!(stream_id = stream.id, error = %e, "failed to update periodic last_post_time");
    }
}
