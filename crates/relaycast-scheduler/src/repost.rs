use chrono::Utc;
use relaycast_core::{ChannelRef, ContentKind, PublishPayload};
use relaycast_fetch::clean_telegram_links;
use relaycast_publish::PublisherGate;
use relaycast_sessions::{ReaderSession, SessionPool, UpstreamMedia, UpstreamMessage};
use relaycast_store::{RepostStream, TenantStore};
use tracing::{info, instrument, warn};

const TAIL_LIMIT: usize = 50;

/// RepostStream pass (spec §4.6.3): baselines a freshly seen donor, then
/// republishes the new tail of messages into every target in chronological
/// order.
#[instrument(skip(tenant_store, sessions, publisher))]
pub async fn run(tenant_store: &TenantStore, sessions: &SessionPool, publisher: &PublisherGate, main_credential: &str) {
    let streams = match tenant_store.list_active_repost_streams() {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to list active repost streams");
            return;
        }
    };

    for stream in streams {
        process_stream(tenant_store, sessions, publisher, main_credential, stream).await;
    }
}

async fn process_stream(
    tenant_store: &TenantStore,
    sessions: &SessionPool,
    publisher: &PublisherGate,
    main_credential: &str,
    stream: RepostStream,
) {
    let credential = if stream.is_public_source {
        main_credential.to_string()
    } else {
        let phone = match &stream.credential_ref {
            Some(p) => p.clone(),
            None => {
                warn!(stream_id = stream.id, "repost stream has no credential_ref");
                return;
            }
        };
        match tenant_store.get_linked_account_by_phone(&phone) {
            Ok(Some(a)) => a.credential_string,
            Ok(None) => {
                warn!(stream_id = stream.id, phone, "linked account not found");
                return;
            }
            Err(e) => {
                warn!(stream_id = stream.id, error = %e, "linked account lookup failed");
                return;
            }
        }
    };

    let session = match sessions.get_or_create(&credential).await {
        Ok(s) => s,
        Err(e) => {
            warn!(stream_id = stream.id, error = %e, "session acquisition failed");
            return;
        }
    };

    let chat = match session.resolve(&stream.donor_ref).await {
        Ok(c) => c,
        Err(e) => {
            warn!(stream_id = stream.id, error = %e, "donor resolution failed");
            return;
        }
    };

    // Baseline step: first poll against an unknown donor sets the tip
    // without republishing history (I4).
    if stream.last_seen_message_id == 0 {
        let tip = match session.history(&chat, 1).await {
            Ok(mut msgs) if !msgs.is_empty() => msgs.remove(0).id,
            _ => return,
        };
        if let Err(e) = tenant_store.bump_last_seen(stream.id, tip) {
            warn!(stream_id = stream.id, error = %e, "failed to baseline repost stream");
        }
        return;
    }

    let history = match session.history(&chat, TAIL_LIMIT).await {
        Ok(h) => h,
        Err(e) => {
            warn!(stream_id = stream.id, error = %e, "history read failed");
            return;
        }
    };

    let mut tail: Vec<UpstreamMessage> = history
        .into_iter()
        .take_while(|m| m.id > stream.last_seen_message_id)
        .collect();
    tail.reverse(); // chronological order, oldest first

    let mut max_id = stream.last_seen_message_id;
    for message in tail {
        max_id = max_id.max(message.id);
        for target in &stream.targets {
            publish_one(tenant_store, session.as_ref(), publisher, &message, target).await;
        }
    }

    if max_id > stream.last_seen_message_id {
        if let Err(e) = tenant_store.bump_last_seen(stream.id, max_id) {
            warn!(stream_id = stream.id, error = %e, "failed to advance last_seen_message_id");
        }
    }
}

async fn publish_one(
    tenant_store: &TenantStore,
    session: &dyn ReaderSession,
    publisher: &PublisherGate,
    message: &UpstreamMessage,
    target: &ChannelRef,
) {
    let ChannelRef::Numeric(channel_id) = target else {
        warn!(target = %target, "repost target is not a resolved numeric channel id, skipping");
        return;
    };
    let channel_id = *channel_id;

    let text = clean_telegram_links(&message.text);

    let (kind, media_bytes) = match &message.media {
        Some(UpstreamMedia::Photo(media_ref)) => {
            (ContentKind::Photo, download(session, media_ref).await)
        }
        Some(UpstreamMedia::Video(media_ref)) => {
            (ContentKind::Video, download(session, media_ref).await)
        }
        _ => (ContentKind::Text, None),
    };

    let fp = relaycast_fetch::fingerprint(&relaycast_core::CandidatePost {
        kind,
        text: Some(text.clone()),
        caption: None,
        media_bytes: media_bytes.clone(),
        source_message_id: Some(message.id),
    });

    match tenant_store.reserve_dedup(channel_id, &fp, Utc::now()) {
        Ok(true) => {}
        Ok(false) => return,
        Err(e) => {
            warn!(channel_id, error = %e, "dedup reservation failed");
            return;
        }
    }

    let payload = PublishPayload::Content {
        kind,
        text: if media_bytes.is_some() { None } else { Some(text.clone()) },
        caption: if media_bytes.is_some() { Some(text) } else { None },
        media_bytes,
        media_file_id: None,
    };

    match publisher.publish(&payload, channel_id).await {
        Ok(()) => info!(channel_id, message_id = message.id, "repost published"),
        Err(e) => {
            warn!(channel_id, message_id = message.id, error = %e, "repost publish failed");
            let _ = tenant_store.release_dedup(channel_id, &fp);
        }
    }
}

async fn download(session: &dyn ReaderSession, media_ref: &relaycast_sessions::MediaRef) -> Option<Vec<u8>> {
    match session.download(media_ref).await {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!(error = %e, "media download failed");
            None
        }
    }
}
