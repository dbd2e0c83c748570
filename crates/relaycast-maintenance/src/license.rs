use chrono::{Duration, Utc};
use tracing::{instrument, warn};

use relaycast_core::{ContentKind, PublishPayload};
use relaycast_publish::PublisherGate;
use relaycast_store::TenantStore;

const WARNING_WINDOW_DAYS: i64 = 3;

/// License expiry notices pass (spec §5, every 24h): a 3-day warning, then a
/// single expiry notice, each sent at most once (spec §4.1's `info` columns
/// track whether a notice already went out).
#[instrument(skip(store, publisher))]
pub async fn run(store: &TenantStore, publisher: &PublisherGate) {
    let info = match store.get_license_info() {
        Ok(Some(info)) => info,
        Ok(None) => return,
        Err(e) => {
            warn!(error = %e, "license info lookup failed");
            return;
        }
    };
    let (Some(expires_at), notice_3day_sent, notice_expired_sent) = info else {
        return;
    };

    let owner = match store.get_owner_user_id() {
        Ok(Some(id)) => id,
        _ => return,
    };

    let now = Utc::now();
    if !notice_expired_sent && now >= expires_at {
        send_notice(store, publisher, owner, "Your license has expired.").await;
        if let Err(e) = store.mark_license_notice_expired_sent() {
            warn!(error = %e, "failed to record expiry notice");
        }
        return;
    }

    if !notice_3day_sent && now >= expires_at - Duration::days(WARNING_WINDOW_DAYS) {
        send_notice(
            store,
            publisher,
            owner,
            "Your license expires in 3 days or less.",
        )
        .await;
        if let Err(e) = store.mark_license_notice_3day_sent() {
            warn!(error = %e, "failed to record 3-day warning");
        }
    }
}

async fn send_notice(_store: &TenantStore, publisher: &PublisherGate, owner_user_id: i64, text: &str) {
    let payload = PublishPayload::Content {
        kind: ContentKind::Text,
        text: Some(text.to_string()),
        caption: None,
        media_bytes: None,
        media_file_id: None,
    };
    if let Err(e) = publisher.publish(&payload, owner_user_id).await {
        warn!(error = %e, "failed to deliver license notice");
    }
}
