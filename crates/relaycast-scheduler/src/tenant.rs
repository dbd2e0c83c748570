use std::sync::atomic::{AtomicI64, Ordering};

use relaycast_core::{RelayError, Result};
use relaycast_store::{CredentialRef, TenantStore};

/// Per-tenant state the engine needs alongside the store itself: the main
/// (public-source) credential string and the configured caps (spec §6).
pub struct TenantContext {
    pub store: TenantStore,
    pub main_credential: String,
    pub min_seconds_between_posts_per_channel: i64,
    pub max_posts_per_channel_per_day: i64,
    /// Wall-clock of the last backfill pass, millis since epoch; 0 means never run.
    last_backfill_ms: AtomicI64,
}

impl TenantContext {
    pub fn new(
        store: TenantStore,
        main_credential: String,
        min_seconds_between_posts_per_channel: i64,
        max_posts_per_channel_per_day: i64,
    ) -> Self {
        Self {
            store,
            main_credential,
            min_seconds_between_posts_per_channel,
            max_posts_per_channel_per_day,
            last_backfill_ms: AtomicI64::new(0),
        }
    }

    /// Resolve a stream/slot's `CredentialRef` to the concrete credential
    /// string the Session Pool is keyed by (spec §4.3 step 1).
    pub fn resolve_credential(&self, credential: &CredentialRef) -> Result<String> {
        match credential {
            CredentialRef::Public => Ok(self.main_credential.clone()),
            CredentialRef::Account(phone) => self
                .store
                .get_linked_account_by_phone(phone)?
                .map(|a| a.credential_string)
                .ok_or_else(|| RelayError::CredentialMissing(phone.clone())),
        }
    }

    /// Whether at least 15 minutes have elapsed since the last backfill pass.
    pub fn backfill_due(&self, now_ms: i64, throttle_ms: i64) -> bool {
        let last = self.last_backfill_ms.load(Ordering::Relaxed);
        now_ms - last >= throttle_ms
    }

    pub fn mark_backfilled(&self, now_ms: i64) {
        self.last_backfill_ms.store(now_ms, Ordering::Relaxed);
    }
}
