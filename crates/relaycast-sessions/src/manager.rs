use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, instrument, warn};

use relaycast_core::{RelayError, Result};

use crate::reader::GrammersSession;
use crate::types::ReaderSession;

/// Keeps at most one live MTProto connection per credential string, shared
/// across every tenant/stream that reads from the same account (spec §4.2
/// — "Content Fetcher never constructs its own" session).
///
/// Entries are lazily created on first use and evicted by the periodic GC
/// pass when their transport reports itself disconnected.
pub struct SessionPool {
    sessions_dir: PathBuf,
    api_id: i32,
    api_hash: String,
    sessions: DashMap<String, Arc<AsyncMutex<Arc<dyn ReaderSession>>>>,
}

impl SessionPool {
    pub fn new(sessions_dir: PathBuf, api_id: i32, api_hash: String) -> Self {
        Self {
            sessions_dir,
            api_id,
            api_hash,
            sessions: DashMap::new(),
        }
    }

    /// Return the live session for `credential`, connecting one if none
    /// exists yet or the cached one has gone stale.
    #[instrument(skip(self), fields(credential = %credential))]
    pub async fn get_or_create(&self, credential: &str) -> Result<Arc<dyn ReaderSession>> {
        let cached = self.sessions.get(credential).map(|entry| entry.value().clone());
        if let Some(slot) = cached {
            let guard = slot.lock().await;
            if guard.is_connected().await {
                return Ok(guard.clone());
            }
            warn!(credential, "cached session disconnected, reconnecting");
        }

        let session = self.connect(credential).await?;
        let slot = self
            .sessions
            .entry(credential.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(session.clone())))
            .value()
            .clone();
        let mut guard = slot.lock().await;
        *guard = session.clone();
        Ok(session)
    }

    async fn connect(&self, credential: &str) -> Result<Arc<dyn ReaderSession>> {
        let path = self.sessions_dir.join(format!("{credential}.session"));
        if !path.exists() {
            return Err(RelayError::CredentialMissing(credential.to_string()));
        }
        info!(credential, "connecting upstream session");
        let session = GrammersSession::connect(&path, self.api_id, &self.api_hash).await?;
        Ok(Arc::new(session))
    }

    /// Disconnect and drop every session whose transport is no longer
    /// connected. Run on a periodic cadence by the maintenance loop.
    #[instrument(skip(self))]
    pub async fn evict_dead(&self) {
        let snapshot: Vec<(String, Arc<AsyncMutex<Arc<dyn ReaderSession>>>)> = self
            .sessions
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut dead = Vec::new();
        for (credential, slot) in snapshot {
            let guard = slot.lock().await;
            if !guard.is_connected().await {
                dead.push(credential);
            }
        }
        for credential in dead {
            if let Some((_, slot)) = self.sessions.remove(&credential) {
                let guard = slot.lock().await;
                guard.disconnect().await;
                info!(credential, "evicted dead session");
            }
        }
    }

    /// Number of sessions currently cached, live or not.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
