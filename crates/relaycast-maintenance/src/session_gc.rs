use tracing::instrument;

use relaycast_sessions::SessionPool;

/// Session GC pass (spec §5, every 5 min): evicts dead entries from the
/// shared Session Pool so a dropped connection doesn't linger as a cache hit.
#[instrument(skip(sessions))]
pub async fn run(sessions: &SessionPool) {
    sessions.evict_dead().await;
}
