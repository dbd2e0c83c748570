use std::sync::Arc;
use std::time::Duration as StdDuration;

use tokio::sync::watch;
use tracing::{info, instrument};

use relaycast_publish::PublisherGate;
use relaycast_sessions::SessionPool;

use crate::tenant::TenantContext;
use crate::{backfill, one_shot, periodic, random, repost};

const TICK_INTERVAL: StdDuration = StdDuration::from_secs(15);
const BACKFILL_THROTTLE_MS: i64 = 15 * 60 * 1000;

/// Drives every tenant's Slot Engine passes on a fixed cadence (spec §5).
/// One failing tenant or pass is logged and skipped; it never stalls the rest.
pub struct SchedulerEngine {
    tenants: Vec<Arc<TenantContext>>,
    sessions: Arc<SessionPool>,
    publisher: Arc<PublisherGate>,
}

impl SchedulerEngine {
    pub fn new(
        tenants: Vec<Arc<TenantContext>>,
        sessions: Arc<SessionPool>,
        publisher: Arc<PublisherGate>,
    ) -> Self {
        Self {
            tenants,
            sessions,
            publisher,
        }
    }

    #[instrument(skip(self, shutdown))]
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(tenants = self.tenants.len(), "scheduler engine started");
        let mut interval = tokio::time::interval(TICK_INTERVAL);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scheduler engine shutting down");
                        break;
                    }
                }
            }
        }
    }

    async fn tick(&self) {
        for tenant in &self.tenants {
            tick_tenant(tenant, &self.sessions, &self.publisher).await;
        }
    }
}

/// Run every pass for one tenant. Each pass is independently fallible and
/// logs its own errors — a panic-free tick loop catches and logs exceptions
/// per pass (spec §5) by construction, since no pass propagates `Result` up.
#[instrument(skip(tenant, sessions, publisher), fields(tenant = %tenant.main_credential))]
pub async fn tick_tenant(tenant: &Arc<TenantContext>, sessions: &SessionPool, publisher: &PublisherGate) {
    one_shot::run(&tenant.store, publisher).await;
    random::run(tenant, sessions, publisher).await;
    repost::run(&tenant.store, sessions, publisher, &tenant.main_credential).await;
    periodic::run(&tenant.store, sessions, publisher, &tenant.main_credential).await;

    let now_ms = now_millis();
    if tenant.backfill_due(now_ms, BACKFILL_THROTTLE_MS) {
        backfill::run(&tenant.store);
        tenant.mark_backfilled(now_ms);
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
