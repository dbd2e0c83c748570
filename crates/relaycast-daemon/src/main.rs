use std::path::Path;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use teloxide::Bot;
use tokio::sync::watch;
use tracing::{error, info, warn};

use relaycast_core::config::RelayConfig;
use relaycast_publish::PublisherGate;
use relaycast_scheduler::{SchedulerEngine, TenantContext};
use relaycast_sessions::SessionPool;
use relaycast_store::{db::open_tenant_db, TenantStore};

const SESSION_GC_INTERVAL: StdDuration = StdDuration::from_secs(5 * 60);
const SLOT_CLEANUP_INTERVAL: StdDuration = StdDuration::from_secs(30 * 60);
const LICENSE_NOTICE_INTERVAL: StdDuration = StdDuration::from_secs(24 * 60 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "relaycast=info".into()),
        )
        .init();

    let config = RelayConfig::load()?;
    let main_credential = read_main_credential(&config.sessions_dir)?;

    let sessions = Arc::new(SessionPool::new(
        Path::new(&config.sessions_dir).to_path_buf(),
        config.api_id,
        config.api_hash.clone(),
    ));
    let publisher = Arc::new(PublisherGate::new(Bot::new(config.bot_token.clone())));

    let tenants = discover_tenants(&config, &main_credential)?;
    info!(count = tenants.len(), "tenant namespaces loaded");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler = SchedulerEngine::new(tenants.clone(), sessions.clone(), publisher.clone());
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown_rx.clone()));

    let maintenance_handle = tokio::spawn(run_maintenance_loops(
        tenants,
        sessions,
        publisher,
        shutdown_rx,
    ));

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    let _ = scheduler_handle.await;
    let _ = maintenance_handle.await;
    Ok(())
}

fn read_main_credential(sessions_dir: &str) -> anyhow::Result<String> {
    let path = Path::new(sessions_dir).join("session_string.txt");
    Ok(std::fs::read_to_string(path)?.trim().to_string())
}

/// Scan `DB_DIR` for `telegram_*.db` files, open each, run migration/repair,
/// and wrap it in a `TenantContext` (spec §6 `Persisted state layout`).
fn discover_tenants(config: &RelayConfig, main_credential: &str) -> anyhow::Result<Vec<Arc<TenantContext>>> {
    let dir = Path::new(&config.db_dir);
    std::fs::create_dir_all(dir)?;

    let mut tenants = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !(name.starts_with("telegram_") && name.ends_with(".db")) {
            continue;
        }

        let conn = match open_tenant_db(&path) {
            Ok(c) => c,
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to open tenant database, skipping");
                continue;
            }
        };
        if let Err(e) = relaycast_maintenance::migrate(&conn) {
            error!(path = %path.display(), error = %e, "tenant migration failed, skipping");
            continue;
        }

        let store = TenantStore::new(conn);
        let tenant = TenantContext::new(
            store,
            main_credential.to_string(),
            config.min_seconds_between_posts_per_channel as i64,
            config.max_posts_per_channel_per_day as i64,
        );
        tenants.push(Arc::new(tenant));
    }
    Ok(tenants)
}

async fn run_maintenance_loops(
    tenants: Vec<Arc<TenantContext>>,
    sessions: Arc<SessionPool>,
    publisher: Arc<PublisherGate>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut session_gc = tokio::time::interval(SESSION_GC_INTERVAL);
    let mut slot_cleanup = tokio::time::interval(SLOT_CLEANUP_INTERVAL);
    let mut license_notices = tokio::time::interval(LICENSE_NOTICE_INTERVAL);

    loop {
        tokio::select! {
            _ = session_gc.tick() => {
                relaycast_maintenance::run_session_gc(&sessions).await;
            }
            _ = slot_cleanup.tick() => {
                for tenant in &tenants {
                    relaycast_maintenance::run_slot_cleanup(&tenant.store);
                }
            }
            _ = license_notices.tick() => {
                for tenant in &tenants {
                    relaycast_maintenance::run_license_notices(&tenant.store, &publisher).await;
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("maintenance loops shutting down");
                    break;
                }
            }
        }
    }

    if sessions.is_empty() {
        warn!("no cached sessions at shutdown");
    }
}
