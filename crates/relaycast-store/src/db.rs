use std::path::Path;

use rusqlite::Connection;

use relaycast_core::Result;

/// Open (creating if absent) the SQLite file for one tenant and apply the
/// performance pragmas from spec §4.1: WAL journal, NORMAL sync, in-memory
/// temp store, ~20 MiB page cache, foreign keys on, and a 5s busy timeout so
/// concurrent workers back off instead of erroring under write contention.
pub fn open_tenant_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA temp_store = MEMORY;
        PRAGMA cache_size = -20000;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
        ",
    )?;
    init_schema(&conn)?;
    Ok(conn)
}

/// Create every table and index used by the tenant store. Idempotent —
/// `CREATE TABLE IF NOT EXISTS` means this is safe to call on every startup.
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS info (
            id                          INTEGER PRIMARY KEY CHECK (id = 1),
            user_id                     INTEGER NOT NULL,
            username                    TEXT,
            license_expires_at          TEXT,
            license_notice_3day_sent    INTEGER NOT NULL DEFAULT 0,
            license_notice_expired_sent INTEGER NOT NULL DEFAULT 0,
            created_at                  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS channels (
            channel_id  INTEGER PRIMARY KEY,
            username    TEXT,
            title       TEXT,
            is_donor    INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS linked_accounts (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            phone               TEXT NOT NULL UNIQUE,
            credential_string   TEXT NOT NULL,
            is_main             INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS repost_streams (
            id                      INTEGER PRIMARY KEY AUTOINCREMENT,
            donor_ref               TEXT NOT NULL,
            targets                 TEXT NOT NULL,
            last_seen_message_id    INTEGER NOT NULL DEFAULT 0,
            credential_ref          TEXT,
            is_public_source        INTEGER NOT NULL DEFAULT 0,
            freshness_days          INTEGER NOT NULL DEFAULT 7,
            active                  INTEGER NOT NULL DEFAULT 1,
            created_at              TEXT NOT NULL,
            updated_at              TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS random_posts (
            id                          INTEGER PRIMARY KEY AUTOINCREMENT,
            donors                      TEXT NOT NULL,
            targets                     TEXT NOT NULL,
            posts_per_day_per_target    INTEGER NOT NULL,
            freshness_days              INTEGER NOT NULL DEFAULT 1,
            credential_ref              TEXT,
            is_public_source            INTEGER NOT NULL DEFAULT 0,
            active                      INTEGER NOT NULL DEFAULT 1,
            last_post_time              TEXT,
            upcoming_slot_times         TEXT NOT NULL DEFAULT '[]',
            created_at                  TEXT NOT NULL,
            updated_at                  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS periodic_posts (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            donor_ref           TEXT NOT NULL,
            targets             TEXT NOT NULL,
            credential_ref      TEXT,
            is_public_source    INTEGER NOT NULL DEFAULT 0,
            active              INTEGER NOT NULL DEFAULT 1,
            last_post_time      TEXT,
            created_at          TEXT NOT NULL,
            updated_at          TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS posts (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            channel_id          INTEGER NOT NULL,
            content_type        TEXT NOT NULL,
            content_payload     TEXT,
            media_ref           TEXT,
            scheduled_at        TEXT NOT NULL,
            published           INTEGER NOT NULL DEFAULT 0,
            last_attempt_at     TEXT,
            stream_ref          INTEGER,
            donors_snapshot     TEXT,
            targets_snapshot    TEXT,
            freshness_days      INTEGER,
            credential_ref      TEXT,
            is_public_source    INTEGER,
            created_at          TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS published_dedup (
            channel_id      INTEGER NOT NULL,
            fingerprint     TEXT NOT NULL,
            published_at    TEXT NOT NULL,
            UNIQUE(channel_id, fingerprint)
        );

        CREATE INDEX IF NOT EXISTS idx_posts_pub_sched ON posts (published, scheduled_at);
        CREATE INDEX IF NOT EXISTS idx_posts_stream ON posts (stream_ref);
        CREATE INDEX IF NOT EXISTS idx_posts_content_type ON posts (content_type);
        CREATE INDEX IF NOT EXISTS idx_posts_channel ON posts (channel_id);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_dedup_channel_fp
            ON published_dedup (channel_id, fingerprint);
        ",
    )?;
    Ok(())
}

/// Derive the per-tenant database path: `{db_dir}/telegram_{username}_{user_id}.db`.
pub fn tenant_db_path(db_dir: &str, username: &str, user_id: i64) -> std::path::PathBuf {
    std::path::Path::new(db_dir).join(format!("telegram_{username}_{user_id}.db"))
}
