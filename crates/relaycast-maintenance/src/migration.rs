//! Idempotent schema evolution and self-repair (spec §4.1).
//!
//! `init_schema` in `relaycast-store` already creates every table and column
//! a freshly provisioned tenant needs; this module repairs tenants whose
//! database predates a later column or whose JSON columns were corrupted by
//! an earlier bug, so a fresh `relaycast-store::db::init_schema` plus this
//! pass is always enough to bring any on-disk file up to date.

use chrono::Utc;
use rusqlite::Connection;
use tracing::{info, warn};

use relaycast_core::ChannelRef;
use relaycast_store::Result;

/// Run every migration/repair step against one tenant's connection.
pub fn migrate(conn: &Connection) -> Result<()> {
    add_missing_columns(conn)?;
    rewrite_comma_lists(conn)?;
    repair_upcoming_slot_times(conn)?;
    delete_malformed_random_slots(conn)?;
    drop_stale_past_slots(conn)?;
    Ok(())
}

/// Step (i): add columns later revisions of the schema introduced, each with
/// the same default `relaycast_store::db::init_schema` would apply.
fn add_missing_columns(conn: &Connection) -> Result<()> {
    ensure_column(conn, "info", "license_notice_3day_sent", "INTEGER NOT NULL DEFAULT 0")?;
    ensure_column(conn, "info", "license_notice_expired_sent", "INTEGER NOT NULL DEFAULT 0")?;
    ensure_column(conn, "posts", "donors_snapshot", "TEXT")?;
    ensure_column(conn, "posts", "targets_snapshot", "TEXT")?;
    ensure_column(conn, "posts", "freshness_days", "INTEGER")?;
    ensure_column(conn, "posts", "credential_ref", "TEXT")?;
    ensure_column(conn, "posts", "is_public_source", "INTEGER")?;
    ensure_column(conn, "random_posts", "upcoming_slot_times", "TEXT NOT NULL DEFAULT '[]'")?;
    ensure_column(conn, "random_posts", "freshness_days", "INTEGER NOT NULL DEFAULT 1")?;
    ensure_column(conn, "repost_streams", "freshness_days", "INTEGER NOT NULL DEFAULT 7")?;
    Ok(())
}

fn ensure_column(conn: &Connection, table: &str, column: &str, decl: &str) -> Result<()> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let exists = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .filter_map(|r| r.ok())
        .any(|name| name == column);
    drop(stmt);
    if !exists {
        info!(table, column, "adding missing column");
        conn.execute(&format!("ALTER TABLE {table} ADD COLUMN {column} {decl}"), [])?;
    }
    Ok(())
}

/// Step (ii): rewrite historical comma-separated donor/target lists into the
/// JSON array shape `relaycast_store::json` expects.
fn rewrite_comma_lists(conn: &Connection) -> Result<()> {
    rewrite_column(conn, "repost_streams", "donor_ref")?;
    rewrite_column(conn, "repost_streams", "targets")?;
    rewrite_column(conn, "random_posts", "donors")?;
    rewrite_column(conn, "random_posts", "targets")?;
    rewrite_column(conn, "periodic_posts", "donor_ref")?;
    rewrite_column(conn, "periodic_posts", "targets")?;
    rewrite_column(conn, "posts", "donors_snapshot")?;
    rewrite_column(conn, "posts", "targets_snapshot")?;
    Ok(())
}

fn rewrite_column(conn: &Connection, table: &str, column: &str) -> Result<()> {
    let rows: Vec<(i64, Option<String>)> = {
        let mut stmt = conn.prepare(&format!("SELECT rowid, {column} FROM {table}"))?;
        let mapped = stmt.query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?;
        mapped.filter_map(|r| r.ok()).collect()
    };

    for (rowid, raw) in rows {
        let Some(raw) = raw else { continue };
        if serde_json::from_str::<Vec<ChannelRef>>(&raw).is_ok() {
            continue;
        }
        let refs: Vec<ChannelRef> = if raw.trim().is_empty() {
            Vec::new()
        } else {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ChannelRef::parse)
                .collect()
        };
        let encoded = serde_json::to_string(&refs).unwrap_or_else(|_| "[]".to_string());
        conn.execute(
            &format!("UPDATE {table} SET {column} = ?1 WHERE rowid = ?2"),
            rusqlite::params![encoded, rowid],
        )?;
    }
    Ok(())
}

/// Step (iii): repair `upcoming_slot_times` columns that fail to parse as a
/// JSON array of timestamps.
fn repair_upcoming_slot_times(conn: &Connection) -> Result<()> {
    let rows: Vec<(i64, String)> = {
        let mut stmt = conn.prepare("SELECT id, upcoming_slot_times FROM random_posts")?;
        let mapped = stmt.query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?;
        mapped.filter_map(|r| r.ok()).collect()
    };
    for (id, raw) in rows {
        if serde_json::from_str::<Vec<String>>(&raw).is_ok() {
            continue;
        }
        warn!(id, "repairing malformed upcoming_slot_times");
        conn.execute(
            "UPDATE random_posts SET upcoming_slot_times = '[]' WHERE id = ?1",
            [id],
        )?;
    }
    Ok(())
}

/// Step (iv): delete `random`-kind slots whose credential/public-flag/JSON
/// fields are malformed beyond repair.
fn delete_malformed_random_slots(conn: &Connection) -> Result<()> {
    let rows: Vec<(i64, Option<String>, Option<String>, Option<String>, Option<i32>)> = {
        let mut stmt = conn.prepare(
            "SELECT id, donors_snapshot, targets_snapshot, credential_ref, is_public_source
             FROM posts WHERE content_type = 'random'",
        )?;
        let mapped = stmt.query_map([], |r| {
            Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?))
        })?;
        mapped.filter_map(|r| r.ok()).collect()
    };

    for (id, donors, targets, credential_ref, is_public_source) in rows {
        let malformed = !valid_ref_list(&donors)
            || !valid_ref_list(&targets)
            || (credential_ref.is_none() && is_public_source.unwrap_or(0) == 0);
        if malformed {
            warn!(id, "deleting malformed random slot");
            conn.execute("DELETE FROM posts WHERE id = ?1", [id])?;
        }
    }
    Ok(())
}

fn valid_ref_list(raw: &Option<String>) -> bool {
    match raw {
        None => false,
        Some(s) => serde_json::from_str::<Vec<ChannelRef>>(s).is_ok(),
    }
}

/// Standalone past-slot cleanup, run on its own cadence (spec §5, every
/// 30 min) independent of the full migration pass.
pub fn cleanup_past_slots(conn: &Connection) -> Result<()> {
    drop_stale_past_slots(conn)
}

/// Step (v): drop past unpublished slots, except random-kind slots belonging
/// to a still-active random stream — those are kept, and the stream's
/// `upcoming_slot_times` is pruned down to its remaining future entries.
fn drop_stale_past_slots(conn: &Connection) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    let deleted = conn.execute(
        "DELETE FROM posts
         WHERE published = 0 AND scheduled_at < ?1
           AND NOT (
             content_type = 'random'
             AND stream_ref IN (SELECT id FROM random_posts WHERE active = 1)
           )",
        [&now],
    )?;
    if deleted > 0 {
        info!(count = deleted, "dropped stale past slots");
    }

    let active_streams: Vec<i64> = {
        let mut stmt = conn.prepare("SELECT id FROM random_posts WHERE active = 1")?;
        let mapped = stmt.query_map([], |r| r.get(0))?;
        mapped.filter_map(|r| r.ok()).collect()
    };
    for stream_id in active_streams {
        prune_upcoming_times(conn, stream_id)?;
    }
    Ok(())
}

fn prune_upcoming_times(conn: &Connection, stream_id: i64) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT scheduled_at FROM posts
         WHERE stream_ref = ?1 AND published = 0 AND scheduled_at > ?2
         ORDER BY scheduled_at ASC",
    )?;
    let now = Utc::now().to_rfc3339();
    let times: Vec<String> = stmt
        .query_map(rusqlite::params![stream_id, now], |r| r.get(0))?
        .filter_map(|r| r.ok())
        .collect();
    let encoded = serde_json::to_string(&times).unwrap_or_else(|_| "[]".to_string());
    conn.execute(
        "UPDATE random_posts SET upcoming_slot_times = ?2 WHERE id = ?1",
        rusqlite::params![stream_id, encoded],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaycast_store::db::init_schema;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn migrate_is_idempotent_on_a_fresh_schema() {
        let c = conn();
        migrate(&c).unwrap();
        migrate(&c).unwrap();
    }

    #[test]
    fn rewrites_legacy_comma_list_to_json() {
        let c = conn();
        c.execute(
            "INSERT INTO repost_streams (donor_ref, targets, credential_ref, created_at, updated_at)
             VALUES ('123,456', '@foo,789', NULL, '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
            [],
        )
        .unwrap();
        migrate(&c).unwrap();
        let targets: String = c
            .query_row("SELECT targets FROM repost_streams", [], |r| r.get(0))
            .unwrap();
        let parsed: Vec<ChannelRef> = serde_json::from_str(&targets).unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn deletes_malformed_random_slot() {
        let c = conn();
        c.execute(
            "INSERT INTO posts (channel_id, content_type, scheduled_at, published, created_at)
             VALUES (1, 'random', '2024-01-01T00:00:00Z', 0, '2024-01-01T00:00:00Z')",
            [],
        )
        .unwrap();
        migrate(&c).unwrap();
        let count: i64 = c.query_row("SELECT COUNT(*) FROM posts", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 0);
    }
}
