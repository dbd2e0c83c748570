use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use tracing::instrument;

use relaycast_core::{ChannelRef, ContentKind, RelayError};

use crate::error::Result;
use crate::json::{encode_channel_refs, encode_timestamps, parse_channel_refs, parse_timestamps};
use crate::types::{
    Channel, LinkedAccount, NewSlot, PeriodicStream, RandomStream, RepostStream, Slot,
};

/// Per-tenant persistent namespace (spec §4.1). Wraps a single `Connection`
/// in a `Mutex` — one `TenantStore` per tenant database file, shared across
/// the tick loop's concurrent passes.
pub struct TenantStore {
    conn: Mutex<rusqlite::Connection>,
}

impl TenantStore {
    pub fn new(conn: rusqlite::Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    // -- slot reservation -----------------------------------------------

    /// Compare-and-set `published: 0 -> -1`. Returns true iff exactly one
    /// row changed (spec §4.1 `reserve_slot`).
    #[instrument(skip(self))]
    pub fn reserve_slot(&self, slot_id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute(
            "UPDATE posts SET published = -1 WHERE id = ?1 AND published = 0",
            params![slot_id],
        )?;
        Ok(n == 1)
    }

    /// Set `published = 1, last_attempt_at = now`.
    #[instrument(skip(self))]
    pub fn commit_slot(&self, slot_id: i64, now: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE posts SET published = 1, last_attempt_at = ?2 WHERE id = ?1",
            params![slot_id, now.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Compare-and-set `published: -1 -> 0` (rollback a failed attempt).
    #[instrument(skip(self))]
    pub fn release_slot(&self, slot_id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE posts SET published = 0 WHERE id = ?1 AND published = -1",
            params![slot_id],
        )?;
        Ok(())
    }

    // -- dedup reservation -------------------------------------------------

    /// `INSERT OR IGNORE` on the unique index; true iff the insert happened.
    #[instrument(skip(self))]
    pub fn reserve_dedup(
        &self,
        channel_id: i64,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute(
            "INSERT OR IGNORE INTO published_dedup (channel_id, fingerprint, published_at)
             VALUES (?1, ?2, ?3)",
            params![channel_id, fingerprint, now.to_rfc3339()],
        )?;
        Ok(n == 1)
    }

    #[instrument(skip(self))]
    pub fn release_dedup(&self, channel_id: i64, fingerprint: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM published_dedup WHERE channel_id = ?1 AND fingerprint = ?2",
            params![channel_id, fingerprint],
        )?;
        Ok(())
    }

    /// Count dedup records for `channel_id` published since `since` —
    /// backs the daily cap (spec §4.6.2 step 6).
    pub fn count_dedup_since(&self, channel_id: i64, since: DateTime<Utc>) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM published_dedup WHERE channel_id = ?1 AND published_at >= ?2",
            params![channel_id, since.to_rfc3339()],
            |r| r.get(0),
        )?;
        Ok(n)
    }

    /// Count published_dedup rows for a channel within `[start, end]`, inclusive.
    /// Used for the daily cap, which is scoped to a calendar day rather than a
    /// rolling window.
    pub fn count_dedup_in_range(&self, channel_id: i64, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM published_dedup WHERE channel_id = ?1 AND published_at >= ?2 AND published_at <= ?3",
            params![channel_id, start.to_rfc3339(), end.to_rfc3339()],
            |r| r.get(0),
        )?;
        Ok(n)
    }

    /// Most recent publish time for a channel — backs the spacing cap.
    pub fn last_publish_time(&self, channel_id: i64) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn.lock().unwrap();
        let raw: Option<String> = conn
            .query_row(
                "SELECT MAX(published_at) FROM published_dedup WHERE channel_id = ?1",
                params![channel_id],
                |r| r.get(0),
            )
            .optional()?
            .flatten();
        Ok(raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok().map(|d| d.with_timezone(&Utc))))
    }

    /// Most recent publish time for a channel, excluding one fingerprint's own
    /// row — used by the spacing cap so a candidate's own in-flight dedup
    /// reservation can't poison its own spacing check.
    pub fn last_publish_time_excluding(&self, channel_id: i64, exclude_fingerprint: &str) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn.lock().unwrap();
        let raw: Option<String> = conn
            .query_row(
                "SELECT MAX(published_at) FROM published_dedup WHERE channel_id = ?1 AND fingerprint != ?2",
                params![channel_id, exclude_fingerprint],
                |r| r.get(0),
            )
            .optional()?
            .flatten();
        Ok(raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok().map(|d| d.with_timezone(&Utc))))
    }

    // -- slot queries --------------------------------------------------

    /// Slots where `published=0 AND content_type != 'random' AND scheduled_at <= now`,
    /// ordered by scheduled_at, up to `limit` (spec §4.6.1).
    pub fn list_due_one_shot_slots(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Slot>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "{SLOT_SELECT_COLUMNS} FROM posts
             WHERE published = 0 AND content_type != 'random' AND scheduled_at <= ?1
             ORDER BY scheduled_at ASC LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![now.to_rfc3339(), limit], row_to_slot)?;
        collect_ok(rows)
    }

    /// Slots where `content_type='random' AND published=0 AND scheduled_at <= now`,
    /// ordered by scheduled_at ascending, up to `limit` (spec §4.6.2).
    pub fn list_due_random_slots(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Slot>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "{SLOT_SELECT_COLUMNS} FROM posts
             WHERE content_type = 'random' AND published = 0 AND scheduled_at <= ?1
             ORDER BY scheduled_at ASC LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![now.to_rfc3339(), limit], row_to_slot)?;
        collect_ok(rows)
    }

    /// Count already-pending random slots for `(stream_id, channel_id)` whose
    /// `scheduled_at` falls in `[window_start, window_end]` — backfill quota math.
    pub fn count_pending_random_slots_in_window(
        &self,
        stream_id: i64,
        channel_id: i64,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM posts
             WHERE stream_ref = ?1 AND channel_id = ?2 AND published = 0
               AND content_type = 'random'
               AND scheduled_at >= ?3 AND scheduled_at <= ?4",
            params![
                stream_id,
                channel_id,
                window_start.to_rfc3339(),
                window_end.to_rfc3339()
            ],
            |r| r.get(0),
        )?;
        Ok(n)
    }

    /// Every future pending `scheduled_at` for a random stream, across all
    /// its targets — used to recompute `upcoming_slot_times` (I3).
    pub fn future_pending_times_for_stream(
        &self,
        stream_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT scheduled_at FROM posts
             WHERE stream_ref = ?1 AND published = 0 AND scheduled_at > ?2
             ORDER BY scheduled_at ASC",
        )?;
        let rows = stmt.query_map(params![stream_id, now.to_rfc3339()], |r| {
            r.get::<_, String>(0)
        })?;
        let mut out = Vec::new();
        for r in rows {
            if let Ok(s) = r {
                if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
                    out.push(dt.with_timezone(&Utc));
                }
            }
        }
        Ok(out)
    }

    /// Insert a freshly materialised slot, returning its id.
    pub fn insert_slot(&self, slot: &NewSlot) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO posts
             (channel_id, content_type, content_payload, media_ref, scheduled_at,
              published, stream_ref, donors_snapshot, targets_snapshot,
              freshness_days, credential_ref, is_public_source, created_at)
             VALUES (?1,?2,?3,?4,?5,0,?6,?7,?8,?9,?10,?11,?12)",
            params![
                slot.channel_id,
                slot.content_type.as_str(),
                slot.content_payload,
                slot.media_ref,
                slot.scheduled_at.to_rfc3339(),
                slot.stream_ref,
                slot.donors_snapshot.as_ref().map(|v| encode_channel_refs(v)),
                slot.targets_snapshot.as_ref().map(|v| encode_channel_refs(v)),
                slot.freshness_days,
                slot.credential_ref,
                slot.is_public_source.map(|b| b as i32),
                now,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    // -- repost streams --------------------------------------------------

    pub fn list_active_repost_streams(&self) -> Result<Vec<RepostStream>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, donor_ref, targets, last_seen_message_id, credential_ref,
                    is_public_source, freshness_days, active
             FROM repost_streams WHERE active = 1",
        )?;
        let rows = stmt.query_map([], row_to_repost_stream)?;
        collect_ok(rows)
    }

    /// Monotonically advance `last_seen_message_id` — never decreases (I4).
    pub fn bump_last_seen(&self, stream_id: i64, msg_id: i32) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE repost_streams SET last_seen_message_id = ?2, updated_at = ?3
             WHERE id = ?1 AND last_seen_message_id < ?2",
            params![stream_id, msg_id, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    // -- random streams --------------------------------------------------

    pub fn list_active_random_streams(&self) -> Result<Vec<RandomStream>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, donors, targets, posts_per_day_per_target, freshness_days,
                    credential_ref, is_public_source, active, last_post_time,
                    upcoming_slot_times
             FROM random_posts WHERE active = 1",
        )?;
        let rows = stmt.query_map([], row_to_random_stream)?;
        collect_ok(rows)
    }

    pub fn get_random_stream(&self, id: i64) -> Result<Option<RandomStream>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, donors, targets, posts_per_day_per_target, freshness_days,
                    credential_ref, is_public_source, active, last_post_time,
                    upcoming_slot_times
             FROM random_posts WHERE id = ?1",
            params![id],
            row_to_random_stream,
        )
        .optional()
        .map_err(RelayError::from)
    }

    pub fn set_random_last_post_time(&self, stream_id: i64, now: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE random_posts SET last_post_time = ?2, updated_at = ?2 WHERE id = ?1",
            params![stream_id, now.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Recompute and persist `upcoming_slot_times` as the union of future
    /// pending `scheduled_at` values for this stream (I3).
    pub fn union_future_times(&self, stream_id: i64) -> Result<()> {
        let times = self.future_pending_times_for_stream(stream_id, Utc::now())?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE random_posts SET upcoming_slot_times = ?2, updated_at = ?3 WHERE id = ?1",
            params![stream_id, encode_timestamps(&times), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    // -- periodic streams --------------------------------------------------

    pub fn list_active_periodic_streams(&self) -> Result<Vec<PeriodicStream>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, donor_ref, targets, last_post_time, credential_ref,
                    is_public_source, active
             FROM periodic_posts WHERE active = 1",
        )?;
        let rows = stmt.query_map([], row_to_periodic_stream)?;
        collect_ok(rows)
    }

    pub fn set_periodic_last_post_time(&self, stream_id: i64, now: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE periodic_posts SET last_post_time = ?2, updated_at = ?2 WHERE id = ?1",
            params![stream_id, now.to_rfc3339()],
        )?;
        Ok(())
    }

    // -- channels & accounts --------------------------------------------

    pub fn get_linked_account_by_phone(&self, phone: &str) -> Result<Option<LinkedAccount>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, phone, credential_string, is_main FROM linked_accounts WHERE phone = ?1",
            params![phone],
            row_to_linked_account,
        )
        .optional()
        .map_err(RelayError::from)
    }

    pub fn list_channels(&self) -> Result<Vec<Channel>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT channel_id, username, title, is_donor FROM channels")?;
        let rows = stmt.query_map([], row_to_channel)?;
        collect_ok(rows)
    }

    pub fn upsert_channel(&self, channel: &Channel) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO channels (channel_id, username, title, is_donor)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(channel_id) DO UPDATE SET
                username = excluded.username,
                title = excluded.title,
                is_donor = excluded.is_donor",
            params![
                channel.channel_id,
                channel.username,
                channel.title,
                channel.is_donor as i32
            ],
        )?;
        Ok(())
    }

    // -- licensing ---------------------------------------------------------

    /// `(expires_at, notice_3day_sent, notice_expired_sent)` for this
    /// tenant's single `info` row, if one has been created yet.
    pub fn get_license_info(&self) -> Result<Option<(Option<DateTime<Utc>>, bool, bool)>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT license_expires_at, license_notice_3day_sent, license_notice_expired_sent
             FROM info WHERE id = 1",
            [],
            |row| {
                let expires: Option<String> = row.get(0)?;
                let three_day: i32 = row.get(1)?;
                let expired: i32 = row.get(2)?;
                Ok((
                    expires.as_deref().map(parse_dt),
                    three_day != 0,
                    expired != 0,
                ))
            },
        )
        .optional()
        .map_err(RelayError::from)
    }

    pub fn mark_license_notice_3day_sent(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE info SET license_notice_3day_sent = 1 WHERE id = 1",
            [],
        )?;
        Ok(())
    }

    pub fn mark_license_notice_expired_sent(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE info SET license_notice_expired_sent = 1 WHERE id = 1",
            [],
        )?;
        Ok(())
    }

    /// The tenant's primary Telegram user id, used to route notice delivery.
    pub fn get_owner_user_id(&self) -> Result<Option<i64>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT user_id FROM info WHERE id = 1", [], |r| r.get(0))
            .optional()
            .map_err(RelayError::from)
    }

    // -- maintenance helpers (used by `relaycast-maintenance`) -----------

    /// Raw handle for maintenance operations that need statements this
    /// store doesn't otherwise expose (schema migration, JSON repair).
    pub fn with_conn<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&rusqlite::Connection) -> T,
    {
        let conn = self.conn.lock().unwrap();
        f(&conn)
    }
}

/// Column list shared by every slot SELECT, so the row-mapper index order
/// only has to be kept in sync with one string.
const SLOT_SELECT_COLUMNS: &str = "SELECT id, channel_id, content_type, content_payload, media_ref, scheduled_at,
                published, last_attempt_at, stream_ref, donors_snapshot, targets_snapshot,
                freshness_days, credential_ref, is_public_source";

fn collect_ok<T>(rows: rusqlite::MappedRows<'_, impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>>) -> Result<Vec<T>> {
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

fn row_to_slot(row: &rusqlite::Row<'_>) -> rusqlite::Result<Slot> {
    let content_type: String = row.get(2)?;
    let scheduled_at: String = row.get(5)?;
    let last_attempt_at: Option<String> = row.get(7)?;
    let donors_snapshot: Option<String> = row.get(9)?;
    let targets_snapshot: Option<String> = row.get(10)?;
    let is_public_source: Option<i32> = row.get(13)?;
    Ok(Slot {
        id: row.get(0)?,
        channel_id: row.get(1)?,
        content_type: content_type.parse().unwrap_or(ContentKind::Text),
        content_payload: row.get(3)?,
        media_ref: row.get(4)?,
        scheduled_at: parse_dt(&scheduled_at),
        published: row.get(6)?,
        last_attempt_at: last_attempt_at.as_deref().map(parse_dt),
        stream_ref: row.get(8)?,
        donors_snapshot: donors_snapshot.as_deref().map(parse_channel_refs),
        targets_snapshot: targets_snapshot.as_deref().map(parse_channel_refs),
        freshness_days: row.get(11)?,
        credential_ref: row.get(12)?,
        is_public_source: is_public_source.map(|v| v != 0),
    })
}

fn row_to_repost_stream(row: &rusqlite::Row<'_>) -> rusqlite::Result<RepostStream> {
    let donor_ref: String = row.get(1)?;
    let targets: String = row.get(2)?;
    let is_public_source: i32 = row.get(5)?;
    let active: i32 = row.get(7)?;
    Ok(RepostStream {
        id: row.get(0)?,
        donor_ref: parse_channel_refs(&donor_ref)
            .into_iter()
            .next()
            .unwrap_or(ChannelRef::Numeric(0)),
        targets: parse_channel_refs(&targets),
        last_seen_message_id: row.get(3)?,
        credential_ref: row.get(4)?,
        is_public_source: is_public_source != 0,
        freshness_days: row.get(6)?,
        active: active != 0,
    })
}

fn row_to_random_stream(row: &rusqlite::Row<'_>) -> rusqlite::Result<RandomStream> {
    let donors: String = row.get(1)?;
    let targets: String = row.get(2)?;
    let is_public_source: i32 = row.get(6)?;
    let active: i32 = row.get(7)?;
    let last_post_time: Option<String> = row.get(8)?;
    let upcoming: String = row.get(9)?;
    Ok(RandomStream {
        id: row.get(0)?,
        donors: parse_channel_refs(&donors),
        targets: parse_channel_refs(&targets),
        posts_per_day_per_target: row.get(3)?,
        freshness_days: row.get(4)?,
        credential_ref: row.get(5)?,
        is_public_source: is_public_source != 0,
        active: active != 0,
        last_post_time: last_post_time.as_deref().map(parse_dt),
        upcoming_slot_times: parse_timestamps(&upcoming),
    })
}

fn row_to_periodic_stream(row: &rusqlite::Row<'_>) -> rusqlite::Result<PeriodicStream> {
    let donor_ref: String = row.get(1)?;
    let targets: String = row.get(2)?;
    let last_post_time: Option<String> = row.get(3)?;
    let is_public_source: i32 = row.get(5)?;
    let active: i32 = row.get(6)?;
    Ok(PeriodicStream {
        id: row.get(0)?,
        donor_ref: parse_channel_refs(&donor_ref)
            .into_iter()
            .next()
            .unwrap_or(ChannelRef::Numeric(0)),
        targets: parse_channel_refs(&targets),
        last_post_time: last_post_time.as_deref().map(parse_dt),
        credential_ref: row.get(4)?,
        is_public_source: is_public_source != 0,
        active: active != 0,
    })
}

fn row_to_channel(row: &rusqlite::Row<'_>) -> rusqlite::Result<Channel> {
    let is_donor: i32 = row.get(3)?;
    Ok(Channel {
        channel_id: row.get(0)?,
        username: row.get(1)?,
        title: row.get(2)?,
        is_donor: is_donor != 0,
    })
}

fn row_to_linked_account(row: &rusqlite::Row<'_>) -> rusqlite::Result<LinkedAccount> {
    let is_main: i32 = row.get(3)?;
    Ok(LinkedAccount {
        id: row.get(0)?,
        phone: row.get(1)?,
        credential_string: row.get(2)?,
        is_main: is_main != 0,
    })
}

/// Parse an RFC3339 timestamp, defaulting to the Unix epoch on malformed
/// input rather than panicking — the maintenance sweep is responsible for
/// cleaning up rows that hit this path (spec §4.1 migration step iv/v).
fn parse_dt(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| DateTime::from_timestamp(0, 0).unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use relaycast_core::ContentKind;

    fn store() -> TenantStore {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        TenantStore::new(conn)
    }

    fn slot(store: &TenantStore, channel_id: i64) -> i64 {
        store
            .insert_slot(&NewSlot {
                channel_id,
                content_type: ContentKind::Random,
                content_payload: None,
                media_ref: None,
                scheduled_at: Utc::now(),
                stream_ref: None,
                donors_snapshot: None,
                targets_snapshot: None,
                freshness_days: None,
                credential_ref: None,
                is_public_source: None,
            })
            .unwrap()
    }

    #[test]
    fn reserve_slot_is_exclusive() {
        let s = store();
        let id = slot(&s, 100);
        assert!(s.reserve_slot(id).unwrap());
        // second reservation attempt loses the race (S6)
        assert!(!s.reserve_slot(id).unwrap());
    }

    #[test]
    fn release_then_reserve_again_succeeds() {
        let s = store();
        let id = slot(&s, 100);
        assert!(s.reserve_slot(id).unwrap());
        s.release_slot(id).unwrap();
        assert!(s.reserve_slot(id).unwrap());
    }

    #[test]
    fn dedup_reservation_is_unique_per_channel_fingerprint() {
        let s = store();
        let now = Utc::now();
        assert!(s.reserve_dedup(100, "abc", now).unwrap());
        assert!(!s.reserve_dedup(100, "abc", now).unwrap());
        // same fingerprint, different channel is independent
        assert!(s.reserve_dedup(200, "abc", now).unwrap());
    }

    #[test]
    fn release_dedup_clears_reservation_for_retry() {
        let s = store();
        let now = Utc::now();
        assert!(s.reserve_dedup(100, "abc", now).unwrap());
        s.release_dedup(100, "abc").unwrap();
        assert!(s.reserve_dedup(100, "abc", now).unwrap());
    }

    #[test]
    fn commit_marks_done_and_stamps_attempt() {
        let s = store();
        let id = slot(&s, 100);
        s.reserve_slot(id).unwrap();
        let now = Utc::now();
        s.commit_slot(id, now).unwrap();
        let due = s.list_due_random_slots(now + chrono::Duration::seconds(1), 10).unwrap();
        assert!(due.is_empty(), "committed slot must not be due again");
    }

    #[test]
    fn daily_cap_counts_only_recent_dedup_rows() {
        let s = store();
        let now = Utc::now();
        s.reserve_dedup(100, "a", now).unwrap();
        s.reserve_dedup(100, "b", now).unwrap();
        let since = now - chrono::Duration::hours(1);
        assert_eq!(s.count_dedup_since(100, since).unwrap(), 2);
        let since_future = now + chrono::Duration::hours(1);
        assert_eq!(s.count_dedup_since(100, since_future).unwrap(), 0);
    }
}
