use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use relaycast_core::{ChannelRef, ContentKind};

/// A Telegram user account linked by the tenant, authenticated via an
/// opaque, confidential credential string (spec §3 LinkedAccount).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedAccount {
    pub id: i64,
    pub phone: String,
    pub credential_string: String,
    pub is_main: bool,
}

/// A published-to or read-from channel. `is_donor` is informational only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub channel_id: i64,
    pub username: Option<String>,
    pub title: Option<String>,
    pub is_donor: bool,
}

/// Identifies which credential a stream should read its donor(s) with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CredentialRef {
    /// Use the tenant-independent main credential.
    Public,
    /// Look up the linked account by phone within the tenant.
    Account(String),
}

impl CredentialRef {
    pub fn from_columns(is_public_source: bool, credential_ref: Option<String>) -> Self {
        if is_public_source {
            CredentialRef::Public
        } else {
            CredentialRef::Account(credential_ref.unwrap_or_default())
        }
    }

    pub fn is_public(&self) -> bool {
        matches!(self, CredentialRef::Public)
    }

    pub fn as_account(&self) -> Option<&str> {
        match self {
            CredentialRef::Account(phone) => Some(phone),
            CredentialRef::Public => None,
        }
    }
}

/// A continuous stream that republishes every new donor message into all
/// targets (spec §3 RepostStream).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepostStream {
    pub id: i64,
    pub donor_ref: ChannelRef,
    pub targets: Vec<ChannelRef>,
    pub last_seen_message_id: i32,
    pub credential_ref: Option<String>,
    pub is_public_source: bool,
    pub freshness_days: i64,
    pub active: bool,
}

impl RepostStream {
    pub fn credential(&self) -> CredentialRef {
        CredentialRef::from_columns(self.is_public_source, self.credential_ref.clone())
    }
}

/// Produces `posts_per_day_per_target` publications per target per day,
/// sampled from the donor set (spec §3 RandomStream).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomStream {
    pub id: i64,
    pub donors: Vec<ChannelRef>,
    pub targets: Vec<ChannelRef>,
    pub posts_per_day_per_target: i64,
    pub freshness_days: i64,
    pub credential_ref: Option<String>,
    pub is_public_source: bool,
    pub active: bool,
    pub last_post_time: Option<DateTime<Utc>>,
    pub upcoming_slot_times: Vec<DateTime<Utc>>,
}

impl RandomStream {
    pub fn credential(&self) -> CredentialRef {
        CredentialRef::from_columns(self.is_public_source, self.credential_ref.clone())
    }
}

/// Simpler stream variant: one random sample every 6 hours, fixed 7-day
/// freshness (spec §3 PeriodicStream, §9 open question — left as constants).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodicStream {
    pub id: i64,
    pub donor_ref: ChannelRef,
    pub targets: Vec<ChannelRef>,
    pub last_post_time: Option<DateTime<Utc>>,
    pub credential_ref: Option<String>,
    pub is_public_source: bool,
    pub active: bool,
}

impl PeriodicStream {
    pub fn credential(&self) -> CredentialRef {
        CredentialRef::from_columns(self.is_public_source, self.credential_ref.clone())
    }
}

/// Unit of scheduled work (spec §3 Slot). `published` is tri-state: see
/// `relaycast_core::types::SlotStatus`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub id: i64,
    pub channel_id: i64,
    pub content_type: ContentKind,
    pub content_payload: Option<String>,
    pub media_ref: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub published: i32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub stream_ref: Option<i64>,
    pub donors_snapshot: Option<Vec<ChannelRef>>,
    pub targets_snapshot: Option<Vec<ChannelRef>>,
    pub freshness_days: Option<i64>,
    pub credential_ref: Option<String>,
    pub is_public_source: Option<bool>,
}

impl Slot {
    pub fn credential(&self) -> CredentialRef {
        CredentialRef::from_columns(
            self.is_public_source.unwrap_or(false),
            self.credential_ref.clone(),
        )
    }
}

/// `{channel_id, fingerprint)` with a UNIQUE index, used to enforce I1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupRecord {
    pub channel_id: i64,
    pub fingerprint: String,
    pub published_at: DateTime<Utc>,
}

/// Fields needed to insert a freshly materialised slot (backfill, one-shot
/// creation by the operator UI, etc).
#[derive(Debug, Clone)]
pub struct NewSlot {
    pub channel_id: i64,
    pub content_type: ContentKind,
    pub content_payload: Option<String>,
    pub media_ref: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub stream_ref: Option<i64>,
    pub donors_snapshot: Option<Vec<ChannelRef>>,
    pub targets_snapshot: Option<Vec<ChannelRef>>,
    pub freshness_days: Option<i64>,
    pub credential_ref: Option<String>,
    pub is_public_source: Option<bool>,
}
