use std::fmt;

use serde::{Deserialize, Serialize};

/// A reference to a Telegram chat as it appears in donor/target lists.
///
/// Persisted as JSON (see spec §9 "Dynamic JSON columns"); historical rows
/// may instead hold a bare comma-separated list, which the store's migration
/// pass rewrites into this shape on first read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChannelRef {
    Numeric(i64),
    Handle(String),
}

impl ChannelRef {
    /// Parse `@username`, a bare numeric id (string or already-int), or a
    /// bare name, normalising to one of the two variants.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Ok(n) = trimmed.parse::<i64>() {
            return ChannelRef::Numeric(n);
        }
        let handle = trimmed.strip_prefix('@').unwrap_or(trimmed);
        ChannelRef::Handle(handle.to_string())
    }
}

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelRef::Numeric(n) => write!(f, "{n}"),
            ChannelRef::Handle(h) => write!(f, "@{h}"),
        }
    }
}

/// The kind of payload a slot carries, or that a repost/periodic publication
/// produces. `Repost` and `Random` are scheduling disciplines, not wire
/// formats — by the time a payload reaches the Publisher Gate it has been
/// resolved to one of the concrete media kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Text,
    Photo,
    Video,
    Document,
    Audio,
    Voice,
    Sticker,
    Repost,
    Random,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Text => "text",
            ContentKind::Photo => "photo",
            ContentKind::Video => "video",
            ContentKind::Document => "document",
            ContentKind::Audio => "audio",
            ContentKind::Voice => "voice",
            ContentKind::Sticker => "sticker",
            ContentKind::Repost => "repost",
            ContentKind::Random => "random",
        }
    }
}

impl std::str::FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "text" => Ok(ContentKind::Text),
            "photo" => Ok(ContentKind::Photo),
            "video" => Ok(ContentKind::Video),
            "document" => Ok(ContentKind::Document),
            "audio" => Ok(ContentKind::Audio),
            "voice" => Ok(ContentKind::Voice),
            "sticker" => Ok(ContentKind::Sticker),
            "repost" => Ok(ContentKind::Repost),
            "random" => Ok(ContentKind::Random),
            other => Err(format!("unknown content kind: {other}")),
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tri-state publication status of a slot (spec §3: Slot.published).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotStatus {
    Pending = 0,
    Reserved = -1,
    Done = 1,
}

impl SlotStatus {
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            0 => Some(SlotStatus::Pending),
            -1 => Some(SlotStatus::Reserved),
            1 => Some(SlotStatus::Done),
            _ => None,
        }
    }
}

/// A candidate post materialised by the Content Fetcher, ready for
/// fingerprinting and publication.
#[derive(Debug, Clone)]
pub struct CandidatePost {
    pub kind: ContentKind,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub media_bytes: Option<Vec<u8>>,
    /// Source message id, kept for repost-style forwarding and logging.
    pub source_message_id: Option<i32>,
}

impl CandidatePost {
    pub fn text_only(kind: ContentKind, text: Option<String>) -> Self {
        Self {
            kind,
            text,
            caption: None,
            media_bytes: None,
            source_message_id: None,
        }
    }
}

/// What the Publisher Gate actually sends. `Forward` carries a source
/// reference rather than a reconstructed payload — a `repost`-kind slot is
/// forwarded verbatim, never re-rendered (spec §4.6.1).
#[derive(Debug, Clone)]
pub enum PublishPayload {
    Content {
        kind: ContentKind,
        text: Option<String>,
        caption: Option<String>,
        media_bytes: Option<Vec<u8>>,
        /// A previously-uploaded Telegram file id, used by manually created
        /// one-shot slots that reference media without carrying its bytes.
        media_file_id: Option<String>,
    },
    Forward {
        source_channel_id: i64,
        source_message_id: i32,
    },
}

impl PublishPayload {
    pub fn from_candidate(post: CandidatePost) -> Self {
        PublishPayload::Content {
            kind: post.kind,
            text: post.text,
            caption: post.caption,
            media_bytes: post.media_bytes,
            media_file_id: None,
        }
    }
}
