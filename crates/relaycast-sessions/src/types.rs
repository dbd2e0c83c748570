use async_trait::async_trait;
use chrono::{DateTime, Utc};

use relaycast_core::{ChannelRef, Result};

/// A chat resolved from a [`ChannelRef`] — the handle returned by
/// `resolve_username`/`@id` lookups, cheap to clone and reuse for both
/// history reads and future requests against the same donor.
#[derive(Debug, Clone)]
pub struct ResolvedChat {
    pub id: i64,
    pub title: Option<String>,
}

/// The media kind carried by an upstream message, narrowed to what the
/// Content Fetcher cares about (spec §4.3 step 5: text/photo/video only).
#[derive(Debug, Clone)]
pub enum UpstreamMedia {
    Photo(MediaRef),
    Video(MediaRef),
    Other,
}

/// Opaque handle sufficient to download the bytes of a piece of media later;
/// concrete sessions fill this with whatever their backend needs (a file
/// location, a pre-fetched buffer, ...).
#[derive(Debug, Clone)]
pub struct MediaRef(pub MediaRefInner);

#[derive(Debug, Clone)]
pub enum MediaRefInner {
    /// Already-downloaded bytes (used by fakes/tests).
    Bytes(Vec<u8>),
    /// Grammers-backed reference; opaque outside `relaycast-sessions`.
    Grammers(grammers_client::types::Media),
}

/// A single message read from a donor's history.
#[derive(Debug, Clone)]
pub struct UpstreamMessage {
    pub id: i32,
    pub date: DateTime<Utc>,
    pub text: String,
    pub media: Option<UpstreamMedia>,
    /// Telegram groups album items under a shared id (spec §4.3 step 6).
    pub media_group_id: Option<i64>,
}

/// Abstract capability consumed by the Content Fetcher and the RepostStream
/// poller: read history from, and download media from, a donor channel
/// using a specific upstream credential (spec §6 `UpstreamReader`).
#[async_trait]
pub trait ReaderSession: Send + Sync {
    /// Resolve `@username`, a numeric id, or a bare name to a concrete chat.
    async fn resolve(&self, donor: &ChannelRef) -> Result<ResolvedChat>;

    /// Read up to `limit` most recent messages, newest first.
    async fn history(&self, chat: &ResolvedChat, limit: usize) -> Result<Vec<UpstreamMessage>>;

    /// Download the bytes behind a [`MediaRef`].
    async fn download(&self, media: &MediaRef) -> Result<Vec<u8>>;

    /// Whether the underlying transport is still connected — used by the
    /// Session Pool's GC pass.
    async fn is_connected(&self) -> bool;

    /// Release the transport; called on pool shutdown or GC eviction.
    async fn disconnect(&self);
}
