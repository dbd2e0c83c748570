use std::path::Path;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use grammers_client::types::Downloadable;
use grammers_client::{Client, Config, InitParams};
use grammers_session::TextSession;
use tracing::warn;
use uuid::Uuid;

use relaycast_core::{ChannelRef, RelayError, Result};

use crate::types::{
    MediaRef, MediaRefInner, ReaderSession, ResolvedChat, UpstreamMedia, UpstreamMessage,
};

const MAX_HISTORY_LIMIT: usize = 100;

/// A live MTProto user session, backed by a file-persisted [`TextSession`].
///
/// One instance per credential string; owned exclusively by the Session
/// Pool (spec §4.2 — "Content Fetcher never constructs its own").
pub struct GrammersSession {
    client: Client,
}

impl GrammersSession {
    /// Connect using the session file at `session_path`. The file must
    /// already hold a valid authorization key — credential acquisition
    /// (phone/code/2FA onboarding) is out of scope for this subsystem.
    pub async fn connect(session_path: &Path, api_id: i32, api_hash: &str) -> Result<Self> {
        let session = TextSession::load(&session_path).map_err(|e| {
            RelayError::CredentialMissing(format!("{}: {e}", session_path.display()))
        })?;

        let client = Client::connect(Config {
            session: Box::new(session),
            api_id,
            api_hash: api_hash.to_string(),
            params: InitParams {
                catch_up: false,
                ..Default::default()
            },
        })
        .await
        .map_err(|e| RelayError::UpstreamUnavailable(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ReaderSession for GrammersSession {
    async fn resolve(&self, donor: &ChannelRef) -> Result<ResolvedChat> {
        let chat = match donor {
            ChannelRef::Numeric(id) => self
                .client
                .unpack_chat(*id)
                .await
                .map_err(|e| RelayError::UpstreamUnavailable(e.to_string()))?,
            ChannelRef::Handle(handle) => self
                .client
                .resolve_username(handle)
                .await
                .map_err(|e| RelayError::UpstreamUnavailable(e.to_string()))?
                .ok_or_else(|| RelayError::NotFound(format!("donor not found: @{handle}")))?,
        };
        Ok(ResolvedChat {
            id: chat.id(),
            title: Some(chat.name().to_string()),
        })
    }

    async fn history(&self, chat: &ResolvedChat, limit: usize) -> Result<Vec<UpstreamMessage>> {
        let limit = limit.min(MAX_HISTORY_LIMIT);
        let packed = self
            .client
            .unpack_chat(chat.id)
            .await
            .map_err(|e| RelayError::UpstreamUnavailable(e.to_string()))?;

        let mut iter = self.client.iter_messages(&packed).limit(limit);
        let mut out = Vec::with_capacity(limit);
        loop {
            match iter.next().await {
                Ok(Some(msg)) => {
                    let media = msg.media().map(|m| classify_media(m));
                    out.push(UpstreamMessage {
                        id: msg.id(),
                        date: Utc.timestamp_opt(msg.date().timestamp(), 0).single().unwrap_or_else(Utc::now),
                        text: msg.text().to_string(),
                        media,
                        media_group_id: msg.grouped_id(),
                    });
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "upstream history read failed");
                    break;
                }
            }
        }
        Ok(out)
    }

    async fn download(&self, media: &MediaRef) -> Result<Vec<u8>> {
        match &media.0 {
            MediaRefInner::Bytes(b) => Ok(b.clone()),
            MediaRefInner::Grammers(m) => {
                let tmp_path = std::env::temp_dir().join(format!("relaycast-{}.bin", Uuid::new_v4()));
                let downloadable = Downloadable::Media(m.clone());
                self.client
                    .download_media(&downloadable, &tmp_path)
                    .await
                    .map_err(|e| RelayError::UpstreamUnavailable(e.to_string()))?;
                let bytes = tokio::fs::read(&tmp_path).await;
                let _ = tokio::fs::remove_file(&tmp_path).await;
                Ok(bytes?)
            }
        }
    }

    async fn is_connected(&self) -> bool {
        // A lightweight round-trip; treated as disconnected on any error so
        // the Session Pool's GC pass evicts dead entries (spec §4.2).
        self.client.get_me().await.is_ok()
    }

    async fn disconnect(&self) {
        // `Client` has no explicit close; dropping the last `Arc` tears down
        // the sender task. Nothing to do beyond letting the pool drop us.
    }
}

fn classify_media(media: grammers_client::types::Media) -> UpstreamMedia {
    use grammers_client::types::Media;
    match &media {
        Media::Photo(_) => UpstreamMedia::Photo(MediaRef(MediaRefInner::Grammers(media.clone()))),
        Media::Document(doc) if doc.mime_type().is_some_and(|m| m.starts_with("video/")) => {
            UpstreamMedia::Video(MediaRef(MediaRefInner::Grammers(media.clone())))
        }
        _ => UpstreamMedia::Other,
    }
}
