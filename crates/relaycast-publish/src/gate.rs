use std::sync::Arc;

use dashmap::DashMap;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InputFile, MessageId, ParseMode};
use tokio::sync::{Mutex, Semaphore};
use tracing::{error, instrument, warn};

use relaycast_core::{ContentKind, PublishPayload, RelayError, Result};

/// Bounded-concurrency egress to the bot API (spec §4.5). A global semaphore
/// of 5 cushions rate limits; a per-channel lock ensures two publishes to the
/// same channel never interleave.
pub struct PublisherGate {
    bot: Bot,
    semaphore: Arc<Semaphore>,
    channel_locks: DashMap<i64, Arc<Mutex<()>>>,
}

const GLOBAL_CONCURRENCY: usize = 5;
/// Telegram captions are capped well below the 4096-char message limit.
const CAPTION_MAX: usize = 1024;

impl PublisherGate {
    pub fn new(bot: Bot) -> Self {
        Self {
            bot,
            semaphore: Arc::new(Semaphore::new(GLOBAL_CONCURRENCY)),
            channel_locks: DashMap::new(),
        }
    }

    fn lock_for(&self, channel_id: i64) -> Arc<Mutex<()>> {
        self.channel_locks
            .entry(channel_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Send `payload` to `target_channel_id`, serialized against any other
    /// in-flight publish to the same channel.
    #[instrument(skip(self, payload), fields(target_channel_id))]
    pub async fn publish(&self, payload: &PublishPayload, target_channel_id: i64) -> Result<()> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .expect("semaphore is never closed");
        let lock = self.lock_for(target_channel_id);
        let _guard = lock.lock().await;

        let chat = ChatId(target_channel_id);
        let result = match payload {
            PublishPayload::Forward {
                source_channel_id,
                source_message_id,
            } => self
                .bot
                .forward_message(chat, ChatId(*source_channel_id), MessageId(*source_message_id))
                .await
                .map(|_| ())
                .map_err(classify),
            PublishPayload::Content {
                kind,
                text,
                caption,
                media_bytes,
                media_file_id,
            } => {
                self.send_content(chat, *kind, text, caption, media_bytes, media_file_id)
                    .await
            }
        };

        result
    }

    async fn send_content(
        &self,
        chat: ChatId,
        kind: ContentKind,
        text: &Option<String>,
        caption: &Option<String>,
        media_bytes: &Option<Vec<u8>>,
        media_file_id: &Option<String>,
    ) -> Result<()> {
        let caption_text = resolve_caption(caption, text);
        let input = |bytes: &Option<Vec<u8>>, file_id: &Option<String>| -> Result<InputFile> {
            if let Some(id) = file_id {
                Ok(InputFile::file_id(id.clone()))
            } else if let Some(b) = bytes {
                Ok(InputFile::memory(b.clone()))
            } else {
                Err(RelayError::InvalidPayload("media slot has no bytes or file id".to_string()))
            }
        };

        match kind {
            ContentKind::Text => {
                let body = text.clone().unwrap_or_default();
                self.bot.send_message(chat, body).await.map_err(classify)?;
            }
            ContentKind::Photo => {
                let mut req = self.bot.send_photo(chat, input(media_bytes, media_file_id)?);
                if let Some(c) = caption_text {
                    req = req.caption(c).parse_mode(ParseMode::Html);
                }
                req.await.map_err(classify)?;
            }
            ContentKind::Video => {
                let mut req = self.bot.send_video(chat, input(media_bytes, media_file_id)?);
                if let Some(c) = caption_text {
                    req = req.caption(c).parse_mode(ParseMode::Html);
                }
                req.await.map_err(classify)?;
            }
            ContentKind::Document => {
                let mut req = self.bot.send_document(chat, input(media_bytes, media_file_id)?);
                if let Some(c) = caption_text {
                    req = req.caption(c);
                }
                req.await.map_err(classify)?;
            }
            ContentKind::Audio => {
                let mut req = self.bot.send_audio(chat, input(media_bytes, media_file_id)?);
                if let Some(c) = caption_text {
                    req = req.caption(c);
                }
                req.await.map_err(classify)?;
            }
            ContentKind::Voice => {
                self.bot
                    .send_voice(chat, input(media_bytes, media_file_id)?)
                    .await
                    .map_err(classify)?;
            }
            ContentKind::Sticker => {
                self.bot
                    .send_sticker(chat, input(media_bytes, media_file_id)?)
                    .await
                    .map_err(classify)?;
            }
            ContentKind::Repost | ContentKind::Random => {
                // Scheduling disciplines, not wire formats; by the time a
                // payload reaches the gate these have resolved to a concrete
                // kind or arrived as `PublishPayload::Forward`.
                return Err(RelayError::InvalidPayload(
                    "unresolved content kind reached the publisher gate".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Media with an empty caption falls back to the first 1024 chars of `text`
/// (spec §4.5).
fn resolve_caption(caption: &Option<String>, text: &Option<String>) -> Option<String> {
    match caption {
        Some(c) if !c.trim().is_empty() => Some(c.clone()),
        _ => text.as_ref().map(|t| truncate_chars(t, CAPTION_MAX)),
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

fn classify(err: teloxide::RequestError) -> RelayError {
    match &err {
        teloxide::RequestError::RetryAfter(seconds) => {
            let secs = seconds.duration().as_secs();
            error!(retry_after_secs = secs, "publish hit a flood wait");
            RelayError::RateLimited {
                retry_after_secs: secs,
            }
        }
        teloxide::RequestError::Api(api_err) => {
            warn!(error = %api_err, "publish rejected by bot API");
            RelayError::InvalidPayload(api_err.to_string())
        }
        other => {
            warn!(error = %other, "publish failed");
            RelayError::UpstreamUnavailable(other.to_string())
        }
    }
}
