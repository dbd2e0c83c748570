use std::collections::HashMap;

use chrono::{Duration, Utc};
use rand::seq::SliceRandom;
use tracing::{instrument, warn};

use relaycast_core::{CandidatePost, ChannelRef, ContentKind, Result};
use relaycast_sessions::{ReaderSession, UpstreamMedia, UpstreamMessage};

use crate::links::clean_telegram_links;

const HISTORY_LIMIT: usize = 100;

/// A message filtered down to the kinds the fetcher can publish, paired with
/// the caption it will carry once album coalescing has picked a winner.
struct Candidate {
    message: UpstreamMessage,
    kind: ContentKind,
}

/// Produce one randomly selected candidate post from a donor's recent
/// history, or `None` if nothing passes the freshness/content filters
/// (spec §4.3). Never raises on a reachable-but-empty donor; upstream
/// failures are logged and also surface as `None` to the caller so a
/// single bad donor never aborts a retry loop.
#[instrument(skip(session), fields(donor = %donor))]
pub async fn fetch_random(
    session: &dyn ReaderSession,
    donor: &ChannelRef,
    freshness_days: i64,
) -> Result<Option<CandidatePost>> {
    let chat = match session.resolve(donor).await {
        Ok(chat) => chat,
        Err(e) => {
            warn!(error = %e, "donor resolution failed");
            return Ok(None);
        }
    };

    let messages = match session.history(&chat, HISTORY_LIMIT).await {
        Ok(m) => m,
        Err(e) => {
            warn!(error = %e, "donor history read failed");
            return Ok(None);
        }
    };

    let cutoff = Utc::now() - Duration::days(freshness_days.max(0));
    let mut fresh = Vec::with_capacity(messages.len());
    for msg in messages {
        if msg.date < cutoff {
            break;
        }
        fresh.push(msg);
    }

    let candidates: Vec<Candidate> = fresh
        .into_iter()
        .filter_map(|msg| classify(msg))
        .collect();

    let coalesced = coalesce_albums(candidates);
    if coalesced.is_empty() {
        return Ok(None);
    }

    let chosen = coalesced
        .choose(&mut rand::thread_rng())
        .expect("non-empty checked above");

    Ok(Some(materialize(session, chosen).await?))
}

fn classify(message: UpstreamMessage) -> Option<Candidate> {
    let kind = match &message.media {
        Some(UpstreamMedia::Photo(_)) => ContentKind::Photo,
        Some(UpstreamMedia::Video(_)) => ContentKind::Video,
        Some(UpstreamMedia::Other) => return None,
        None if !message.text.trim().is_empty() => ContentKind::Text,
        None => return None,
    };
    Some(Candidate { message, kind })
}

/// Coalesce messages sharing a `media_group_id` into a single representative
/// candidate, preferring the element carrying a caption (spec §4.3 step 6).
fn coalesce_albums(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut groups: HashMap<i64, Vec<Candidate>> = HashMap::new();
    let mut singles = Vec::new();

    for c in candidates {
        match c.message.media_group_id {
            Some(gid) => groups.entry(gid).or_default().push(c),
            None => singles.push(c),
        }
    }

    for (_, mut members) in groups {
        members.sort_by(|a, b| {
            let a_captioned = !a.message.text.trim().is_empty();
            let b_captioned = !b.message.text.trim().is_empty();
            b_captioned.cmp(&a_captioned)
        });
        if let Some(winner) = members.into_iter().next() {
            singles.push(winner);
        }
    }

    singles
}

async fn materialize(session: &dyn ReaderSession, candidate: &Candidate) -> Result<CandidatePost> {
    let text = clean_telegram_links(&candidate.message.text);

    let (caption, media_bytes) = match &candidate.message.media {
        Some(UpstreamMedia::Photo(media_ref)) | Some(UpstreamMedia::Video(media_ref)) => {
            let bytes = session.download(media_ref).await?;
            (Some(text.clone()), Some(bytes))
        }
        _ => (None, None),
    };

    let text = if media_bytes.is_some() { None } else { Some(text) };

    Ok(CandidatePost {
        kind: candidate.kind,
        text,
        caption,
        media_bytes,
        source_message_id: Some(candidate.message.id),
    })
}
