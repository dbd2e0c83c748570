use relaycast_core::{ContentKind, PublishPayload};
use relaycast_store::Slot;

/// Build the payload a one-shot slot publishes (spec §4.6.1). `repost`-kind
/// slots store their source as `"_{channel_id}_{message_id}"` and are
/// forwarded verbatim rather than reconstructed.
pub fn payload_for_slot(slot: &Slot) -> Option<PublishPayload> {
    if slot.content_type == ContentKind::Repost {
        return parse_forward_reference(slot.content_payload.as_deref()?);
    }

    Some(PublishPayload::Content {
        kind: slot.content_type,
        text: slot.content_payload.clone(),
        caption: None,
        media_bytes: None,
        media_file_id: slot.media_ref.clone(),
    })
}

fn parse_forward_reference(raw: &str) -> Option<PublishPayload> {
    let rest = raw.strip_prefix('_')?;
    let (channel_part, message_part) = rest.split_once('_')?;
    let source_channel_id: i64 = channel_part.parse().ok()?;
    let source_message_id: i32 = message_part.parse().ok()?;
    Some(PublishPayload::Forward {
        source_channel_id,
        source_message_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_repost_reference() {
        let payload = parse_forward_reference("_-100123_456").unwrap();
        match payload {
            PublishPayload::Forward {
                source_channel_id,
                source_message_id,
            } => {
                assert_eq!(source_channel_id, -100123);
                assert_eq!(source_message_id, 456);
            }
            _ => panic!("expected Forward"),
        }
    }

    #[test]
    fn rejects_malformed_reference() {
        assert!(parse_forward_reference("garbage").is_none());
    }
}
