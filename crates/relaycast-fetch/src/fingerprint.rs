use sha2::{Digest, Sha256};

use relaycast_core::CandidatePost;

const FIELD_TRUNCATE: usize = 300;
const FINGERPRINT_LEN: usize = 32;

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn hash_hex(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(digest)
}

/// SHA-256 of raw media bytes, truncated to 32 hex chars.
pub fn media_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(digest)[..FINGERPRINT_LEN].to_string()
}

/// Derive the per-channel dedup fingerprint for a candidate post (spec §4.4).
pub fn fingerprint(post: &CandidatePost) -> String {
    let caption = post.caption.as_deref().unwrap_or("");
    let text = post.text.as_deref().unwrap_or("");
    let media = post
        .media_bytes
        .as_deref()
        .map(media_hash)
        .unwrap_or_default();

    let input = format!(
        "{}|{}|{}|{}",
        post.kind.as_str(),
        truncate_chars(caption, FIELD_TRUNCATE),
        truncate_chars(text, FIELD_TRUNCATE),
        media,
    );
    hash_hex(&input)[..FINGERPRINT_LEN].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaycast_core::ContentKind;

    #[test]
    fn same_post_yields_same_fingerprint() {
        let post = CandidatePost {
            kind: ContentKind::Text,
            text: Some("hello world".to_string()),
            caption: None,
            media_bytes: None,
            source_message_id: Some(1),
        };
        assert_eq!(fingerprint(&post), fingerprint(&post));
    }

    #[test]
    fn differing_text_yields_differing_fingerprint() {
        let a = CandidatePost::text_only(ContentKind::Text, Some("a".to_string()));
        let b = CandidatePost::text_only(ContentKind::Text, Some("b".to_string()));
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn fingerprint_is_32_hex_chars() {
        let post = CandidatePost::text_only(ContentKind::Text, Some("x".to_string()));
        assert_eq!(fingerprint(&post).len(), FINGERPRINT_LEN);
        assert!(fingerprint(&post).chars().all(|c| c.is_ascii_hexdigit()));
    }
}
