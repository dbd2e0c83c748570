//! JSON (de)serialisation helpers for the dynamic donor/target columns.
//!
//! Spec §9 requires tolerance of legacy comma-separated values; callers that
//! only ever read (never repair) a column go through [`parse_channel_refs`],
//! which degrades gracefully instead of failing the whole row.

use relaycast_core::ChannelRef;

/// Parse a `donors`/`targets` column. Tries JSON first; falls back to
/// splitting on commas (the legacy format); returns `[]` if both fail.
pub fn parse_channel_refs(raw: &str) -> Vec<ChannelRef> {
    if let Ok(parsed) = serde_json::from_str::<Vec<ChannelRef>>(raw) {
        return parsed;
    }
    if raw.trim().is_empty() {
        return Vec::new();
    }
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ChannelRef::parse)
        .collect()
}

pub fn encode_channel_refs(refs: &[ChannelRef]) -> String {
    serde_json::to_string(refs).unwrap_or_else(|_| "[]".to_string())
}

/// Parse an `upcoming_slot_times` column (JSON array of RFC3339 strings).
/// Malformed JSON degrades to an empty list rather than propagating an error
/// (a maintenance pass repairs the column on disk; see spec §4.1).
pub fn parse_timestamps(raw: &str) -> Vec<chrono::DateTime<chrono::Utc>> {
    serde_json::from_str::<Vec<String>>(raw)
        .unwrap_or_default()
        .iter()
        .filter_map(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .collect()
}

pub fn encode_timestamps(times: &[chrono::DateTime<chrono::Utc>]) -> String {
    let strs: Vec<String> = times.iter().map(|t| t.to_rfc3339()).collect();
    serde_json::to_string(&strs).unwrap_or_else(|_| "[]".to_string())
}
