use chrono::{DateTime, Duration, NaiveTime, TimeZone, Timelike, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use relaycast_core::ContentKind;
use relaycast_store::{NewSlot, RandomStream, TenantStore};
use tracing::{instrument, warn};

/// Keep `posts_per_day_per_target` pending future slots per `(stream, target)`
/// within today and tomorrow's windows (spec §4.6.5). Idempotent: only fills
/// the gap between existing pending slots and the configured quota.
#[instrument(skip(store))]
pub fn run(store: &TenantStore) {
    let streams = match store.list_active_random_streams() {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to list active random streams for backfill");
            return;
        }
    };

    for stream in streams {
        backfill_stream(store, &stream);
    }
}

fn backfill_stream(store: &TenantStore, stream: &RandomStream) {
    if stream.posts_per_day_per_target <= 0 || stream.targets.is_empty() {
        return;
    }

    let now = Utc::now();
    let today_end = day_end(now);
    let tomorrow_start = today_end + Duration::seconds(1);
    let tomorrow_end = day_end(tomorrow_start);

    for (index, target) in stream.targets.iter().enumerate() {
        let channel_id = match target {
            relaycast_core::ChannelRef::Numeric(id) => *id,
            relaycast_core::ChannelRef::Handle(_) => continue, // needs resolution elsewhere first
        };
        let per_target_offset = Duration::minutes(index as i64);

        backfill_window(
            store,
            stream,
            channel_id,
            now,
            today_end,
            per_target_offset,
            true,
        );
        backfill_window(
            store,
            stream,
            channel_id,
            tomorrow_start,
            tomorrow_end,
            per_target_offset,
            false,
        );
    }

    if let Err(e) = store.union_future_times(stream.id) {
        warn!(stream_id = stream.id, error = %e, "failed to recompute upcoming_slot_times");
    }
}

#[allow(clippy::too_many_arguments)]
fn backfill_window(
    store: &TenantStore,
    stream: &RandomStream,
    channel_id: i64,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    per_target_offset: Duration,
    clamp_min_future: bool,
) {
    let existing = match store.count_pending_random_slots_in_window(stream.id, channel_id, window_start, window_end) {
        Ok(n) => n,
        Err(e) => {
            warn!(stream_id = stream.id, channel_id, error = %e, "pending-slot count failed");
            return;
        }
    };

    let need = (stream.posts_per_day_per_target - existing).max(0) as usize;
    if need == 0 {
        return;
    }

    let budget_minutes = ((window_end - window_start).num_minutes()).max(1);
    let mut rng = rand::thread_rng();
    let offsets = pick_minute_offsets(need, budget_minutes, &mut rng);

    let min_future = if clamp_min_future {
        Some(Utc::now() + Duration::minutes(2))
    } else {
        None
    };

    for minute_offset in offsets {
        let second_offset = Duration::seconds(rng.gen_range(0..60));
        let mut scheduled_at = window_start + per_target_offset + Duration::minutes(minute_offset) + second_offset;

        if let Some(floor) = min_future {
            if scheduled_at < floor {
                scheduled_at = floor;
            }
        }
        if scheduled_at > window_end {
            scheduled_at = window_end;
        }

        // A slot landing in the last minute of the day is pushed into
        // tomorrow's first 10 minutes instead, to avoid boundary clustering.
        if is_last_minute_of_day(scheduled_at) {
            let tomorrow_start = day_end(scheduled_at) + Duration::seconds(1);
            scheduled_at = tomorrow_start + Duration::minutes(rng.gen_range(0..10)) + Duration::seconds(rng.gen_range(0..60));
        }

        let slot = NewSlot {
            channel_id,
            content_type: ContentKind::Random,
            content_payload: None,
            media_ref: None,
            scheduled_at,
            stream_ref: Some(stream.id),
            donors_snapshot: Some(stream.donors.clone()),
            targets_snapshot: Some(stream.targets.clone()),
            freshness_days: Some(stream.freshness_days),
            credential_ref: stream.credential_ref.clone(),
            is_public_source: Some(stream.is_public_source),
        };

        if let Err(e) = store.insert_slot(&slot) {
            warn!(stream_id = stream.id, channel_id, error = %e, "failed to insert backfill slot");
        }
    }
}

/// Pick `need` minute offsets within `[0, budget_minutes)`. Uniform sampling
/// without replacement when there's enough room; an evenly spaced ladder
/// otherwise.
fn pick_minute_offsets(need: usize, budget_minutes: i64, rng: &mut impl Rng) -> Vec<i64> {
    if need == 0 {
        return Vec::new();
    }
    if (need as i64) <= budget_minutes {
        let mut pool: Vec<i64> = (0..budget_minutes).collect();
        pool.shuffle(rng);
        pool.truncate(need);
        pool.sort_unstable();
        pool
    } else {
        let step = budget_minutes as f64 / need as f64;
        (0..need).map(|i| (i as f64 * step) as i64).collect()
    }
}

fn day_end(at: DateTime<Utc>) -> DateTime<Utc> {
    let date = at.date_naive();
    Utc.from_utc_datetime(&date.and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap()))
}

fn is_last_minute_of_day(at: DateTime<Utc>) -> bool {
    at.time().hour() == 23 && at.time().minute() == 59
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pick_offsets_without_replacement_are_distinct() {
        let mut rng = rand::thread_rng();
        let offsets = pick_minute_offsets(5, 100, &mut rng);
        assert_eq!(offsets.len(), 5);
        let mut sorted = offsets.clone();
        sorted.dedup();
        assert_eq!(sorted.len(), offsets.len());
    }

    #[test]
    fn pick_offsets_ladder_when_need_exceeds_budget() {
        let mut rng = rand::thread_rng();
        let offsets = pick_minute_offsets(10, 5, &mut rng);
        assert_eq!(offsets.len(), 10);
        assert!(offsets.iter().all(|&o| o >= 0 && o <= 5));
    }
}
