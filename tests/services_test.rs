//! Unit tests for core services through the public crate surface

use omen::services::{bucket_time, choose_timestamp, ChannelCache, DEFAULT_CACHE_TTL};
use omen::types::{ChannelKey, DataPoint, Side, TimeRange};
use std::time::Duration;

#[test]
fn test_channel_key_round_trip_for_all_combinations() {
    for side in Side::ALL {
        for range in TimeRange::ALL {
            let key = ChannelKey::generate("KXBTC-25AUG", side, range);
            let parsed = ChannelKey::parse(&key).expect("round trip failed");
            assert_eq!(parsed.market_id, "KXBTC-25AUG");
            assert_eq!(parsed.side, side);
            assert_eq!(parsed.range, range);
        }
    }
}

#[test]
fn test_malformed_key_returns_none_not_panic() {
    assert!(ChannelKey::parse("onlyonepart").is_none());
    assert!(ChannelKey::parse("").is_none());
    assert!(ChannelKey::parse("a:b").is_none());
}

#[test]
fn test_cache_bound_holds_under_bucketed_writes() {
    let cache = ChannelCache::new(10, DEFAULT_CACHE_TTL);

    // Many raw samples collapsing into few buckets never grow the cache
    // beyond the bucket count, let alone the capacity.
    for raw in 0..600 {
        let point = choose_timestamp(TimeRange::OneHour, &DataPoint::new(raw, 0.5));
        cache.add_data_point("ch", point);
    }

    let data = cache.get_cached_data("ch");
    assert_eq!(data.len(), 10);
    for window in data.windows(2) {
        assert!(window[0].time < window[1].time);
    }
}

#[test]
fn test_intra_bucket_updates_coalesce_to_one_entry() {
    let cache = ChannelCache::new(300, DEFAULT_CACHE_TTL);

    let first = choose_timestamp(TimeRange::OneHour, &DataPoint::new(1000, 0.58));
    let second = choose_timestamp(TimeRange::OneHour, &DataPoint::new(1001, 0.62));
    assert_eq!(first.time, second.time);

    cache.add_data_point("ch", first);
    cache.add_data_point("ch", second);

    let data = cache.get_cached_data("ch");
    assert_eq!(data.len(), 1);
    // Last write wins within the bucket.
    assert_eq!(data[0].value, 0.62);
}

#[test]
fn test_bucket_time_matches_range_resolution() {
    let raw = 1_704_283_937; // 2024-01-03 12:12:17 UTC, a Wednesday

    assert_eq!(bucket_time(TimeRange::OneHour, raw) % 60, 0);
    assert_eq!(bucket_time(TimeRange::OneWeek, raw) % 3600, 0);
    assert_eq!(bucket_time(TimeRange::OneMonth, raw) % 86_400, 0);
    // Week buckets land on Monday 2024-01-01 00:00 UTC.
    assert_eq!(bucket_time(TimeRange::OneYear, raw), 1_704_067_200);
}

#[test]
fn test_retry_batch_produces_no_new_point_signals() {
    let cache = ChannelCache::new(300, DEFAULT_CACHE_TTL);

    let history = vec![DataPoint::new(60, 0.1), DataPoint::new(120, 0.2)];
    cache.set_initial_data("ch", &history);

    // A retried fetch of the same window admits nothing.
    let admitted = cache.add_data_points("ch", history);
    assert!(admitted.is_empty());

    // A later window admits only the genuinely new point.
    let admitted = cache.add_data_points(
        "ch",
        vec![DataPoint::new(120, 0.9), DataPoint::new(180, 0.3)],
    );
    assert_eq!(admitted.len(), 1);
    assert_eq!(admitted[0].time, 180);
}

#[test]
fn test_expired_entries_leave_latest_accessors_consistent() {
    let cache = ChannelCache::new(300, Duration::from_millis(10));
    cache.add_data_point("ch", DataPoint::new(60, 0.1));

    std::thread::sleep(Duration::from_millis(20));
    cache.add_data_point("ch", DataPoint::new(120, 0.2));

    assert_eq!(cache.get_latest_timestamp("ch"), 120);
    assert_eq!(cache.cache_stats("ch").size, 1);
}
