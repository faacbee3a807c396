use crate::types::DataPoint;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default maximum number of points retained per channel.
pub const DEFAULT_CACHE_CAPACITY: usize = 300;

/// Default age after which a cached point may be expired.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Size and timestamp span of one channel's cache.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest: Option<i64>,
}

struct CachedPoint {
    point: DataPoint,
    inserted_at: Instant,
}

#[derive(Default)]
struct ChannelEntry {
    points: HashMap<i64, CachedPoint>,
    // Insertion order of time keys, for FIFO eviction.
    order: VecDeque<i64>,
}

impl ChannelEntry {
    /// Insert or overwrite a point by its time key. Returns true if the key
    /// was new. An overwrite keeps the original FIFO position.
    fn insert(&mut self, point: DataPoint, capacity: usize, ttl: Duration) -> bool {
        let now = Instant::now();

        // Expire stale entries from the front before admitting new data.
        while let Some(&oldest) = self.order.front() {
            match self.points.get(&oldest) {
                Some(entry) if now.duration_since(entry.inserted_at) > ttl => {
                    self.points.remove(&oldest);
                    self.order.pop_front();
                }
                _ => break,
            }
        }

        let is_new = !self.points.contains_key(&point.time);
        if is_new {
            self.order.push_back(point.time);
        }
        self.points.insert(
            point.time,
            CachedPoint {
                point,
                inserted_at: now,
            },
        );

        while self.points.len() > capacity {
            match self.order.pop_front() {
                Some(evicted) => {
                    self.points.remove(&evicted);
                }
                None => break,
            }
        }

        is_new
    }
}

/// Bounded per-channel store of time-ordered data points.
///
/// Entries are keyed by bucketed timestamp, so repeated writes within one
/// bucket overwrite rather than grow the cache. Reads sort on demand; the
/// write path never reorders.
pub struct ChannelCache {
    channels: DashMap<String, ChannelEntry>,
    capacity: usize,
    ttl: Duration,
}

impl ChannelCache {
    /// Create a new cache with the given per-channel capacity and entry TTL.
    pub fn new(capacity: usize, ttl: Duration) -> Arc<Self> {
        Arc::new(Self {
            channels: DashMap::new(),
            capacity,
            ttl,
        })
    }

    /// Replace a channel's contents with a freshly fetched history.
    pub fn set_initial_data(&self, channel: &str, points: &[DataPoint]) {
        let mut entry = self.channels.entry(channel.to_string()).or_default();
        entry.points.clear();
        entry.order.clear();
        for point in points {
            entry.insert(point.clone(), self.capacity, self.ttl);
        }
    }

    /// Insert or overwrite a single point by its time key.
    pub fn add_data_point(&self, channel: &str, point: DataPoint) {
        let mut entry = self.channels.entry(channel.to_string()).or_default();
        entry.insert(point, self.capacity, self.ttl);
    }

    /// Insert a batch of points, skipping any whose time key is already
    /// present. Returns the points that were actually admitted, so a retried
    /// fetch of unchanged history produces no new-point signals.
    pub fn add_data_points(&self, channel: &str, points: Vec<DataPoint>) -> Vec<DataPoint> {
        let mut entry = self.channels.entry(channel.to_string()).or_default();
        let mut admitted = Vec::new();

        for point in points {
            if entry.points.contains_key(&point.time) {
                continue;
            }
            entry.insert(point.clone(), self.capacity, self.ttl);
            admitted.push(point);
        }

        admitted
    }

    /// Get all cached points for a channel, sorted ascending by time.
    pub fn get_cached_data(&self, channel: &str) -> Vec<DataPoint> {
        let entry = match self.channels.get(channel) {
            Some(e) => e,
            None => return Vec::new(),
        };

        let mut points: Vec<DataPoint> =
            entry.points.values().map(|c| c.point.clone()).collect();
        points.sort_by_key(|p| p.time);
        points
    }

    /// Get the most recent point for a channel.
    pub fn get_latest_data_point(&self, channel: &str) -> Option<DataPoint> {
        let entry = self.channels.get(channel)?;
        entry
            .points
            .values()
            .max_by_key(|c| c.point.time)
            .map(|c| c.point.clone())
    }

    /// Get the most recent timestamp for a channel, or 0 when empty.
    pub fn get_latest_timestamp(&self, channel: &str) -> i64 {
        self.channels
            .get(channel)
            .and_then(|entry| entry.points.keys().max().copied())
            .unwrap_or(0)
    }

    /// Check whether a channel has any cached points.
    pub fn has_data(&self, channel: &str) -> bool {
        self.channels
            .get(channel)
            .map(|entry| !entry.points.is_empty())
            .unwrap_or(false)
    }

    /// Get size and timestamp span for a channel.
    pub fn cache_stats(&self, channel: &str) -> CacheStats {
        let entry = match self.channels.get(channel) {
            Some(e) => e,
            None => {
                return CacheStats {
                    size: 0,
                    oldest: None,
                    newest: None,
                }
            }
        };

        CacheStats {
            size: entry.points.len(),
            oldest: entry.points.keys().min().copied(),
            newest: entry.points.keys().max().copied(),
        }
    }

    /// Drop all cached points for a channel.
    pub fn clear_channel(&self, channel: &str) {
        self.channels.remove(channel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> Arc<ChannelCache> {
        ChannelCache::new(DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL)
    }

    #[test]
    fn test_capacity_bound_holds_under_distinct_inserts() {
        let cache = ChannelCache::new(5, DEFAULT_CACHE_TTL);
        for t in 0..20 {
            cache.add_data_point("ch", DataPoint::new(t * 60, 0.5));
        }

        let data = cache.get_cached_data("ch");
        assert_eq!(data.len(), 5);
        // Oldest entries were evicted first.
        assert_eq!(data[0].time, 15 * 60);
    }

    #[test]
    fn test_overwrite_by_time_key_does_not_grow() {
        let cache = cache();
        cache.add_data_point("ch", DataPoint::new(960, 0.5));
        cache.add_data_point("ch", DataPoint::new(960, 0.7));

        let data = cache.get_cached_data("ch");
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].value, 0.7);
    }

    #[test]
    fn test_add_data_points_skips_existing_keys() {
        let cache = cache();
        cache.add_data_point("ch", DataPoint::new(60, 0.4));

        let admitted = cache.add_data_points(
            "ch",
            vec![
                DataPoint::new(60, 0.9),
                DataPoint::new(120, 0.5),
                DataPoint::new(180, 0.6),
            ],
        );

        assert_eq!(admitted.len(), 2);
        assert_eq!(admitted[0].time, 120);
        // The existing key was not overwritten by the batch path.
        assert_eq!(cache.get_cached_data("ch")[0].value, 0.4);
    }

    #[test]
    fn test_get_cached_data_sorts_on_read() {
        let cache = cache();
        cache.add_data_point("ch", DataPoint::new(180, 0.3));
        cache.add_data_point("ch", DataPoint::new(60, 0.1));
        cache.add_data_point("ch", DataPoint::new(120, 0.2));

        let times: Vec<i64> = cache.get_cached_data("ch").iter().map(|p| p.time).collect();
        assert_eq!(times, vec![60, 120, 180]);
    }

    #[test]
    fn test_set_initial_data_replaces_contents() {
        let cache = cache();
        cache.add_data_point("ch", DataPoint::new(60, 0.1));
        cache.set_initial_data("ch", &[DataPoint::new(120, 0.2), DataPoint::new(180, 0.3)]);

        let data = cache.get_cached_data("ch");
        assert_eq!(data.len(), 2);
        assert_eq!(data[0].time, 120);
    }

    #[test]
    fn test_latest_accessors_and_sentinels() {
        let cache = cache();
        assert_eq!(cache.get_latest_timestamp("ch"), 0);
        assert!(cache.get_latest_data_point("ch").is_none());
        assert!(!cache.has_data("ch"));

        cache.add_data_point("ch", DataPoint::new(60, 0.1));
        cache.add_data_point("ch", DataPoint::new(180, 0.3));

        assert_eq!(cache.get_latest_timestamp("ch"), 180);
        assert_eq!(cache.get_latest_data_point("ch").unwrap().time, 180);
        assert!(cache.has_data("ch"));
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = ChannelCache::new(DEFAULT_CACHE_CAPACITY, Duration::from_millis(10));
        cache.add_data_point("ch", DataPoint::new(60, 0.1));

        std::thread::sleep(Duration::from_millis(20));
        cache.add_data_point("ch", DataPoint::new(120, 0.2));

        let data = cache.get_cached_data("ch");
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].time, 120);
    }

    #[test]
    fn test_cache_stats() {
        let cache = cache();
        let empty = cache.cache_stats("ch");
        assert_eq!(empty.size, 0);
        assert!(empty.oldest.is_none());

        cache.add_data_point("ch", DataPoint::new(60, 0.1));
        cache.add_data_point("ch", DataPoint::new(180, 0.3));

        let stats = cache.cache_stats("ch");
        assert_eq!(stats.size, 2);
        assert_eq!(stats.oldest, Some(60));
        assert_eq!(stats.newest, Some(180));
    }

    #[test]
    fn test_clear_channel() {
        let cache = cache();
        cache.add_data_point("ch", DataPoint::new(60, 0.1));
        cache.clear_channel("ch");
        assert!(!cache.has_data("ch"));
    }

    #[test]
    fn test_channels_are_independent() {
        let cache = cache();
        cache.add_data_point("a", DataPoint::new(60, 0.1));
        cache.add_data_point("b", DataPoint::new(60, 0.2));

        assert_eq!(cache.get_cached_data("a").len(), 1);
        assert_eq!(cache.get_cached_data("b").len(), 1);
        cache.clear_channel("a");
        assert!(cache.has_data("b"));
    }
}
