use crate::types::{ChannelKey, ChannelMessage, Platform, Side, TimeRange};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// The shared, multicast live stream of one channel: a forwarding task that
/// filters the global bus down to this channel and deduplicates repeats.
pub(crate) struct LivePipeline {
    pub tx: broadcast::Sender<ChannelMessage>,
    pub task: JoinHandle<()>,
}

/// Live state of one channel.
///
/// Channel configs persist for the life of the process once created; only
/// the shared live pipeline is torn down and recreated as the subscriber
/// count drops to and rises from zero.
pub struct ChannelConfig {
    pub market_id: String,
    pub side: Side,
    pub range: TimeRange,
    pub platform: Platform,
    pub poll_interval: Duration,
    throttle_ms: AtomicU64,
    last_emission_ms: AtomicI64,
    pub last_poll_ts: AtomicI64,
    pub polling_active: AtomicBool,
    pub subscriber_count: AtomicUsize,
}

impl ChannelConfig {
    pub fn new(
        market_id: &str,
        side: Side,
        range: TimeRange,
        platform: Platform,
        throttle_ms: u64,
        poll_interval: Duration,
    ) -> Self {
        Self {
            market_id: market_id.to_string(),
            side,
            range,
            platform,
            poll_interval,
            throttle_ms: AtomicU64::new(throttle_ms),
            last_emission_ms: AtomicI64::new(0),
            last_poll_ts: AtomicI64::new(0),
            polling_active: AtomicBool::new(false),
            subscriber_count: AtomicUsize::new(0),
        }
    }

    /// The encoded key identifying this channel.
    pub fn key(&self) -> String {
        ChannelKey::generate(&self.market_id, self.side, self.range)
    }

    pub fn throttle_ms(&self) -> u64 {
        self.throttle_ms.load(Ordering::Relaxed)
    }

    pub fn set_throttle(&self, throttle_ms: u64) {
        self.throttle_ms.store(throttle_ms, Ordering::Relaxed);
    }

    /// Throttle gate for push-driven emission: returns true and records the
    /// emission time when at least `throttle_ms` has elapsed since the last
    /// one. Cache writes are never gated, only bus emission.
    pub fn try_emit(&self) -> bool {
        let now = chrono::Utc::now().timestamp_millis();
        let last = self.last_emission_ms.load(Ordering::Relaxed);
        if now - last < self.throttle_ms.load(Ordering::Relaxed) as i64 {
            return false;
        }
        self.last_emission_ms.store(now, Ordering::Relaxed);
        true
    }

    /// Record a completed poll cycle.
    pub fn record_poll(&self, ts: i64) {
        self.last_poll_ts.store(ts, Ordering::Relaxed);
    }
}
