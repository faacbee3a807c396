use crate::config::Config;
use crate::services::channel::LivePipeline;
use crate::services::{CacheStats, ChannelCache, ChannelConfig, PollingEngine, PushRouter};
use crate::types::{ChannelKey, ChannelMessage, ChannelPayload, DataPoint, Platform, Side, TimeRange};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A (market, side, range) triple naming one channel.
#[derive(Debug, Clone)]
pub struct ChannelSpec {
    pub market_id: String,
    pub side: Side,
    pub range: TimeRange,
}

/// Per-channel diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelStats {
    pub channel: String,
    pub platform: Platform,
    pub polling_active: bool,
    pub subscribers: usize,
    pub last_poll_ts: i64,
    pub cache: CacheStats,
}

/// Manager-wide diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct ManagerStats {
    pub channel_count: usize,
    pub polling_count: usize,
    pub connected: bool,
    pub channels: Vec<ChannelStats>,
}

/// A live subscription: the hydrated message stream plus its teardown handle.
pub struct Subscription {
    pub stream: mpsc::UnboundedReceiver<ChannelMessage>,
    pub handle: SubscriptionHandle,
}

/// Explicit teardown for one subscriber. Dropping the handle without calling
/// `unsubscribe` leaves the shared pipeline referenced.
pub struct SubscriptionHandle {
    manager: Arc<ChannelManager>,
    key: String,
    released: bool,
}

impl SubscriptionHandle {
    /// The channel this subscription is attached to.
    pub fn channel(&self) -> &str {
        &self.key
    }

    /// Decrement the channel's subscriber count; the last departure releases
    /// the shared live pipeline while cache and polling state survive.
    pub fn unsubscribe(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.manager.release(&self.key);
    }
}

/// Orchestrates the channel registry: creates channels on demand, wires them
/// to the polling engine and push router, and hands out hydrated,
/// reference-counted views of each channel's shared live stream.
pub struct ChannelManager {
    channels: Arc<DashMap<String, Arc<ChannelConfig>>>,
    pipelines: DashMap<String, LivePipeline>,
    cache: Arc<ChannelCache>,
    engine: Arc<PollingEngine>,
    router: Arc<PushRouter>,
    bus: broadcast::Sender<ChannelMessage>,
    /// Market -> platform bindings recorded by the subscribe hook.
    platforms: DashMap<String, Platform>,
    default_platform: Platform,
    default_throttle_ms: u64,
    poll_interval: Duration,
    status_tx: watch::Sender<bool>,
    connection: Mutex<Option<JoinHandle<()>>>,
    destroyed: AtomicBool,
}

impl ChannelManager {
    /// Create a new manager from configuration.
    pub fn new(config: &Config) -> Arc<Self> {
        let (bus, _) = broadcast::channel(1024);
        let cache = ChannelCache::new(
            config.cache_capacity,
            Duration::from_secs(config.cache_ttl_secs),
        );
        let channels: Arc<DashMap<String, Arc<ChannelConfig>>> = Arc::new(DashMap::new());
        let engine = PollingEngine::new(cache.clone(), bus.clone());
        let router = PushRouter::new(cache.clone(), bus.clone(), channels.clone());
        let (status_tx, _) = watch::channel(false);

        Arc::new(Self {
            channels,
            pipelines: DashMap::new(),
            cache,
            engine,
            router,
            bus,
            platforms: DashMap::new(),
            default_platform: config.default_platform,
            default_throttle_ms: config.throttle_ms,
            poll_interval: Duration::from_secs(config.api_poll_interval_secs),
            status_tx,
            connection: Mutex::new(None),
            destroyed: AtomicBool::new(false),
        })
    }

    /// Get the shared channel cache.
    pub fn cache(&self) -> Arc<ChannelCache> {
        self.cache.clone()
    }

    /// Subscribe to a channel, creating it (and fetching its initial
    /// history) if absent. The returned stream delivers a cache snapshot
    /// first, then live messages from the channel's shared pipeline.
    ///
    /// Dropping the receiver releases this subscriber's pipeline reference.
    pub fn subscribe(
        self: &Arc<Self>,
        market_id: &str,
        side: Side,
        range: TimeRange,
        throttle_ms: Option<u64>,
    ) -> mpsc::UnboundedReceiver<ChannelMessage> {
        self.subscribe_inner(market_id, side, range, throttle_ms, true)
    }

    /// Subscribe with an explicit teardown handle instead of drop-based
    /// release, so reference counting is observable and testable.
    pub fn subscribe_with_cleanup(
        self: &Arc<Self>,
        market_id: &str,
        side: Side,
        range: TimeRange,
        throttle_ms: Option<u64>,
    ) -> Subscription {
        let stream = self.subscribe_inner(market_id, side, range, throttle_ms, false);
        Subscription {
            stream,
            handle: SubscriptionHandle {
                manager: self.clone(),
                key: ChannelKey::generate(market_id, side, range),
                released: false,
            },
        }
    }

    fn subscribe_inner(
        self: &Arc<Self>,
        market_id: &str,
        side: Side,
        range: TimeRange,
        throttle_ms: Option<u64>,
        auto_release: bool,
    ) -> mpsc::UnboundedReceiver<ChannelMessage> {
        let (key, config) = self.ensure_channel(market_id, side, range);
        if let Some(ms) = throttle_ms {
            config.set_throttle(ms);
        }

        let live_tx = self.ensure_pipeline(&key);
        config.subscriber_count.fetch_add(1, Ordering::SeqCst);

        let (tx, rx) = mpsc::unbounded_channel();
        let mut live_rx = live_tx.subscribe();
        let manager = self.clone();
        let channel = key.clone();

        // The snapshot is looked up per subscription, at this moment, so a
        // late subscriber sees whatever history has accumulated by now.
        let snapshot = self.cache.get_cached_data(&key);

        tokio::spawn(async move {
            let mut open = true;
            if !snapshot.is_empty() {
                open = tx
                    .send(ChannelMessage {
                        channel: channel.clone(),
                        payload: ChannelPayload::InitialData(snapshot),
                    })
                    .is_ok();
            }

            while open {
                match live_rx.recv().await {
                    Ok(msg) => {
                        if tx.send(msg).is_err() {
                            open = false;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("subscriber on {} lagged by {} messages", channel, n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            if auto_release {
                manager.release(&channel);
            }
        });

        rx
    }

    /// Subscribe to several channels at once: ensures each exists and
    /// returns one bus view filtered to the union of their keys. No
    /// per-channel hydration on this path.
    pub fn subscribe_to_channels(
        self: &Arc<Self>,
        specs: &[ChannelSpec],
    ) -> mpsc::UnboundedReceiver<ChannelMessage> {
        let mut keys = HashSet::new();
        for spec in specs {
            let (key, _) = self.ensure_channel(&spec.market_id, spec.side, spec.range);
            keys.insert(key);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let mut bus_rx = self.bus.subscribe();

        tokio::spawn(async move {
            loop {
                match bus_rx.recv().await {
                    Ok(msg) => {
                        if keys.contains(&msg.channel) && tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("multi-channel view lagged by {} messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        rx
    }

    /// Eagerly create every (side x range) channel for a market the moment
    /// the dashboard subscribes to it, so the push router always has a
    /// channel ready for the first live tick.
    pub fn on_market_subscribed(self: &Arc<Self>, market_id: &str, platform: Platform) {
        self.platforms.insert(market_id.to_string(), platform);

        let mut created = 0;
        for side in Side::ALL {
            for range in TimeRange::ALL {
                if !self
                    .channels
                    .contains_key(&ChannelKey::generate(market_id, side, range))
                {
                    created += 1;
                }
                self.ensure_channel(market_id, side, range);
            }
        }

        info!(
            "tracking market {} on {} ({} new channels)",
            market_id, platform, created
        );
    }

    /// Re-emit a channel's current cache snapshot as an `initial_data`
    /// message, forcing subscribed consumers to refresh. Subscriber counts
    /// are unaffected; unknown channels are a no-op.
    pub fn replay(&self, market_id: &str, side: Side, range: TimeRange) {
        let key = ChannelKey::generate(market_id, side, range);
        if !self.channels.contains_key(&key) {
            debug!("replay requested for unknown channel {}", key);
            return;
        }

        let snapshot = self.cache.get_cached_data(&key);
        let _ = self.bus.send(ChannelMessage {
            channel: key,
            payload: ChannelPayload::InitialData(snapshot),
        });
    }

    /// Watch the live connection status.
    pub fn connection_status(&self) -> watch::Receiver<bool> {
        self.status_tx.subscribe()
    }

    /// Record a connection status change from the live feed.
    pub fn set_connected(&self, connected: bool) {
        self.status_tx.send_replace(connected);
    }

    /// Attach a live connection delivering raw push messages. Replaces any
    /// previously attached connection. Status turns false when the stream
    /// ends.
    pub fn set_connection(self: &Arc<Self>, mut messages: mpsc::UnboundedReceiver<String>) {
        self.detach_connection();

        let router = self.router.clone();
        let status = self.status_tx.clone();
        status.send_replace(true);

        let task = tokio::spawn(async move {
            while let Some(text) = messages.recv().await {
                router.handle_message(&text);
            }
            status.send_replace(false);
        });

        if let Ok(mut guard) = self.connection.lock() {
            *guard = Some(task);
        }
    }

    /// Detach the live connection, if any.
    pub fn detach_connection(&self) {
        if let Ok(mut guard) = self.connection.lock() {
            if let Some(task) = guard.take() {
                task.abort();
                self.status_tx.send_replace(false);
            }
        }
    }

    /// Route one raw push message into the router. Used by the live feed.
    pub fn route_push(&self, text: &str) {
        self.router.handle_message(text);
    }

    /// Markets announced via `on_market_subscribed`.
    pub fn tracked_markets(&self) -> Vec<String> {
        self.platforms.iter().map(|e| e.key().clone()).collect()
    }

    /// Get a channel's cache snapshot; empty for unknown channels.
    pub fn channel_cache(&self, market_id: &str, side: Side, range: TimeRange) -> Vec<DataPoint> {
        self.cache
            .get_cached_data(&ChannelKey::generate(market_id, side, range))
    }

    /// Stop polling for one channel; no-op on unknown keys.
    pub fn stop_channel_polling(&self, key: &str) {
        match self.channels.get(key) {
            Some(config) => self.engine.stop_polling(key, Some(config.value())),
            None => self.engine.stop_polling(key, None),
        }
    }

    /// Per-channel polling and cache diagnostics.
    pub fn stats(&self) -> ManagerStats {
        let channels: Vec<ChannelStats> = self
            .channels
            .iter()
            .map(|entry| {
                let config = entry.value();
                ChannelStats {
                    channel: entry.key().clone(),
                    platform: config.platform,
                    polling_active: config.polling_active.load(Ordering::SeqCst),
                    subscribers: config.subscriber_count.load(Ordering::SeqCst),
                    last_poll_ts: config.last_poll_ts.load(Ordering::Relaxed),
                    cache: self.cache.cache_stats(entry.key()),
                }
            })
            .collect();

        ManagerStats {
            channel_count: channels.len(),
            polling_count: self.engine.active_count(),
            connected: *self.status_tx.borrow(),
            channels,
        }
    }

    /// Terminal teardown: stops all polling, detaches the push connection,
    /// aborts every live pipeline, and clears the registry. Not resumable.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.engine.destroy();
        self.detach_connection();

        let keys: Vec<String> = self.pipelines.iter().map(|e| e.key().clone()).collect();
        for key in keys {
            if let Some((_, pipeline)) = self.pipelines.remove(&key) {
                pipeline.task.abort();
            }
        }

        self.channels.clear();
        self.platforms.clear();
        info!("channel manager destroyed");
    }

    /// Look up or create the channel for a triple. Creation kicks off the
    /// initial history fetch as a side effect.
    fn ensure_channel(
        self: &Arc<Self>,
        market_id: &str,
        side: Side,
        range: TimeRange,
    ) -> (String, Arc<ChannelConfig>) {
        let key = ChannelKey::generate(market_id, side, range);

        if let Some(existing) = self.channels.get(&key) {
            return (key, existing.clone());
        }

        let platform = self
            .platforms
            .get(market_id)
            .map(|p| *p.value())
            .unwrap_or(self.default_platform);

        match self.channels.entry(key.clone()) {
            Entry::Occupied(entry) => (key, entry.get().clone()),
            Entry::Vacant(slot) => {
                let config = Arc::new(ChannelConfig::new(
                    market_id,
                    side,
                    range,
                    platform,
                    self.default_throttle_ms,
                    self.poll_interval,
                ));
                slot.insert(config.clone());
                info!("created channel {} ({})", key, platform);

                let engine = self.engine.clone();
                let channel = key.clone();
                let fetch_config = config.clone();
                tokio::spawn(async move {
                    engine.fetch_initial_data(&channel, &fetch_config).await;
                });

                (key, config)
            }
        }
    }

    /// Look up or lazily create a channel's shared live pipeline: a task
    /// that filters the global bus to this channel, drops successive
    /// duplicate payloads, and multicasts to subscribers.
    fn ensure_pipeline(&self, key: &str) -> broadcast::Sender<ChannelMessage> {
        if let Some(pipeline) = self.pipelines.get(key) {
            return pipeline.tx.clone();
        }

        match self.pipelines.entry(key.to_string()) {
            Entry::Occupied(entry) => entry.get().tx.clone(),
            Entry::Vacant(slot) => {
                let (tx, _) = broadcast::channel(256);
                let mut bus_rx = self.bus.subscribe();
                let forward_tx = tx.clone();
                let channel = key.to_string();

                let task = tokio::spawn(async move {
                    let mut last: Option<ChannelMessage> = None;
                    loop {
                        match bus_rx.recv().await {
                            Ok(msg) => {
                                if msg.channel != channel {
                                    continue;
                                }
                                if last.as_ref() == Some(&msg) {
                                    continue;
                                }
                                last = Some(msg.clone());
                                let _ = forward_tx.send(msg);
                            }
                            Err(broadcast::error::RecvError::Lagged(n)) => {
                                warn!("pipeline for {} lagged by {} messages", channel, n);
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                });

                debug!("created live pipeline for {}", key);
                slot.insert(LivePipeline {
                    tx: tx.clone(),
                    task,
                });
                tx
            }
        }
    }

    /// Drop one subscriber reference; the last departure tears down the
    /// shared pipeline while the cache and polling state survive.
    pub(crate) fn release(&self, key: &str) {
        let Some(config) = self.channels.get(key) else {
            return;
        };

        let departed = config
            .subscriber_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| c.checked_sub(1));

        if departed == Ok(1) {
            if let Some((_, pipeline)) = self.pipelines.remove(key) {
                pipeline.task.abort();
                debug!("released live pipeline for {}", key);
            }
        }
    }
}
