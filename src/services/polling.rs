use crate::platforms::{parser_for, CandleHistoryResponse, FetchKind};
use crate::services::{ChannelCache, ChannelConfig};
use crate::types::{ChannelMessage, ChannelPayload, DataPoint};
use dashmap::DashMap;
use reqwest::Client;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Per-channel REST polling: one initial history fetch that seeds the cache,
/// then a recurring incremental poll from the cache's latest timestamp.
///
/// Fetch failures of every class (network, non-2xx, rejected payload) are
/// logged and absorbed; a failed initial fetch still arms polling so the
/// channel recovers on a later cycle.
pub struct PollingEngine {
    client: Client,
    cache: Arc<ChannelCache>,
    bus: broadcast::Sender<ChannelMessage>,
    tasks: DashMap<String, JoinHandle<()>>,
    destroyed: AtomicBool,
}

impl PollingEngine {
    /// Create a new polling engine publishing onto the shared bus.
    pub fn new(cache: Arc<ChannelCache>, bus: broadcast::Sender<ChannelMessage>) -> Arc<Self> {
        let client = Client::builder()
            .user_agent("Omen/1.0 (Prediction Market Streaming)")
            .build()
            .unwrap_or_else(|_| Client::new());

        Arc::new(Self {
            client,
            cache,
            bus,
            tasks: DashMap::new(),
            destroyed: AtomicBool::new(false),
        })
    }

    /// Fetch a channel's initial history, seed the cache, emit one
    /// `initial_data` message, and start the polling loop. Polling is armed
    /// even when the fetch fails or returns nothing.
    pub async fn fetch_initial_data(self: &Arc<Self>, key: &str, config: &Arc<ChannelConfig>) {
        match self.fetch_points(config, FetchKind::Initial, None).await {
            Ok(points) if !points.is_empty() => {
                self.cache.set_initial_data(key, &points);
                config.record_poll(chrono::Utc::now().timestamp());

                let snapshot = self.cache.get_cached_data(key);
                info!("seeded {} history points for {}", snapshot.len(), key);
                let _ = self.bus.send(ChannelMessage {
                    channel: key.to_string(),
                    payload: ChannelPayload::InitialData(snapshot),
                });
            }
            Ok(_) => {
                debug!("no initial history for {}", key);
            }
            Err(e) => {
                warn!("initial fetch failed for {}: {}", key, e);
            }
        }

        self.start_polling(key, config);
    }

    /// Start the recurring poll for a channel. No-op if already polling or
    /// after teardown.
    pub fn start_polling(self: &Arc<Self>, key: &str, config: &Arc<ChannelConfig>) {
        if self.destroyed.load(Ordering::SeqCst) {
            return;
        }
        if config.polling_active.swap(true, Ordering::SeqCst) {
            return;
        }

        let engine = self.clone();
        let config = config.clone();
        let channel = key.to_string();
        let period = config.poll_interval;

        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            loop {
                interval.tick().await;
                engine.poll_once(&channel, &config).await;
            }
        });

        debug!("polling armed for {} every {:?}", key, period);
        if let Some(stale) = self.tasks.insert(key.to_string(), handle) {
            stale.abort();
        }
    }

    /// One incremental poll cycle. Failures skip the cycle without stopping
    /// the interval.
    async fn poll_once(&self, key: &str, config: &Arc<ChannelConfig>) {
        let since = match self.cache.get_latest_timestamp(key) {
            0 => None,
            ts => Some(ts),
        };

        match self.fetch_points(config, FetchKind::Update, since).await {
            Ok(points) => {
                config.record_poll(chrono::Utc::now().timestamp());
                let fresh = self.cache.add_data_points(key, points);
                if !fresh.is_empty() {
                    debug!("poll produced {} new points for {}", fresh.len(), key);
                }
                for point in fresh {
                    let _ = self.bus.send(ChannelMessage {
                        channel: key.to_string(),
                        payload: ChannelPayload::Update(point),
                    });
                }
            }
            Err(e) => {
                warn!("poll failed for {}: {}; retrying next cycle", key, e);
            }
        }
    }

    async fn fetch_points(
        &self,
        config: &ChannelConfig,
        kind: FetchKind,
        since: Option<i64>,
    ) -> anyhow::Result<Vec<DataPoint>> {
        let parser = parser_for(config.platform);
        let url = parser.build_api_url(config, kind, since);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("{} returned {}", config.platform, response.status());
        }

        let body: CandleHistoryResponse = response.json().await?;
        if !body.success {
            anyhow::bail!(
                "{} rejected request: {}",
                config.platform,
                body.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }

        Ok(parser.parse_historical_data(&body, config.side))
    }

    /// Stop polling for a channel. Safe to call when no interval is active.
    pub fn stop_polling(&self, key: &str, config: Option<&ChannelConfig>) {
        if let Some((_, handle)) = self.tasks.remove(key) {
            handle.abort();
            debug!("polling stopped for {}", key);
        }
        if let Some(config) = config {
            config.polling_active.store(false, Ordering::SeqCst);
        }
    }

    /// Number of channels with an active polling interval.
    pub fn active_count(&self) -> usize {
        self.tasks.len()
    }

    /// Abort every polling interval. Used only at full manager teardown.
    pub fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
        let keys: Vec<String> = self.tasks.iter().map(|e| e.key().clone()).collect();
        for key in keys {
            if let Some((_, handle)) = self.tasks.remove(&key) {
                handle.abort();
            }
        }
    }
}
