use crate::types::Platform;
use std::env;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Live push feed URL (ws:// or wss://). Polling-only when unset.
    pub live_feed_url: Option<String>,
    /// Platform assumed for markets never announced via the subscribe hook.
    pub default_platform: Platform,
    /// Interval between incremental REST polls (seconds).
    pub api_poll_interval_secs: u64,
    /// Minimum time between emitted live updates per channel (ms).
    pub throttle_ms: u64,
    /// Maximum data points retained per channel cache.
    pub cache_capacity: usize,
    /// Time after which a cached point may be expired (seconds).
    pub cache_ttl_secs: u64,
    /// Markets to start tracking at boot.
    pub tracked_markets: Vec<(String, Platform)>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        // Parse boot-time markets from TRACKED_MARKETS env var
        // Format: "market_id|platform,market_id2|platform2"
        let tracked_markets = env::var("TRACKED_MARKETS")
            .ok()
            .map(|s| {
                s.split(',')
                    .filter_map(|market| {
                        let parts: Vec<&str> = market.split('|').collect();
                        if parts.len() == 2 {
                            Platform::from_str(parts[1]).map(|p| (parts[0].to_string(), p))
                        } else {
                            None
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        let default_platform = env::var("DEFAULT_PLATFORM")
            .ok()
            .and_then(|v| Platform::from_str(&v))
            .unwrap_or(Platform::Kalshi);

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3001),
            live_feed_url: env::var("LIVE_FEED_URL").ok(),
            default_platform,
            api_poll_interval_secs: env::var("API_POLL_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(600),
            throttle_ms: env::var("THROTTLE_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1000),
            cache_capacity: env::var("CACHE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            cache_ttl_secs: env::var("CACHE_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),
            tracked_markets,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
