use crate::services::ChannelManager;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{error, info, warn};

/// WebSocket client for the live ticker feed.
///
/// Maintains the connection with automatic reconnects, announces the tracked
/// markets after each connect, and hands every text frame to the manager's
/// push router. Connection status is mirrored into the manager's status
/// channel.
pub struct LiveFeed {
    url: String,
}

impl LiveFeed {
    /// Create a new live feed client.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Connect and keep receiving push updates, reconnecting on failure.
    pub async fn run(&self, manager: Arc<ChannelManager>) -> anyhow::Result<()> {
        loop {
            match self.run_connection(&manager).await {
                Ok(()) => warn!("live feed disconnected, reconnecting..."),
                Err(e) => error!("live feed error: {}, reconnecting...", e),
            }
            manager.set_connected(false);
            tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;
        }
    }

    async fn run_connection(&self, manager: &Arc<ChannelManager>) -> anyhow::Result<()> {
        info!("connecting to live feed at {}", self.url);
        let (ws_stream, _) = connect_async(self.url.as_str()).await?;
        let (mut write, mut read) = ws_stream.split();
        info!("connected to live feed");
        manager.set_connected(true);

        // Announce tracked markets so the feed starts pushing their tickers.
        let markets = manager.tracked_markets();
        if !markets.is_empty() {
            let subscribe = serde_json::json!({
                "type": "subscribe",
                "markets": markets,
            });
            write.send(Message::Text(subscribe.to_string())).await?;
        }

        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    manager.route_push(&text);
                }
                Ok(Message::Ping(data)) => {
                    let _ = write.send(Message::Pong(data)).await;
                }
                Ok(Message::Close(_)) => {
                    info!("live feed closed");
                    break;
                }
                Err(e) => {
                    error!("live feed read error: {}", e);
                    break;
                }
                _ => {}
            }
        }

        Ok(())
    }
}
