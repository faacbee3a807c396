use serde::{Deserialize, Serialize};

/// Bid/ask/volume summary for one outcome side of a push ticker update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SideQuote {
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub volume: Option<f64>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
}

/// Per-side summary stats carried by a ticker update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummaryStats {
    #[serde(default)]
    pub yes: Option<SideQuote>,
    #[serde(default)]
    pub no: Option<SideQuote>,
}

/// Inbound push message from the live connection.
///
/// Only `type = "ticker_update"` is acted upon; anything else is dropped.
#[derive(Debug, Clone, Deserialize)]
pub struct TickerUpdate {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub market_id: String,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub summary_stats: SummaryStats,
    pub timestamp: f64,
}

/// Message from a dashboard client over the WebSocket endpoint.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe {
        market_id: String,
        side: String,
        range: String,
    },
    Unsubscribe {
        market_id: String,
        side: String,
        range: String,
    },
    Replay {
        market_id: String,
        side: String,
        range: String,
    },
}

/// Control message sent back to a dashboard client.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Subscribed { channel: String },
    Unsubscribed { channel: String },
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticker_update_deserialization() {
        let json = r#"{
            "type": "ticker_update",
            "market_id": "MKT1",
            "platform": "kalshi",
            "summary_stats": {
                "yes": {"bid": 0.58, "ask": 0.62, "volume": 5},
                "no": {"bid": 0.38, "ask": 0.42, "volume": 3}
            },
            "timestamp": 1000.9
        }"#;

        let update: TickerUpdate = serde_json::from_str(json).unwrap();
        assert_eq!(update.msg_type, "ticker_update");
        assert_eq!(update.market_id, "MKT1");
        let yes = update.summary_stats.yes.unwrap();
        assert_eq!(yes.bid, Some(0.58));
        assert_eq!(yes.volume, Some(5.0));
    }

    #[test]
    fn test_ticker_update_tolerates_missing_sides() {
        let json = r#"{"type": "ticker_update", "market_id": "MKT1", "timestamp": 12.0}"#;
        let update: TickerUpdate = serde_json::from_str(json).unwrap();
        assert!(update.summary_stats.yes.is_none());
        assert!(update.summary_stats.no.is_none());
    }

    #[test]
    fn test_client_message_subscribe() {
        let json = r#"{"type": "subscribe", "market_id": "MKT1", "side": "yes", "range": "1H"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, ClientMessage::Subscribe { .. }));
    }
}
