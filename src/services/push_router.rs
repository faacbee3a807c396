use crate::services::bucketing::choose_timestamp;
use crate::services::{ChannelCache, ChannelConfig};
use crate::types::{
    clamp_unit, Candlestick, ChannelKey, ChannelMessage, ChannelPayload, DataPoint, Side,
    SideQuote, TickerUpdate, TimeRange,
};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// Routes push ticker updates from the live connection into per-channel
/// caches and the shared bus.
///
/// Each recognized update fans out to every (side x range) channel of the
/// referenced market; ranges nobody subscribed to simply drop the tick.
/// Emission is throttled per channel, but the cache write always happens.
pub struct PushRouter {
    cache: Arc<ChannelCache>,
    bus: broadcast::Sender<ChannelMessage>,
    channels: Arc<DashMap<String, Arc<ChannelConfig>>>,
}

impl PushRouter {
    pub fn new(
        cache: Arc<ChannelCache>,
        bus: broadcast::Sender<ChannelMessage>,
        channels: Arc<DashMap<String, Arc<ChannelConfig>>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            cache,
            bus,
            channels,
        })
    }

    /// Handle one raw message from the live connection. Messages that fail
    /// to parse or carry an unrecognized type are dropped, not errors.
    pub fn handle_message(&self, text: &str) {
        let update: TickerUpdate = match serde_json::from_str(text) {
            Ok(u) => u,
            Err(e) => {
                debug!("ignoring unparseable push message: {}", e);
                return;
            }
        };

        if update.msg_type != "ticker_update" {
            debug!("ignoring push message type {:?}", update.msg_type);
            return;
        }

        let TickerUpdate {
            market_id,
            summary_stats,
            timestamp,
            ..
        } = update;

        self.route_side(
            &market_id,
            Side::Yes,
            summary_stats.yes.unwrap_or_default(),
            timestamp,
        );
        self.route_side(
            &market_id,
            Side::No,
            summary_stats.no.unwrap_or_default(),
            timestamp,
        );
    }

    fn route_side(&self, market_id: &str, side: Side, quote: SideQuote, timestamp: f64) {
        // Midpoint of the book; 0.5 when one-sided or empty.
        let value = match (quote.bid, quote.ask) {
            (Some(bid), Some(ask)) => clamp_unit((bid + ask) / 2.0),
            _ => 0.5,
        };

        let candlestick = match (quote.open, quote.high, quote.low, quote.close) {
            (Some(open), Some(high), Some(low), Some(close)) => Some(Candlestick {
                open,
                high,
                low,
                close,
                time: timestamp as i64,
            }),
            _ => None,
        };

        let point = DataPoint {
            time: timestamp as i64,
            value,
            volume: quote.volume,
            candlestick,
        };

        for range in TimeRange::ALL {
            let bucketed = choose_timestamp(range, &point);
            let key = ChannelKey::generate(market_id, side, range);

            let config = match self.channels.get(&key) {
                Some(c) => c.clone(),
                None => {
                    debug!("no channel for {}, dropping tick", key);
                    continue;
                }
            };

            // The cache stays current even when emission is throttled.
            self.cache.add_data_point(&key, bucketed.clone());

            if config.try_emit() {
                let _ = self.bus.send(ChannelMessage {
                    channel: key,
                    payload: ChannelPayload::Update(bucketed),
                });
            } else {
                debug!("throttled update on {}", key);
            }
        }
    }
}
