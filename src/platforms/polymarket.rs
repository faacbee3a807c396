use super::{decode_candles, market_string_id, CandleHistoryResponse, FetchKind, PlatformParser};
use crate::services::ChannelConfig;
use crate::types::{DataPoint, Platform, Side};

const POLYMARKET_API_URL: &str = "https://clob.polymarket.com";

/// Polymarket history parser. Prices are already [0, 1] fractions.
pub struct PolymarketParser;

impl PlatformParser for PolymarketParser {
    fn platform(&self) -> Platform {
        Platform::Polymarket
    }

    fn build_api_url(
        &self,
        config: &ChannelConfig,
        kind: FetchKind,
        since: Option<i64>,
    ) -> String {
        let (start_ts, end_ts) = self.calculate_time_range(config.range, kind, since);
        format!(
            "{}/markets/{}/prices-history?start_ts={}&end_ts={}",
            POLYMARKET_API_URL,
            market_string_id(config),
            start_ts,
            end_ts
        )
    }

    fn parse_historical_data(
        &self,
        response: &CandleHistoryResponse,
        side: Side,
    ) -> Vec<DataPoint> {
        decode_candles(response, side, 1.0)
    }
}
