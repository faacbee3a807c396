use super::{decode_candles, market_string_id, CandleHistoryResponse, FetchKind, PlatformParser};
use crate::services::ChannelConfig;
use crate::types::{DataPoint, Platform, Side};

const KALSHI_API_URL: &str = "https://api.kalshi.com/v1";

/// Kalshi history parser. Prices arrive in cents (0-100) and are normalized
/// to [0, 1] fractions.
pub struct KalshiParser;

impl PlatformParser for KalshiParser {
    fn platform(&self) -> Platform {
        Platform::Kalshi
    }

    fn build_api_url(
        &self,
        config: &ChannelConfig,
        kind: FetchKind,
        since: Option<i64>,
    ) -> String {
        let (start_ts, end_ts) = self.calculate_time_range(config.range, kind, since);
        format!(
            "{}/markets/{}/candlesticks?start_ts={}&end_ts={}",
            KALSHI_API_URL,
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
        decode_candles(response, side, 0.01)
    }
}
