pub mod kalshi;
pub mod polymarket;

pub use kalshi::KalshiParser;
pub use polymarket::PolymarketParser;

use crate::error::AppError;
use crate::services::ChannelConfig;
use crate::types::{clamp_unit, Candlestick, DataPoint, Platform, Side, TimeRange};
use serde::Deserialize;
use std::sync::Arc;

/// Which window a history request covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    /// First fetch for a channel, covering the range's full lookback window.
    Initial,
    /// Incremental fetch from a `since` cursor to now.
    Update,
}

/// History/update response envelope shared by the platform backends.
#[derive(Debug, Clone, Deserialize)]
pub struct CandleHistoryResponse {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub data: Option<CandleHistory>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandleHistory {
    #[serde(default)]
    pub candlesticks: Vec<PlatformCandle>,
}

/// One candlestick as delivered by a platform backend, with side-prefixed
/// price and OHLC fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlatformCandle {
    pub time: i64,
    #[serde(default)]
    pub yes_price: Option<f64>,
    #[serde(default)]
    pub yes_open: Option<f64>,
    #[serde(default)]
    pub yes_high: Option<f64>,
    #[serde(default)]
    pub yes_low: Option<f64>,
    #[serde(default)]
    pub yes_close: Option<f64>,
    #[serde(default)]
    pub no_price: Option<f64>,
    #[serde(default)]
    pub no_open: Option<f64>,
    #[serde(default)]
    pub no_high: Option<f64>,
    #[serde(default)]
    pub no_low: Option<f64>,
    #[serde(default)]
    pub no_close: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
}

impl PlatformCandle {
    fn side_fields(&self, side: Side) -> (Option<f64>, [Option<f64>; 4]) {
        match side {
            Side::Yes => (
                self.yes_price,
                [self.yes_open, self.yes_high, self.yes_low, self.yes_close],
            ),
            Side::No => (
                self.no_price,
                [self.no_open, self.no_high, self.no_low, self.no_close],
            ),
        }
    }
}

/// A platform-specific request builder and response decoder.
pub trait PlatformParser: Send + Sync {
    fn platform(&self) -> Platform;

    /// Construct the outbound request URL for a channel, embedding the
    /// composite market-string-id and the computed time window.
    fn build_api_url(&self, config: &ChannelConfig, kind: FetchKind, since: Option<i64>)
        -> String;

    /// Decode a platform response into generic data points for one side.
    /// Returns an empty vec, not an error, when the response lacks the
    /// expected shape.
    fn parse_historical_data(&self, response: &CandleHistoryResponse, side: Side)
        -> Vec<DataPoint>;

    /// Compute the `(start_ts, end_ts)` window for a request. Updates run
    /// from the supplied `since` cursor to now; initial fetches cover the
    /// range's fixed lookback window.
    fn calculate_time_range(
        &self,
        range: TimeRange,
        kind: FetchKind,
        since: Option<i64>,
    ) -> (i64, i64) {
        let now = chrono::Utc::now().timestamp();
        let start = match (kind, since) {
            (FetchKind::Update, Some(cursor)) => cursor,
            _ => now - range.initial_lookback_seconds(),
        };
        (start, now)
    }
}

/// The composite id the backends key history requests by.
pub(crate) fn market_string_id(config: &ChannelConfig) -> String {
    format!("{}&{}&{}", config.market_id, config.side, config.range)
}

/// Decode candlesticks into data points, scaling prices by `price_scale`
/// before clamping into [0, 1]. Candles missing the side's price are skipped.
pub(crate) fn decode_candles(
    response: &CandleHistoryResponse,
    side: Side,
    price_scale: f64,
) -> Vec<DataPoint> {
    let candles = match response.data {
        Some(ref data) => &data.candlesticks,
        None => return Vec::new(),
    };

    candles
        .iter()
        .filter_map(|candle| {
            let (price, ohlc) = candle.side_fields(side);
            let value = clamp_unit(price? * price_scale);

            let candlestick = match ohlc {
                [Some(open), Some(high), Some(low), Some(close)] => Some(Candlestick {
                    open: clamp_unit(open * price_scale),
                    high: clamp_unit(high * price_scale),
                    low: clamp_unit(low * price_scale),
                    close: clamp_unit(close * price_scale),
                    time: candle.time,
                }),
                _ => None,
            };

            Some(DataPoint {
                time: candle.time,
                value,
                volume: candle.volume,
                candlestick,
            })
        })
        .collect()
}

/// Resolve the parser for a platform. Total over the closed enum.
pub fn parser_for(platform: Platform) -> Arc<dyn PlatformParser> {
    match platform {
        Platform::Kalshi => Arc::new(KalshiParser),
        Platform::Polymarket => Arc::new(PolymarketParser),
    }
}

/// Resolve a parser from a platform name. An unknown name fails with a
/// named error rather than falling back to a default parser.
pub fn create_parser(name: &str) -> Result<Arc<dyn PlatformParser>, AppError> {
    match Platform::from_str(name) {
        Some(platform) => Ok(parser_for(platform)),
        None => Err(AppError::UnsupportedPlatform(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ChannelConfig;
    use std::time::Duration;

    fn config(platform: Platform, side: Side) -> ChannelConfig {
        ChannelConfig::new(
            "MKT1",
            side,
            TimeRange::OneHour,
            platform,
            1000,
            Duration::from_secs(600),
        )
    }

    fn response(candles: Vec<PlatformCandle>) -> CandleHistoryResponse {
        CandleHistoryResponse {
            success: true,
            error: None,
            data: Some(CandleHistory {
                candlesticks: candles,
            }),
        }
    }

    #[test]
    fn test_create_parser_resolves_known_platforms() {
        assert_eq!(create_parser("kalshi").unwrap().platform(), Platform::Kalshi);
        assert_eq!(
            create_parser("polymarket").unwrap().platform(),
            Platform::Polymarket
        );
    }

    #[test]
    fn test_create_parser_rejects_unknown_platform() {
        let err = create_parser("unsupported").err().unwrap();
        assert!(matches!(err, AppError::UnsupportedPlatform(_)));
        assert!(err.to_string().contains("unsupported"));
    }

    #[test]
    fn test_decode_skips_candles_missing_side_price() {
        let parser = parser_for(Platform::Polymarket);
        let resp = response(vec![
            PlatformCandle {
                time: 60,
                yes_price: Some(0.6),
                ..Default::default()
            },
            PlatformCandle {
                time: 120,
                no_price: Some(0.4),
                ..Default::default()
            },
        ]);

        let points = parser.parse_historical_data(&resp, Side::Yes);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].time, 60);
        assert_eq!(points[0].value, 0.6);
    }

    #[test]
    fn test_decode_missing_shape_is_empty_not_error() {
        let parser = parser_for(Platform::Kalshi);
        let resp = CandleHistoryResponse {
            success: true,
            error: None,
            data: None,
        };
        assert!(parser.parse_historical_data(&resp, Side::Yes).is_empty());
    }

    #[test]
    fn test_kalshi_prices_normalize_from_cents() {
        let parser = parser_for(Platform::Kalshi);
        let resp = response(vec![PlatformCandle {
            time: 60,
            yes_price: Some(62.0),
            yes_open: Some(58.0),
            yes_high: Some(64.0),
            yes_low: Some(55.0),
            yes_close: Some(62.0),
            volume: Some(10.0),
            ..Default::default()
        }]);

        let points = parser.parse_historical_data(&resp, Side::Yes);
        assert_eq!(points.len(), 1);
        assert!((points[0].value - 0.62).abs() < 1e-9);
        let candle = points[0].candlestick.unwrap();
        assert!((candle.open - 0.58).abs() < 1e-9);
        assert_eq!(points[0].volume, Some(10.0));
    }

    #[test]
    fn test_polymarket_prices_pass_through_clamped() {
        let parser = parser_for(Platform::Polymarket);
        let resp = response(vec![PlatformCandle {
            time: 60,
            no_price: Some(1.3),
            ..Default::default()
        }]);

        let points = parser.parse_historical_data(&resp, Side::No);
        assert_eq!(points[0].value, 1.0);
    }

    #[test]
    fn test_build_api_url_carries_composite_id_and_window() {
        for platform in [Platform::Kalshi, Platform::Polymarket] {
            let config = config(platform, Side::Yes);
            let parser = parser_for(platform);
            let url = parser.build_api_url(&config, FetchKind::Update, Some(12_345));

            assert!(url.contains("MKT1&yes&1H"), "missing composite id: {}", url);
            assert!(url.contains("start_ts=12345"), "missing cursor: {}", url);
            assert!(url.contains("end_ts="), "missing window end: {}", url);
        }
    }

    #[test]
    fn test_calculate_time_range_update_uses_since_cursor() {
        let parser = parser_for(Platform::Kalshi);
        let (start, end) = parser.calculate_time_range(TimeRange::OneHour, FetchKind::Update, Some(500));
        assert_eq!(start, 500);
        assert!(end >= start);
    }

    #[test]
    fn test_calculate_time_range_initial_lookbacks() {
        let parser = parser_for(Platform::Kalshi);
        for range in TimeRange::ALL {
            let (start, end) = parser.calculate_time_range(range, FetchKind::Initial, None);
            assert_eq!(end - start, range.initial_lookback_seconds());
        }
    }
}
