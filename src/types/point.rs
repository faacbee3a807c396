use serde::{Deserialize, Serialize};

/// OHLC sub-record attached to a data point when the source provides it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candlestick {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub time: i64,
}

/// One observation on a channel: a bucketed timestamp (seconds since epoch)
/// and a normalized probability-like value in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub time: i64,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candlestick: Option<Candlestick>,
}

impl DataPoint {
    /// Create a data point with no volume or candlestick data.
    pub fn new(time: i64, value: f64) -> Self {
        Self {
            time,
            value,
            volume: None,
            candlestick: None,
        }
    }
}

/// Clamp a probability-like value into [0, 1].
pub fn clamp_unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}
