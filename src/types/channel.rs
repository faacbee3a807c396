use crate::types::DataPoint;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Separator between the segments of an encoded channel key.
///
/// Market ids containing this character would corrupt `ChannelKey::parse`;
/// the platforms currently supported do not use it in their identifiers.
pub const CHANNEL_KEY_SEPARATOR: char = ':';

/// One of the two binary outcomes of a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Yes,
    No,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Yes, Side::No];

    /// Get the side from a string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "yes" => Some(Side::Yes),
            "no" => Some(Side::No),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Yes => write!(f, "yes"),
            Side::No => write!(f, "no"),
        }
    }
}

/// Chart time-range view, controlling both bucket width and lookback window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "1H")]
    OneHour,
    #[serde(rename = "1W")]
    OneWeek,
    #[serde(rename = "1M")]
    OneMonth,
    #[serde(rename = "1Y")]
    OneYear,
}

impl TimeRange {
    pub const ALL: [TimeRange; 4] = [
        TimeRange::OneHour,
        TimeRange::OneWeek,
        TimeRange::OneMonth,
        TimeRange::OneYear,
    ];

    /// Get the range from a string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "1H" => Some(TimeRange::OneHour),
            "1W" => Some(TimeRange::OneWeek),
            "1M" => Some(TimeRange::OneMonth),
            "1Y" => Some(TimeRange::OneYear),
            _ => None,
        }
    }

    /// Get the bucket size in seconds for this range.
    pub fn bucket_seconds(&self) -> i64 {
        match self {
            TimeRange::OneHour => 60,        // 1-minute buckets
            TimeRange::OneWeek => 3600,      // 1-hour buckets
            TimeRange::OneMonth => 86_400,   // 1-day buckets
            TimeRange::OneYear => 604_800,   // 1-week buckets
        }
    }

    /// Lookback window in seconds for an initial history fetch.
    ///
    /// These constants are part of the backend contract; the window is wide
    /// enough to fill a chart at this range without over-fetching.
    pub fn initial_lookback_seconds(&self) -> i64 {
        match self {
            TimeRange::OneHour => 21_600,       // 6 hours
            TimeRange::OneWeek => 1_209_600,    // 14 days
            TimeRange::OneMonth => 5_184_000,   // 60 days
            TimeRange::OneYear => 31_536_000,   // 365 days
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeRange::OneHour => write!(f, "1H"),
            TimeRange::OneWeek => write!(f, "1W"),
            TimeRange::OneMonth => write!(f, "1M"),
            TimeRange::OneYear => write!(f, "1Y"),
        }
    }
}

/// External market platform identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Kalshi,
    Polymarket,
}

impl Platform {
    /// Get the platform from a string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "kalshi" => Some(Platform::Kalshi),
            "polymarket" => Some(Platform::Polymarket),
            _ => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Kalshi => write!(f, "kalshi"),
            Platform::Polymarket => write!(f, "polymarket"),
        }
    }
}

/// Composite identity of one data feed: market, outcome side, and time range.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelKey {
    pub market_id: String,
    pub side: Side,
    pub range: TimeRange,
}

impl ChannelKey {
    pub fn new(market_id: impl Into<String>, side: Side, range: TimeRange) -> Self {
        Self {
            market_id: market_id.into(),
            side,
            range,
        }
    }

    /// Encode this key into its string form.
    pub fn encode(&self) -> String {
        Self::generate(&self.market_id, self.side, self.range)
    }

    /// Generate the string key for a (market, side, range) triple.
    pub fn generate(market_id: &str, side: Side, range: TimeRange) -> String {
        format!(
            "{}{sep}{}{sep}{}",
            market_id,
            side,
            range,
            sep = CHANNEL_KEY_SEPARATOR
        )
    }

    /// Parse a string key back into its components.
    ///
    /// Returns `None` on malformed input (wrong segment count, unknown side
    /// or range) and logs a warning rather than panicking.
    pub fn parse(key: &str) -> Option<Self> {
        let parts: Vec<&str> = key.split(CHANNEL_KEY_SEPARATOR).collect();
        if parts.len() != 3 {
            warn!("malformed channel key: {}", key);
            return None;
        }

        let side = match Side::from_str(parts[1]) {
            Some(s) => s,
            None => {
                warn!("unknown side in channel key: {}", key);
                return None;
            }
        };

        let range = match TimeRange::from_str(parts[2]) {
            Some(r) => r,
            None => {
                warn!("unknown range in channel key: {}", key);
                return None;
            }
        };

        Some(Self::new(parts[0], side, range))
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

/// The unit published on the shared event bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub channel: String,
    #[serde(flatten)]
    pub payload: ChannelPayload,
}

/// Message payload: a full history snapshot or a single incremental point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "update_type", content = "data", rename_all = "snake_case")]
pub enum ChannelPayload {
    InitialData(Vec<DataPoint>),
    Update(DataPoint),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_key_round_trip() {
        for side in Side::ALL {
            for range in TimeRange::ALL {
                let key = ChannelKey::generate("MKT1", side, range);
                let parsed = ChannelKey::parse(&key).unwrap();
                assert_eq!(parsed.market_id, "MKT1");
                assert_eq!(parsed.side, side);
                assert_eq!(parsed.range, range);
            }
        }
    }

    #[test]
    fn test_channel_key_parse_malformed() {
        assert!(ChannelKey::parse("onlyonepart").is_none());
        assert!(ChannelKey::parse("too:many:parts:here").is_none());
        assert!(ChannelKey::parse("MKT1:maybe:1H").is_none());
        assert!(ChannelKey::parse("MKT1:yes:2X").is_none());
    }

    #[test]
    fn test_channel_message_serialization() {
        let msg = ChannelMessage {
            channel: "MKT1:yes:1H".to_string(),
            payload: ChannelPayload::Update(crate::types::DataPoint::new(960, 0.6)),
        };

        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"update_type\":\"update\""));
        assert!(json.contains("\"channel\":\"MKT1:yes:1H\""));

        let back: ChannelMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_range_bucket_widths() {
        assert_eq!(TimeRange::OneHour.bucket_seconds(), 60);
        assert_eq!(TimeRange::OneWeek.bucket_seconds(), 3600);
        assert_eq!(TimeRange::OneMonth.bucket_seconds(), 86_400);
        assert_eq!(TimeRange::OneYear.bucket_seconds(), 604_800);
    }
}
