pub mod channel;
pub mod point;
pub mod ws;

pub use channel::{
    ChannelKey, ChannelMessage, ChannelPayload, Platform, Side, TimeRange, CHANNEL_KEY_SEPARATOR,
};
pub use point::{clamp_unit, Candlestick, DataPoint};
pub use ws::{ClientMessage, ServerMessage, SideQuote, SummaryStats, TickerUpdate};
