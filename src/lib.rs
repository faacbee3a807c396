//! Omen - Real-time prediction market data streaming server

pub mod api;
pub mod config;
pub mod error;
pub mod live;
pub mod platforms;
pub mod services;
pub mod types;
pub mod websocket;

use std::sync::Arc;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Config>,
    pub manager: Arc<services::ChannelManager>,
}

// Re-export commonly used types
pub use services::{ChannelCache, ChannelManager, PollingEngine, PushRouter};
pub use types::*;
