pub mod bucketing;
pub mod channel;
pub mod channel_cache;
pub mod channel_manager;
pub mod polling;
pub mod push_router;

pub use bucketing::{bucket_time, choose_timestamp};
pub use channel::ChannelConfig;
pub use channel_cache::{CacheStats, ChannelCache, DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL};
pub use channel_manager::{
    ChannelManager, ChannelSpec, ChannelStats, ManagerStats, Subscription, SubscriptionHandle,
};
pub use polling::PollingEngine;
pub use push_router::PushRouter;
