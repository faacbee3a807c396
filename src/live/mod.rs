pub mod feed;

pub use feed::LiveFeed;
