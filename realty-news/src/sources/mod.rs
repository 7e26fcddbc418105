pub mod list_api;
pub mod rss_feed;

pub use list_api::ListApiSource;
pub use rss_feed::RssFeedSource;
