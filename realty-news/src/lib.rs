pub mod types;
pub mod config;
pub mod fetcher;
pub mod parser;
pub mod normalizer;
pub mod render;
pub mod rss_utils;
pub mod traits;
pub mod sources;
pub mod registry;
pub mod aggregator;
pub mod digest;

pub use types::*;
pub use config::Config;
pub use fetcher::Fetcher;
pub use parser::{feed_title, parse_items, FeedItems};
pub use normalizer::normalize;
pub use render::HtmlRenderer;
pub use traits::SourceAdapter;
pub use sources::{ListApiSource, RssFeedSource};
pub use registry::{Category, SourceRegistry};
pub use aggregator::NewsAggregator;
pub use digest::compose_digest;
