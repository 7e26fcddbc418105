use crate::types::{RawPayload, Result, UnifiedItem};
use async_trait::async_trait;

/// A source of news for one category (a set of RSS feeds, a list API list, ...)
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Human-readable name for logs
    fn name(&self) -> String;

    /// Fetch everything currently available, already filtered by recency.
    /// Missing configuration is not an error: return an empty payload.
    async fn fetch(&self) -> Result<RawPayload>;

    /// Map the raw payload into unified records tagged with `category`
    fn transform(&self, payload: RawPayload, category: &str) -> Vec<UnifiedItem>;

    /// HTML fragment for one item produced by this adapter
    fn render(&self, item: &UnifiedItem) -> String;
}
