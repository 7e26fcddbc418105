use crate::config::CategoryConfig;
use crate::fetcher::{random_delay, Fetcher};
use crate::normalizer::normalize;
use crate::parser::{feed_title, parse_items};
use crate::render::HtmlRenderer;
use crate::rss_utils::{id::generate_item_id, time::is_within_days, url::extract_host};
use crate::traits::SourceAdapter;
use crate::types::{DelayRange, ItemRenderer, RawFeedItem, RawPayload, Result, UnifiedItem};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use std::sync::Arc;
use tracing::{info, warn};

/// All RSS/Atom feeds configured for one category.
///
/// Feeds are fetched one after another with a random pause in between; a feed
/// that fails is logged and skipped.
pub struct RssFeedSource {
    category: String,
    display_name: String,
    urls: Vec<String>,
    days: u32,
    delay: DelayRange,
    fetcher: Arc<Fetcher>,
    renderer: HtmlRenderer,
}

impl RssFeedSource {
    pub fn new(
        category: &CategoryConfig,
        fetcher: Arc<Fetcher>,
        delay: DelayRange,
        offset: FixedOffset,
    ) -> Self {
        Self {
            category: category.key.clone(),
            display_name: category.display_name.clone(),
            urls: category.rss_urls.clone(),
            days: category.rss_days,
            delay,
            fetcher,
            renderer: HtmlRenderer::new(category.glyph.clone(), offset),
        }
    }

    /// Fetch and parse one feed, keeping recent items only.
    async fn pull_feed(&self, url: &str, now: DateTime<Utc>) -> Result<Vec<RawFeedItem>> {
        let content = self.fetcher.fetch_feed(url).await?;

        let label = feed_title(&content)
            .or_else(|| extract_host(url))
            .unwrap_or_else(|| url.to_string());

        let items = parse_items(&content)
            .filter(|item| is_within_days(item.published_at, now, self.days))
            .map(|mut item| {
                item.id = Some(generate_item_id(&item.link));
                item.source_name = Some(label.clone());
                item.feed_url = Some(url.to_string());
                item
            })
            .collect();

        Ok(items)
    }
}

#[async_trait]
impl SourceAdapter for RssFeedSource {
    fn name(&self) -> String {
        format!("rss:{}", self.category)
    }

    async fn fetch(&self) -> Result<RawPayload> {
        if self.urls.is_empty() {
            info!("No RSS feeds configured for {}, skipping", self.category);
            return Ok(RawPayload::empty());
        }

        let now = Utc::now();
        let mut items = Vec::new();

        for (index, url) in self.urls.iter().enumerate() {
            if index > 0 {
                random_delay(self.delay).await;
            }

            match self.pull_feed(url, now).await {
                Ok(mut feed_items) => {
                    info!(
                        "Pulled {} recent items from RSS feed {} ({})",
                        feed_items.len(),
                        url,
                        self.category
                    );
                    items.append(&mut feed_items);
                }
                Err(e) => {
                    warn!("Failed to pull RSS feed {}: {}", url, e);
                }
            }
        }

        items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(RawPayload { items })
    }

    fn transform(&self, payload: RawPayload, category: &str) -> Vec<UnifiedItem> {
        normalize(payload.items, category, &self.display_name)
    }

    fn render(&self, item: &UnifiedItem) -> String {
        self.renderer.render(item)
    }
}
