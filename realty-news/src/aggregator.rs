use crate::registry::SourceRegistry;
use crate::types::{CategoryItems, UnifiedItem};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct NewsAggregator {
    registry: Arc<SourceRegistry>,
}

impl NewsAggregator {
    pub fn new(registry: Arc<SourceRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Run every adapter of one category in order and merge their items,
    /// newest first. A failing adapter is logged and skipped.
    pub async fn aggregate_category(&self, key: &str) -> Vec<UnifiedItem> {
        let Some(category) = self.registry.get(key) else {
            warn!("Unknown category requested: {}", key);
            return Vec::new();
        };

        let mut items = Vec::new();
        for adapter in &category.adapters {
            match adapter.fetch().await {
                Ok(payload) => {
                    let mut transformed = adapter.transform(payload, &category.key);
                    info!(
                        "{} produced {} items for {}",
                        adapter.name(),
                        transformed.len(),
                        category.key
                    );
                    items.append(&mut transformed);
                }
                Err(e) => {
                    error!("{} failed for {}: {}", adapter.name(), category.key, e);
                }
            }
        }

        sort_newest_first(&mut items);
        info!("Category {}: {} items", category.key, items.len());
        items
    }

    /// Aggregate the given categories concurrently and wait for all of them.
    pub async fn aggregate_categories(&self, keys: &[&str]) -> CategoryItems {
        let results = join_all(keys.iter().map(|key| async move {
            (key.to_string(), self.aggregate_category(key).await)
        }))
        .await;

        results.into_iter().collect()
    }

    /// Aggregate every registered category.
    pub async fn aggregate_all(&self) -> CategoryItems {
        let keys = self.registry.keys();
        self.aggregate_categories(&keys).await
    }

    pub fn render(&self, key: &str, item: &UnifiedItem) -> String {
        self.registry.render(key, item)
    }
}

/// Stable sort by publish date, newest first. Equal dates keep fetch order.
pub fn sort_newest_first(items: &mut [UnifiedItem]) {
    items.sort_by(|a, b| b.published_date.cmp(&a.published_date));
}
