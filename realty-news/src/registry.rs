use crate::config::Config;
use crate::fetcher::Fetcher;
use crate::render::{offset_from_hours, HtmlRenderer};
use crate::sources::{ListApiSource, RssFeedSource};
use crate::traits::SourceAdapter;
use crate::types::{ItemRenderer, Result, UnifiedItem};
use chrono::FixedOffset;
use std::sync::Arc;
use tracing::info;

/// A category and the adapters feeding it, in the order they run.
pub struct Category {
    pub key: String,
    pub display_name: String,
    pub adapters: Vec<Box<dyn SourceAdapter>>,
}

/// Category key -> adapters. Built once at startup and only read afterwards.
pub struct SourceRegistry {
    categories: Vec<Category>,
    display_offset: FixedOffset,
}

impl SourceRegistry {
    pub fn new(display_offset: FixedOffset) -> Self {
        Self {
            categories: Vec::new(),
            display_offset,
        }
    }

    /// One RSS adapter and one list API adapter per configured category
    pub fn from_config(config: &Config) -> Result<Self> {
        let fetcher = Arc::new(Fetcher::new(config.fetch.clone())?);
        let offset = offset_from_hours(config.display_offset_hours);
        let mut registry = Self::new(offset);

        for category in &config.categories {
            let adapters: Vec<Box<dyn SourceAdapter>> = vec![
                Box::new(RssFeedSource::new(
                    category,
                    fetcher.clone(),
                    config.rss_delay,
                    offset,
                )),
                Box::new(ListApiSource::new(
                    category,
                    config.list_api.clone(),
                    fetcher.clone(),
                    config.api_delay,
                    offset,
                )),
            ];
            registry.register(Category {
                key: category.key.clone(),
                display_name: category.display_name.clone(),
                adapters,
            });
        }

        info!("Registered {} categories", registry.categories.len());
        Ok(registry)
    }

    /// Add a category; a later registration with the same key replaces it
    pub fn register(&mut self, category: Category) {
        match self.categories.iter_mut().find(|c| c.key == category.key) {
            Some(existing) => *existing = category,
            None => self.categories.push(category),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.key == key)
    }

    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter()
    }

    pub fn keys(&self) -> Vec<&str> {
        self.categories.iter().map(|c| c.key.as_str()).collect()
    }

    pub fn display_offset(&self) -> FixedOffset {
        self.display_offset
    }

    /// Render with the category's first adapter, or without a glyph when the
    /// category is unknown or has no adapters.
    pub fn render(&self, key: &str, item: &UnifiedItem) -> String {
        match self.get(key).and_then(|c| c.adapters.first()) {
            Some(adapter) => adapter.render(item),
            None => HtmlRenderer::plain(self.display_offset).render(item),
        }
    }
}
