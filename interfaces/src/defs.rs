use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const UNKNOWN_AUTHOR: &str = "未知";
pub const UNKNOWN_SOURCE: &str = "未知来源";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedItem {
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub url: String,
    pub title: String,
    pub description: String,
    pub published_date: DateTime<Utc>,
    pub authors: String,
    pub source: String,
    pub details: ItemDetails,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemDetails {
    pub content_html: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_url: Option<String>,
}

/// Category key -> items sorted newest first.
pub type CategoryItems = std::collections::BTreeMap<String, Vec<UnifiedItem>>;

/// Turns a finished item into a display fragment, whatever source produced it.
pub trait ItemRenderer {
    fn render(&self, item: &UnifiedItem) -> String;
}
