use crate::rss_utils::{id::generate_item_id, text};
use crate::types::{ItemDetails, RawFeedItem, UnifiedItem, UNKNOWN_AUTHOR, UNKNOWN_SOURCE};

pub const DESCRIPTION_MAX_CHARS: usize = 500;

/// Map raw items into unified records for `category`.
///
/// `default_source` is used for items that carry no source name of their own
/// (usually the category's display name).
pub fn normalize(items: Vec<RawFeedItem>, category: &str, default_source: &str) -> Vec<UnifiedItem> {
    items
        .into_iter()
        .map(|item| normalize_item(item, category, default_source))
        .collect()
}

pub fn normalize_item(item: RawFeedItem, category: &str, default_source: &str) -> UnifiedItem {
    let id = item
        .id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| generate_item_id(&item.link));

    UnifiedItem {
        id,
        item_type: category.to_string(),
        url: item.link,
        title: item.title,
        description: describe(&item.description),
        published_date: item.published_at,
        authors: join_authors(&item.authors),
        source: pick_source(item.source_name.as_deref(), default_source),
        details: ItemDetails {
            content_html: item.description,
            feed_url: item.feed_url,
        },
    }
}

/// Plain-text excerpt of HTML content.
pub fn describe(content_html: &str) -> String {
    text::truncate_chars(&text::extract_text_from_html(content_html), DESCRIPTION_MAX_CHARS)
}

pub fn join_authors(authors: &[String]) -> String {
    let names: Vec<&str> = authors
        .iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .collect();
    if names.is_empty() {
        UNKNOWN_AUTHOR.to_string()
    } else {
        names.join(", ")
    }
}

fn pick_source(own: Option<&str>, default_source: &str) -> String {
    [own.unwrap_or_default(), default_source]
        .iter()
        .map(|s| s.trim())
        .find(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_SOURCE)
        .to_string()
}
