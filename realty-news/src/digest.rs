use crate::registry::SourceRegistry;
use crate::types::CategoryItems;
use chrono::{DateTime, Utc};
use html_escape::{encode_double_quoted_attribute, encode_text};
use tracing::debug;

pub const DIGEST_TITLE: &str = "房产资讯日报";
pub const EMPTY_SECTION: &str = "暂无内容";

/// Compose the daily digest page from aggregated items.
///
/// Sections follow registry order; categories present in `items` but not in
/// the registry are appended after, rendered without a glyph.
pub fn compose_digest(registry: &SourceRegistry, items: &CategoryItems, generated_at: DateTime<Utc>) -> String {
    let date = generated_at
        .with_timezone(&registry.display_offset())
        .format("%Y-%m-%d");

    let mut digest = String::new();
    digest.push_str(&format!(
        "<article class=\"digest\">\n<h1>{} {}</h1>\n",
        DIGEST_TITLE, date
    ));

    let known = registry
        .categories()
        .filter(|c| items.contains_key(&c.key))
        .map(|c| (c.key.as_str(), c.display_name.as_str()));
    let unknown = items
        .keys()
        .filter(|key| registry.get(key).is_none())
        .map(|key| (key.as_str(), key.as_str()));

    for (key, title) in known.chain(unknown) {
        let section = items.get(key).map(Vec::as_slice).unwrap_or_default();
        digest.push_str(&format!(
            "<section class=\"digest-category\" data-category=\"{}\">\n<h2>{} ({})</h2>\n",
            encode_double_quoted_attribute(key),
            encode_text(title),
            section.len()
        ));

        if section.is_empty() {
            digest.push_str(&format!("<p class=\"digest-empty\">{}</p>\n", EMPTY_SECTION));
        }
        for item in section {
            digest.push_str(&registry.render(key, item));
            digest.push('\n');
        }
        digest.push_str("</section>\n");
    }

    digest.push_str("</article>\n");
    debug!("Composed digest of {} bytes", digest.len());
    digest
}
