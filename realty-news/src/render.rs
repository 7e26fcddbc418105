use crate::types::{ItemRenderer, UnifiedItem};
use chrono::{FixedOffset, Offset, Utc};
use html_escape::{encode_double_quoted_attribute, encode_text};

pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Renders unified items as HTML fragments for the digest.
///
/// Title, source and url are escaped. `content_html` is embedded as-is: it is
/// rich content from upstream and is trusted.
#[derive(Debug, Clone)]
pub struct HtmlRenderer {
    glyph: String,
    offset: FixedOffset,
}

impl HtmlRenderer {
    pub fn new(glyph: impl Into<String>, offset: FixedOffset) -> Self {
        Self {
            glyph: glyph.into(),
            offset,
        }
    }

    /// Renderer without a glyph
    pub fn plain(offset: FixedOffset) -> Self {
        Self::new("", offset)
    }
}

impl ItemRenderer for HtmlRenderer {
    fn render(&self, item: &UnifiedItem) -> String {
        render_item(item, &self.glyph, self.offset)
    }
}

pub fn render_item(item: &UnifiedItem, glyph: &str, offset: FixedOffset) -> String {
    let heading = if glyph.is_empty() {
        encode_text(&item.title).into_owned()
    } else {
        format!("{} {}", glyph, encode_text(&item.title))
    };
    let published = item.published_date.with_timezone(&offset).format(TIME_FORMAT);

    format!(
        r#"<div class="news-item">
  <h3 class="news-title">{heading}</h3>
  <p class="news-meta"><span class="news-source">{source}</span> · <time>{published}</time></p>
  <div class="news-content">{content}</div>
  <a class="news-link" href="{url}" target="_blank" rel="noopener">阅读更多</a>
</div>"#,
        heading = heading,
        source = encode_text(&item.source),
        published = published,
        content = item.details.content_html,
        url = encode_double_quoted_attribute(&item.url),
    )
}

/// Display offset from whole hours east of UTC; out of range falls back to UTC.
pub fn offset_from_hours(hours: i32) -> FixedOffset {
    FixedOffset::east_opt(hours.saturating_mul(3600)).unwrap_or_else(|| Utc.fix())
}
