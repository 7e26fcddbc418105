use crate::config::{CategoryConfig, ListApiConfig};
use crate::fetcher::{random_delay, Fetcher};
use crate::normalizer::normalize;
use crate::parser::parse_date;
use crate::render::HtmlRenderer;
use crate::rss_utils::time::filter_recent;
use crate::traits::SourceAdapter;
use crate::types::{
    AggregatorError, DelayRange, ItemRenderer, RawFeedItem, RawPayload, Result, UnifiedItem,
};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, COOKIE, ORIGIN};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntriesRequest<'a> {
    pub list_id: &'a str,
    pub view: u8,
    pub with_content: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_after: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EntriesResponse {
    /// 0 on success
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<Vec<EntryEnvelope>>,
}

impl EntriesResponse {
    /// Envelopes of a successful response; a non-zero `code` is an error.
    pub fn into_envelopes(self) -> Result<Vec<EntryEnvelope>> {
        match self.code {
            Some(code) if code != 0 => Err(AggregatorError::General(format!(
                "list API answered code {}: {}",
                code,
                self.message.unwrap_or_default()
            ))),
            _ => Ok(self.data.unwrap_or_default()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EntryEnvelope {
    #[serde(default)]
    pub entries: Option<ApiEntry>,
    #[serde(default)]
    pub feeds: Option<ApiFeed>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiFeed {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// One list of the aggregation API, paged backwards in time.
pub struct ListApiSource {
    category: String,
    display_name: String,
    list_id: Option<String>,
    page_count: u32,
    days: u32,
    delay: DelayRange,
    api: ListApiConfig,
    fetcher: Arc<Fetcher>,
    renderer: HtmlRenderer,
}

impl ListApiSource {
    pub fn new(
        category: &CategoryConfig,
        api: ListApiConfig,
        fetcher: Arc<Fetcher>,
        delay: DelayRange,
        offset: FixedOffset,
    ) -> Self {
        Self {
            category: category.key.clone(),
            display_name: category.display_name.clone(),
            list_id: category.list_id.clone(),
            page_count: category.page_count,
            days: category.api_days,
            delay,
            api,
            fetcher,
            renderer: HtmlRenderer::new(category.glyph.clone(), offset),
        }
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let dynamic = [
            (ORIGIN, Some(self.api.origin.as_str())),
            (HeaderName::from_static("x-app-name"), Some(self.api.app_name.as_str())),
            (COOKIE, self.api.cookie.as_deref()),
        ];
        for (name, value) in dynamic {
            let Some(value) = value else { continue };
            match HeaderValue::from_str(value) {
                Ok(value) => {
                    headers.insert(name, value);
                }
                Err(e) => warn!("Dropping invalid {} header: {}", name, e),
            }
        }
        headers
    }

    async fn fetch_page(&self, request: &EntriesRequest<'_>) -> Result<Vec<EntryEnvelope>> {
        let response: EntriesResponse = self
            .fetcher
            .post_json(&self.api.endpoint, self.headers(), request)
            .await?;
        response.into_envelopes()
    }
}

/// Map one API entry. Entries without a usable date or without both title
/// and url are dropped.
pub fn map_entry(envelope: EntryEnvelope) -> Option<RawFeedItem> {
    let entry = envelope.entries?;
    let feed_title = envelope
        .feeds
        .as_ref()
        .and_then(|f| f.title.clone())
        .filter(|t| !t.trim().is_empty());
    let feed_url = envelope.feeds.and_then(|f| f.url);

    let title = entry.title.unwrap_or_default();
    let link = entry.url.unwrap_or_default();
    if title.trim().is_empty() && link.trim().is_empty() {
        debug!("Dropping API entry {:?} without title and url", entry.id);
        return None;
    }

    let Some(published_at) = entry.published_at.as_deref().and_then(parse_date) else {
        debug!("Dropping API entry {:?} with publishedAt {:?}", entry.id, entry.published_at);
        return None;
    };

    let authors = entry
        .author
        .filter(|a| !a.trim().is_empty())
        .or_else(|| feed_title.clone())
        .into_iter()
        .collect();

    Some(RawFeedItem {
        id: entry.id,
        title,
        link,
        description: entry.content.unwrap_or_default(),
        published_at,
        authors,
        source_name: feed_title,
        feed_url,
    })
}

#[async_trait]
impl SourceAdapter for ListApiSource {
    fn name(&self) -> String {
        format!("list-api:{}", self.category)
    }

    async fn fetch(&self) -> Result<RawPayload> {
        let Some(list_id) = self.list_id.as_deref() else {
            info!("No list id configured for {}, skipping", self.category);
            return Ok(RawPayload::empty());
        };

        let now = Utc::now();
        let mut items = Vec::new();
        let mut published_after: Option<DateTime<Utc>> = None;

        for page in 0..self.page_count {
            if page > 0 {
                random_delay(self.delay).await;
            }

            let request = EntriesRequest {
                list_id,
                view: 1,
                with_content: true,
                published_after: published_after
                    .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
            };

            let envelopes = match self.fetch_page(&request).await {
                Ok(envelopes) => envelopes,
                Err(e) => {
                    warn!("List API page {} for {} failed: {}", page + 1, self.category, e);
                    break;
                }
            };

            let page_items: Vec<RawFeedItem> = envelopes
                .into_iter()
                .filter_map(map_entry)
                .collect();
            published_after = page_items.iter().map(|item| item.published_at).min();

            let fresh = filter_recent(page_items, now, self.days);
            if fresh.is_empty() {
                info!(
                    "List API page {} for {} has no recent entries, stopping",
                    page + 1,
                    self.category
                );
                break;
            }

            info!("List API page {} for {}: {} entries", page + 1, self.category, fresh.len());
            items.extend(fresh);
        }

        Ok(RawPayload { items })
    }

    fn transform(&self, payload: RawPayload, category: &str) -> Vec<UnifiedItem> {
        normalize(payload.items, category, &self.display_name)
    }

    fn render(&self, item: &UnifiedItem) -> String {
        self.renderer.render(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(value: serde_json::Value) -> EntryEnvelope {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn request_body_uses_camel_case_and_omits_cursor() {
        let body = serde_json::to_value(EntriesRequest {
            list_id: "L1",
            view: 1,
            with_content: true,
            published_after: None,
        })
        .unwrap();
        assert_eq!(body, json!({"listId": "L1", "view": 1, "withContent": true}));
    }

    #[test]
    fn non_zero_code_is_an_error() {
        let rejected: EntriesResponse =
            serde_json::from_value(json!({"code": 401, "message": "unauthorized"})).unwrap();
        match rejected.into_envelopes() {
            Err(AggregatorError::General(msg)) => assert!(msg.contains("401")),
            other => panic!("expected a general error, got {:?}", other.map(|e| e.len())),
        }

        let ok: EntriesResponse = serde_json::from_value(json!({"code": 0})).unwrap();
        assert!(ok.into_envelopes().unwrap().is_empty());
        let bare: EntriesResponse = serde_json::from_value(json!({"data": []})).unwrap();
        assert!(bare.into_envelopes().unwrap().is_empty());
    }

    #[test]
    fn author_falls_back_to_feed_title() {
        let item = map_entry(envelope(json!({
            "entries": {
                "id": "e1",
                "url": "https://x/1",
                "title": "楼市",
                "content": "<p>c</p>",
                "publishedAt": "2025-03-01T08:00:00.000Z",
                "author": null
            },
            "feeds": {"title": "Feed T", "url": "https://x/feed"}
        })))
        .unwrap();
        assert_eq!(item.id.as_deref(), Some("e1"));
        assert_eq!(item.authors, vec!["Feed T".to_string()]);
        assert_eq!(item.source_name.as_deref(), Some("Feed T"));
        assert_eq!(item.feed_url.as_deref(), Some("https://x/feed"));
        assert_eq!(item.description, "<p>c</p>");
    }

    #[test]
    fn entry_author_wins_and_bad_entries_drop() {
        let item = map_entry(envelope(json!({
            "entries": {"url": "https://x/2", "title": "t", "publishedAt": "2025-03-01T08:00:00Z", "author": "Zhao"},
            "feeds": {"title": "Feed T"}
        })))
        .unwrap();
        assert_eq!(item.authors, vec!["Zhao".to_string()]);

        assert!(map_entry(envelope(json!({"feeds": {"title": "x"}}))).is_none());
        assert!(map_entry(envelope(json!({
            "entries": {"url": "https://x/3", "title": "t", "publishedAt": "yesterday"}
        })))
        .is_none());
        assert!(map_entry(envelope(json!({
            "entries": {"publishedAt": "2025-03-01T08:00:00Z"}
        })))
        .is_none());
    }
}
