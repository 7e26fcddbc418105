use crate::types::{AggregatorError, DelayRange, FetchConfig, Result};
use rand::seq::IndexedRandom;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub const FEED_ACCEPT: &str =
    "application/rss+xml, application/atom+xml, application/xml, text/xml;q=0.9, */*;q=0.8";

const FALLBACK_USER_AGENT: &str = "Mozilla/5.0 (compatible; realty-news/0.1)";

/// Shared HTTP client. One request at a time per caller; callers decide pacing.
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn random_user_agent(&self) -> String {
        self.config
            .user_agents
            .choose(&mut rand::rng())
            .cloned()
            .unwrap_or_else(|| FALLBACK_USER_AGENT.to_string())
    }

    /// GET a feed document. Any non-2xx status is an error.
    pub async fn fetch_feed(&self, url: &str) -> Result<String> {
        let start_time = Instant::now();
        debug!("Fetching feed: {}", url);

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, self.random_user_agent())
            .header(ACCEPT, FEED_ACCEPT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AggregatorError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let content = response.text().await?;
        info!(
            "Fetched feed: {} ({} bytes, {}ms)",
            url,
            content.len(),
            start_time.elapsed().as_millis()
        );
        Ok(content)
    }

    /// POST a JSON body and decode a JSON response.
    pub async fn post_json<B, T>(&self, url: &str, mut headers: HeaderMap, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let start_time = Instant::now();
        if let Ok(ua) = HeaderValue::from_str(&self.random_user_agent()) {
            headers.insert(USER_AGENT, ua);
        }

        let response = self.client.post(url).headers(headers).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AggregatorError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let bytes = response.bytes().await?;
        debug!(
            "POST {} answered {} bytes in {}ms",
            url,
            bytes.len(),
            start_time.elapsed().as_millis()
        );
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Sleep for a random duration inside `range`.
pub async fn random_delay(range: DelayRange) {
    let ms = pick_delay_ms(range);
    if ms > 0 {
        debug!("Pausing {}ms before next request", ms);
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

fn pick_delay_ms(range: DelayRange) -> u64 {
    if range.max_ms <= range.min_ms {
        return range.min_ms;
    }
    rand::rng().random_range(range.min_ms..=range.max_ms)
}
