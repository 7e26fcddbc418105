use crate::rss_utils::url::split_url_list;
use crate::types::{DelayRange, FetchConfig};
use std::fmt::Display;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_RSS_DAYS: u32 = 2;
pub const DEFAULT_API_DAYS: u32 = 1;
pub const DEFAULT_PAGE_COUNT: u32 = 1;
pub const DEFAULT_DISPLAY_OFFSET_HOURS: i32 = 8;

pub const DEFAULT_LIST_API_URL: &str = "https://api.follow.is/entries";
pub const DEFAULT_LIST_API_ORIGIN: &str = "https://app.follow.is";
pub const DEFAULT_LIST_API_APP_NAME: &str = "Folo Web";

pub const RSS_DELAY: DelayRange = DelayRange::new(500, 1500);
pub const API_DELAY: DelayRange = DelayRange::new(1000, 4000);

/// Fixed catalogue entry: key, display name, glyph
#[derive(Debug, Clone, Copy)]
pub struct CategoryEntry {
    pub key: &'static str,
    pub display_name: &'static str,
    pub glyph: &'static str,
}

pub const CATEGORIES: [CategoryEntry; 4] = [
    CategoryEntry { key: "market", display_name: "市场动态", glyph: "📈" },
    CategoryEntry { key: "news", display_name: "行业新闻", glyph: "📰" },
    CategoryEntry { key: "policy", display_name: "政策解读", glyph: "📜" },
    CategoryEntry { key: "city", display_name: "城市动态", glyph: "🏙️" },
];

#[derive(Debug, Clone)]
pub struct CategoryConfig {
    pub key: String,
    pub display_name: String,
    pub glyph: String,
    pub rss_urls: Vec<String>,
    pub rss_days: u32,
    pub list_id: Option<String>,
    pub page_count: u32,
    pub api_days: u32,
}

impl CategoryConfig {
    /// Category with nothing configured: both adapters will skip.
    pub fn unconfigured(entry: &CategoryEntry) -> Self {
        Self {
            key: entry.key.to_string(),
            display_name: entry.display_name.to_string(),
            glyph: entry.glyph.to_string(),
            rss_urls: Vec::new(),
            rss_days: DEFAULT_RSS_DAYS,
            list_id: None,
            page_count: DEFAULT_PAGE_COUNT,
            api_days: DEFAULT_API_DAYS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListApiConfig {
    pub endpoint: String,
    pub origin: String,
    pub app_name: String,
    pub cookie: Option<String>,
}

impl Default for ListApiConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_LIST_API_URL.to_string(),
            origin: DEFAULT_LIST_API_ORIGIN.to_string(),
            app_name: DEFAULT_LIST_API_APP_NAME.to_string(),
            cookie: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub categories: Vec<CategoryConfig>,
    pub list_api: ListApiConfig,
    pub fetch: FetchConfig,
    pub display_offset_hours: i32,
    pub rss_delay: DelayRange,
    pub api_delay: DelayRange,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            categories: CATEGORIES.iter().map(CategoryConfig::unconfigured).collect(),
            list_api: ListApiConfig::default(),
            fetch: FetchConfig::default(),
            display_offset_hours: DEFAULT_DISPLAY_OFFSET_HOURS,
            rss_delay: RSS_DELAY,
            api_delay: API_DELAY,
        }
    }
}

impl Config {
    /// Read configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let rss_days_default = parse_or(get("RSS_DAYS_RANGE"), "RSS_DAYS_RANGE", DEFAULT_RSS_DAYS);
        let api_days_default = parse_or(get("API_DAYS_RANGE"), "API_DAYS_RANGE", DEFAULT_API_DAYS);

        let categories = CATEGORIES
            .iter()
            .map(|entry| {
                let prefix = entry.key.to_ascii_uppercase();
                let key = |suffix: &str| format!("{}_{}", prefix, suffix);

                CategoryConfig {
                    key: entry.key.to_string(),
                    display_name: entry.display_name.to_string(),
                    glyph: entry.glyph.to_string(),
                    rss_urls: get(&key("RSS_URLS"))
                        .map(|raw| split_url_list(&raw))
                        .unwrap_or_default(),
                    rss_days: parse_or(get(&key("RSS_DAYS_RANGE")), &key("RSS_DAYS_RANGE"), rss_days_default),
                    list_id: get(&key("LIST_ID")),
                    page_count: parse_or(get(&key("PAGE_COUNT")), &key("PAGE_COUNT"), DEFAULT_PAGE_COUNT),
                    api_days: parse_or(get(&key("API_DAYS_RANGE")), &key("API_DAYS_RANGE"), api_days_default),
                }
            })
            .collect();

        let defaults = ListApiConfig::default();
        let list_api = ListApiConfig {
            endpoint: get("LIST_API_URL").unwrap_or(defaults.endpoint),
            origin: get("LIST_API_ORIGIN").unwrap_or(defaults.origin),
            app_name: get("LIST_API_APP_NAME").unwrap_or(defaults.app_name),
            cookie: get("LIST_API_COOKIE"),
        };

        let fetch_defaults = FetchConfig::default();
        let fetch = FetchConfig {
            timeout_seconds: parse_or(
                get("HTTP_TIMEOUT_SECONDS"),
                "HTTP_TIMEOUT_SECONDS",
                fetch_defaults.timeout_seconds,
            ),
            ..fetch_defaults
        };

        Self {
            categories,
            list_api,
            fetch,
            display_offset_hours: parse_or(
                get("DISPLAY_UTC_OFFSET_HOURS"),
                "DISPLAY_UTC_OFFSET_HOURS",
                DEFAULT_DISPLAY_OFFSET_HOURS,
            ),
            rss_delay: RSS_DELAY,
            api_delay: API_DELAY,
        }
    }

    pub fn category(&self, key: &str) -> Option<&CategoryConfig> {
        self.categories.iter().find(|c| c.key == key)
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match raw {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|e| {
            warn!("Ignoring {}={:?} ({}), using {}", key, raw, e, default);
            default
        }),
    }
}
