/// Helpers shared by the feed adapters and the normalizer

/// Item identifiers
pub mod id {
    /// Stable id for a link: 31-multiplier rolling hash over UTF-16 code
    /// units with 32-bit wraparound, absolute value in base 36.
    pub fn generate_item_id(link: &str) -> String {
        let hash = link.encode_utf16().fold(0i32, |hash, unit| {
            hash.wrapping_shl(5)
                .wrapping_sub(hash)
                .wrapping_add(i32::from(unit))
        });
        to_base36(hash.unsigned_abs())
    }

    fn to_base36(mut value: u32) -> String {
        const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
        if value == 0 {
            return "0".to_string();
        }
        let mut out = Vec::new();
        while value > 0 {
            out.push(DIGITS[(value % 36) as usize]);
            value /= 36;
        }
        out.reverse();
        String::from_utf8_lossy(&out).into_owned()
    }
}

/// URL utilities
pub mod url {
    use url::Url;

    /// Extract host from URL
    pub fn extract_host(url_str: &str) -> Option<String> {
        Url::parse(url_str)
            .ok()
            .and_then(|url| url.host_str().map(|h| h.to_string()))
    }

    /// Split a comma separated URL list, dropping blanks
    pub fn split_url_list(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Time utilities
pub mod time {
    use crate::types::RawFeedItem;
    use chrono::{DateTime, Duration, Utc};

    /// True when `published_at` falls within the last `days` days of `now`.
    pub fn is_within_days(published_at: DateTime<Utc>, now: DateTime<Utc>, days: u32) -> bool {
        now.signed_duration_since(published_at) <= Duration::days(i64::from(days))
    }

    /// Keep the items published within the recency window, in order.
    pub fn filter_recent(items: Vec<RawFeedItem>, now: DateTime<Utc>, days: u32) -> Vec<RawFeedItem> {
        items
            .into_iter()
            .filter(|item| is_within_days(item.published_at, now, days))
            .collect()
    }
}

/// Text extraction
pub mod text {
    /// Extract clean text content from HTML
    pub fn extract_text_from_html(html: &str) -> String {
        let stripped = html
            .chars()
            .fold((String::new(), false), |(mut text, in_tag), c| match c {
                '<' => (text, true),
                '>' => (text, false),
                _ if !in_tag => {
                    text.push(c);
                    (text, in_tag)
                }
                _ => (text, in_tag),
            })
            .0;

        html_escape::decode_html_entities(&stripped)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Hard cut at `max_chars` characters, never inside a UTF-8 sequence.
    pub fn truncate_chars(text: &str, max_chars: usize) -> String {
        match text.char_indices().nth(max_chars) {
            Some((byte_idx, _)) => text[..byte_idx].to_string(),
            None => text.to_string(),
        }
    }
}
