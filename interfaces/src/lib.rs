pub mod defs;

pub use defs::*;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn unified_item_uses_type_key_on_the_wire() {
        let item = UnifiedItem {
            id: "2p".to_owned(),
            item_type: "news".to_owned(),
            url: "http://x/1".to_owned(),
            title: "t".to_owned(),
            description: "d".to_owned(),
            published_date: Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap(),
            authors: UNKNOWN_AUTHOR.to_owned(),
            source: UNKNOWN_SOURCE.to_owned(),
            details: ItemDetails::default(),
        };
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["type"], "news");
        assert_eq!(value["published_date"], "2025-03-01T08:00:00Z");
        assert!(value["details"].get("feed_url").is_none());

        let back: UnifiedItem = serde_json::from_value(value).unwrap();
        assert_eq!(back, item);
    }
}
