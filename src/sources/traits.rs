use async_trait::async_trait;
use url::Url;

use crate::domain::{CacheMetadata, ConditionalRequest, Feed};
use crate::errors::{FeedError, FeedResult};
use crate::fetcher::Fetcher;

/// Result of one extraction: storage key, populated feed and the validators
/// of the last document fetched.
#[derive(Debug, Clone)]
pub struct SiteFeed {
    pub name: String,
    pub feed: Feed,
    pub metadata: CacheMetadata,
}

#[async_trait]
pub trait SiteExtractor: Send + Sync {
    /// Short site name, used as error prefix and stable-name prefix
    fn site(&self) -> &'static str;

    /// Fetch whatever the site needs starting from `target` and build its feed.
    async fn extract(
        &self,
        fetcher: &dyn Fetcher,
        target: Url,
        conditional: &ConditionalRequest,
    ) -> FeedResult<SiteFeed>;
}

/// Fail with a named error when a required text field came back empty.
pub fn require(site: &'static str, field: &'static str, value: String) -> FeedResult<String> {
    if value.trim().is_empty() {
        Err(FeedError::missing(site, field))
    } else {
        Ok(value)
    }
}

/// Drop entries that came back without a title, then reject an empty feed.
pub fn ensure_items(site: &'static str, mut feed: Feed) -> FeedResult<Feed> {
    feed.items.retain(|item| {
        let titled = !item.title.trim().is_empty();
        if !titled {
            tracing::warn!(site, link = %item.link, "skipping entry without title");
        }
        titled
    });

    if feed.items.is_empty() {
        Err(FeedError::EmptyResult { site })
    } else {
        Ok(feed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Item;

    #[test]
    fn test_require_rejects_blank() {
        assert!(matches!(
            require("meteor", "title", "  \n".to_string()),
            Err(FeedError::MissingField { site: "meteor", field: "title" })
        ));
        assert_eq!(require("meteor", "title", "x".to_string()).unwrap(), "x");
    }

    #[test]
    fn test_ensure_items() {
        let feed = Feed::new("t", "https://example.com/");
        assert!(matches!(
            ensure_items("narou", feed.clone()),
            Err(FeedError::EmptyResult { site: "narou" })
        ));

        let mut feed = feed;
        feed.push(Item::new("1", "a", "https://example.com/1"));
        assert_eq!(ensure_items("narou", feed).unwrap().items.len(), 1);
    }

    #[test]
    fn test_ensure_items_skips_untitled_entries() {
        let mut feed = Feed::new("t", "https://example.com/");
        feed.push(Item::new("1", " ", "https://example.com/1"));
        feed.push(Item::new("2", "第2話", "https://example.com/2"));

        let feed = ensure_items("ride", feed).unwrap();
        assert_eq!(feed.items.len(), 1);
        assert_eq!(feed.items[0].id, "2");

        let mut untitled = Feed::new("t", "https://example.com/");
        untitled.push(Item::new("1", "", "https://example.com/1"));
        assert!(matches!(
            ensure_items("ride", untitled),
            Err(FeedError::EmptyResult { site: "ride" })
        ));
    }
}
