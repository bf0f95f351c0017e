use crate::domain::ConditionalRequest;
use crate::errors::FeedResult;
use crate::fetcher::Fetcher;
use crate::sources::{SiteFeed, SiteRegistry};

/// Entry point shared by the CLI and the proxy: dispatch a raw target string
/// to its site extractor and run it against the configured fetcher.
pub struct FeedService {
    registry: SiteRegistry,
    fetcher: Box<dyn Fetcher>,
}

impl FeedService {
    pub fn new(registry: SiteRegistry, fetcher: Box<dyn Fetcher>) -> Self {
        Self { registry, fetcher }
    }

    /// Build the feed for `target`. Nothing is fetched when the target does not
    /// parse or belongs to no known site.
    pub async fn get_feed(
        &self,
        target: &str,
        conditional: &ConditionalRequest,
    ) -> FeedResult<SiteFeed> {
        let (url, extractor) = self.registry.resolve(target)?;
        tracing::debug!(site = extractor.site(), url = target, "extracting feed");

        let result = extractor
            .extract(self.fetcher.as_ref(), url, conditional)
            .await?;

        tracing::info!(
            site = extractor.site(),
            name = %result.name,
            items = result.feed.items.len(),
            "feed built"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CacheMetadata;
    use crate::errors::FeedError;
    use crate::config::Config;
    use crate::fetcher::{FetchedBody, HttpFetcher, MockFetcher};
    use crate::sources::narou::NarouSource;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALKYRIE_HTML: &str = r#"<html><head><title>テストタイトル</title></head><body>
<div id="writer"><p>テスト著者</p></div>
<section id="new_story"><div><p class="title">第1話</p><a href="/viewer/1">読む</a></div></section>
</body></html>"#;

    fn service(fetcher: MockFetcher) -> FeedService {
        FeedService::new(SiteRegistry::new(), Box::new(fetcher))
    }

    #[tokio::test]
    async fn test_unsupported_target_never_fetches() {
        let mut fetcher = MockFetcher::new();
        fetcher.expect_fetch().times(0);
        let service = service(fetcher);

        let err = service
            .get_feed("https://www.example.com/", &ConditionalRequest::none())
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::UnsupportedSite(_)));

        let err = service
            .get_feed("hoge", &ConditionalRequest::none())
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn test_get_feed_passes_validators_through() {
        let mut fetcher = MockFetcher::new();
        fetcher
            .expect_fetch()
            .withf(|url, conditional| {
                url.as_str() == "https://www.comic-valkyrie.com/samplecomic/test/"
                    && conditional.if_none_match.as_deref() == Some("\"old\"")
            })
            .times(1)
            .returning(|_, _| {
                Ok(FetchedBody {
                    bytes: VALKYRIE_HTML.as_bytes().to_vec(),
                    metadata: CacheMetadata {
                        etag: "\"new\"".to_string(),
                        last_modified: String::new(),
                    },
                })
            });

        let result = service(fetcher)
            .get_feed(
                "https://www.comic-valkyrie.com/samplecomic/test/",
                &ConditionalRequest::new(Some("\"old\"".to_string()), None),
            )
            .await
            .unwrap();

        assert_eq!(result.name, "valkyrie_samplecomictest");
        assert_eq!(result.metadata.etag, "\"new\"");
        assert_eq!(result.feed.items.len(), 1);
        assert_eq!(
            result.feed.items[0].link,
            "https://www.comic-valkyrie.com/viewer/1"
        );
    }

    #[tokio::test]
    async fn test_not_modified_is_recognisable_through_prefixes() {
        let mut fetcher = MockFetcher::new();
        fetcher
            .expect_fetch()
            .times(1)
            .returning(|_, _| Err(FeedError::NotModified));

        let err = service(fetcher)
            .get_feed("https://kirapo.jp/meteor/titles/test", &ConditionalRequest::none())
            .await
            .unwrap_err();

        assert!(err.is_not_modified());
        assert!(err.to_string().starts_with("meteor:FetchErr:"));
    }

    #[tokio::test]
    async fn test_dropped_future_stops_pagination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/n0000a/"))
            .and(query_param("p", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/n0000a/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(10))
                    .set_body_string(r#"<a class="c-pager__item c-pager__item--next" href="?p=2">次へ</a>"#),
            )
            .mount(&server)
            .await;

        let mut registry = SiteRegistry::empty();
        registry.register(server.uri(), Box::new(NarouSource::new()));
        let service = FeedService::new(registry, Box::new(HttpFetcher::new(&Config::default()).unwrap()));

        let target = format!("{}/n0000a/", server.uri());
        let outcome = tokio::time::timeout(
            Duration::from_millis(200),
            service.get_feed(&target, &ConditionalRequest::none()),
        )
        .await;

        assert!(outcome.is_err(), "extraction should have been cancelled");
    }
}
