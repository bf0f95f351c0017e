use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::domain::{CacheMetadata, ConditionalRequest};
use crate::errors::FeedResult;
use crate::output::to_atom;
use crate::services::FeedService;

const ENTRY_PREFIX: &str = "/entry/";

const ATOM_CONTENT_TYPE: &str = "application/atom+xml";

/// `GET /entry/<target URL>` answers with the Atom rendering of the target.
pub fn router(service: Arc<FeedService>) -> Router {
    Router::new()
        .route("/entry/*target", get(entry))
        .with_state(service)
}

/// Bind `listen` and serve the proxy until the process is stopped.
pub async fn serve(service: Arc<FeedService>, listen: &str) -> FeedResult<()> {
    let listener = tokio::net::TcpListener::bind(listen).await?;

    tracing::info!("Proxy listening on {}", listener.local_addr()?);

    axum::serve(listener, router(service)).await?;

    Ok(())
}

/// Everything after `/entry/`, taken from the raw request URI so that
/// doubled slashes and the query string reach the extractor untouched.
fn target_from_uri(uri: &Uri) -> String {
    let path = uri.path().strip_prefix(ENTRY_PREFIX).unwrap_or_default();
    match uri.query() {
        Some(query) => format!("{}?{}", path, query),
        None => path.to_string(),
    }
}

fn conditional_from_headers(headers: &HeaderMap) -> ConditionalRequest {
    let value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    ConditionalRequest::new(
        value(header::IF_NONE_MATCH),
        value(header::IF_MODIFIED_SINCE),
    )
}

async fn entry(
    State(service): State<Arc<FeedService>>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let target = target_from_uri(&uri);
    let conditional = conditional_from_headers(&headers);

    let result = match service.get_feed(&target, &conditional).await {
        Ok(result) => result,
        Err(e) if e.is_not_modified() => return StatusCode::NOT_MODIFIED.into_response(),
        Err(e) => {
            tracing::error!(url = %target, error = %e, "GetFeed failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    let xml = match to_atom(&result.feed) {
        Ok(xml) => xml,
        Err(e) => {
            tracing::error!(url = %target, error = %e, "ToAtom failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    let mut response = ([(header::CONTENT_TYPE, ATOM_CONTENT_TYPE)], xml).into_response();
    copy_validators(response.headers_mut(), &result.metadata);
    response
}

fn copy_validators(headers: &mut HeaderMap, metadata: &CacheMetadata) {
    let pairs = [
        (header::LAST_MODIFIED, &metadata.last_modified),
        (header::ETAG, &metadata.etag),
    ];
    for (name, value) in pairs {
        if value.is_empty() {
            continue;
        }
        match HeaderValue::from_str(value) {
            Ok(value) => {
                headers.insert(name, value);
            }
            Err(e) => tracing::warn!(header = name.as_str(), error = %e, "dropping upstream validator"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FeedError;
    use crate::fetcher::{FetchedBody, MockFetcher};
    use crate::sources::SiteRegistry;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    const VALKYRIE_HTML: &str = r#"<html><head><title>テストタイトル</title></head><body>
<div id="writer"><p>テスト著者</p></div>
<section id="new_story"><div><p class="title">第1話</p><a href="/viewer/1">読む</a></div></section>
</body></html>"#;

    fn app(fetcher: MockFetcher) -> Router {
        router(Arc::new(FeedService::new(SiteRegistry::new(), Box::new(fetcher))))
    }

    fn get_entry(path: &str) -> Request<Body> {
        Request::builder().uri(path).body(Body::empty()).unwrap()
    }

    #[test]
    fn test_target_from_uri_keeps_query_and_slashes() {
        let uri: Uri = "/entry/https://comic-fuz.com/manga/123?freeOnly".parse().unwrap();
        assert_eq!(target_from_uri(&uri), "https://comic-fuz.com/manga/123?freeOnly");

        let uri: Uri = "/entry/https://kirapo.jp//meteor".parse().unwrap();
        assert_eq!(target_from_uri(&uri), "https://kirapo.jp//meteor");
    }

    #[tokio::test]
    async fn test_entry_returns_atom_with_validators() {
        let mut fetcher = MockFetcher::new();
        fetcher
            .expect_fetch()
            .withf(|_, conditional| conditional.if_modified_since.as_deref() == Some("Sat, 01 Jan 2000 00:00:00 GMT"))
            .times(1)
            .returning(|_, _| {
                Ok(FetchedBody {
                    bytes: VALKYRIE_HTML.as_bytes().to_vec(),
                    metadata: CacheMetadata {
                        etag: "\"abc\"".to_string(),
                        last_modified: "Thu, 18 May 2023 07:17:12 GMT".to_string(),
                    },
                })
            });

        let request = Request::builder()
            .uri("/entry/https://www.comic-valkyrie.com/samplecomic/test/")
            .header(header::IF_MODIFIED_SINCE, "Sat, 01 Jan 2000 00:00:00 GMT")
            .body(Body::empty())
            .unwrap();
        let response = app(fetcher).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], ATOM_CONTENT_TYPE);
        assert_eq!(response.headers()[header::ETAG], "\"abc\"");
        assert_eq!(
            response.headers()[header::LAST_MODIFIED],
            "Thu, 18 May 2023 07:17:12 GMT"
        );

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed = feed_rs::parser::parse(body.as_ref()).unwrap();
        assert_eq!(parsed.title.unwrap().content, "テストタイトル");
        assert_eq!(parsed.entries.len(), 1);
    }

    #[tokio::test]
    async fn test_entry_not_modified() {
        let mut fetcher = MockFetcher::new();
        fetcher
            .expect_fetch()
            .returning(|_, _| Err(FeedError::NotModified));

        let response = app(fetcher)
            .oneshot(get_entry("/entry/https://kirapo.jp/meteor/titles/test"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    }

    #[tokio::test]
    async fn test_entry_unsupported_site_is_server_error() {
        let mut fetcher = MockFetcher::new();
        fetcher.expect_fetch().times(0);

        let response = app(fetcher)
            .oneshot(get_entry("/entry/https://www.example.com/"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.as_ref(), b"https://www.example.com/ not supported site");
    }

    #[tokio::test]
    async fn test_entry_rejects_other_methods() {
        let request = Request::builder()
            .method("POST")
            .uri("/entry/https://kirapo.jp/")
            .body(Body::empty())
            .unwrap();
        let response = app(MockFetcher::new()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
