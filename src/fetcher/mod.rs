pub mod document;
pub mod http_fetcher;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use url::Url;

use crate::domain::{CacheMetadata, ConditionalRequest};
use crate::errors::FeedResult;

pub use document::Document;
pub use http_fetcher::HttpFetcher;

/// Raw response body together with the validators it was served with.
#[derive(Debug, Clone, Default)]
pub struct FetchedBody {
    pub bytes: Vec<u8>,
    pub metadata: CacheMetadata,
}

/// One conditional GET. A 304 answer surfaces as `FeedError::NotModified`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url, conditional: &ConditionalRequest) -> FeedResult<FetchedBody>;
}

/// Fetch `url` and decode it through the detected charset.
pub async fn fetch_document(
    fetcher: &dyn Fetcher,
    url: &Url,
    conditional: &ConditionalRequest,
) -> FeedResult<(Document, CacheMetadata)> {
    let body = fetcher.fetch(url, conditional).await?;
    let document = Document::decode(&body.bytes)?;
    Ok((document, body.metadata))
}

/// Fetch `url` and deserialize the body as UTF-8 JSON.
pub async fn fetch_json<T: DeserializeOwned>(
    fetcher: &dyn Fetcher,
    url: &Url,
    conditional: &ConditionalRequest,
) -> FeedResult<(T, CacheMetadata)> {
    let body = fetcher.fetch(url, conditional).await?;
    let value = serde_json::from_slice(&body.bytes)?;
    Ok((value, body.metadata))
}
