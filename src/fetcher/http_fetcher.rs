use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::{Client, StatusCode};
use url::Url;

use crate::config::Config;
use crate::domain::{CacheMetadata, ConditionalRequest};
use crate::errors::{FeedError, FeedResult};
use crate::fetcher::{FetchedBody, Fetcher};

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build the shared client. An unusable user agent is a configuration
    /// error rather than a silent fallback to reqwest's defaults.
    pub fn new(config: &Config) -> FeedResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FeedError::Config(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

fn header_string(headers: &reqwest::header::HeaderMap, name: reqwest::header::HeaderName) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .unwrap_or_default()
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, conditional: &ConditionalRequest) -> FeedResult<FetchedBody> {
        let mut request = self.client.get(url.clone());

        if let Some(etag) = &conditional.if_none_match {
            request = request.header(IF_NONE_MATCH, etag);
        }
        if let Some(since) = &conditional.if_modified_since {
            request = request.header(IF_MODIFIED_SINCE, since);
        }

        tracing::debug!(%url, conditional = !conditional.is_empty(), "GET");
        let response = request.send().await?;

        if response.status() == StatusCode::NOT_MODIFIED {
            tracing::debug!(%url, "not modified");
            return Err(FeedError::NotModified);
        }

        if !response.status().is_success() {
            return Err(FeedError::HttpStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let metadata = CacheMetadata {
            etag: header_string(response.headers(), ETAG),
            last_modified: header_string(response.headers(), LAST_MODIFIED),
        };

        let bytes = response.bytes().await?.to_vec();

        Ok(FetchedBody { bytes, metadata })
    }
}
