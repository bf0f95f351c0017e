use async_trait::async_trait;
use url::Url;

use crate::domain::{ConditionalRequest, Feed, Item};
use crate::errors::{FeedError, FeedResult};
use crate::fetcher::document::{select_attr, select_text, selector};
use crate::fetcher::{fetch_document, Document, Fetcher};
use crate::sources::traits::{ensure_items, require, SiteExtractor, SiteFeed};
use crate::util::{escape_path, hashed_hex, resolve_relative_url, trim_description};

const SITE: &str = "ride";

const HEAD: &str = "body > div > main > div:nth-child(1) > div > div > div.p-detail-head__main";

#[derive(Debug, Default)]
pub struct RideSource;

impl RideSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SiteExtractor for RideSource {
    fn site(&self) -> &'static str {
        SITE
    }

    async fn extract(
        &self,
        fetcher: &dyn Fetcher,
        target: Url,
        conditional: &ConditionalRequest,
    ) -> FeedResult<SiteFeed> {
        let (document, metadata) = fetch_document(fetcher, &target, conditional)
            .await
            .map_err(FeedError::stage(SITE, "FetchErr"))?;

        let feed = parse_feed(&document, &target).map_err(FeedError::within(SITE, "ParseErr"))?;

        Ok(SiteFeed {
            name: format!("{}_{}", SITE, escape_path(target.path())),
            feed,
            metadata,
        })
    }
}

fn parse_feed(document: &Document, target: &Url) -> FeedResult<Feed> {
    let html = document.html();
    let root = html.root_element();

    let title = require(SITE, "title", select_text(root, &format!("{} > h1", HEAD))?)?;
    let author = require(SITE, "author", select_text(root, &format!("{} > p", HEAD))?)?;
    let description = trim_description(&select_text(
        root,
        "body > div > main > div:nth-child(1) > div > p",
    )?);

    let mut feed = Feed::new(title, target.as_str())
        .with_description(description)
        .with_author(author);

    let back_numbers =
        selector("body > div > main > div.c-section > div > div > div ul > li.p-backnumber-d")?;
    for entry in root.select(&back_numbers) {
        let Some(href) = select_attr(entry, "span > a", "href")? else {
            continue;
        };
        let title = select_text(entry, "strong > span")?;

        let link = resolve_relative_url(target, &href)?;
        feed.push(Item::new(hashed_hex(&link), title, link));
    }

    ensure_items(SITE, feed)
}
