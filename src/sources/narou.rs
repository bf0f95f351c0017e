use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use url::Url;

use crate::domain::{ConditionalRequest, Feed, Item};
use crate::errors::{FeedError, FeedResult};
use crate::fetcher::document::{element_text, select_attr, select_text, selector};
use crate::fetcher::{fetch_document, Document, Fetcher};
use crate::sources::traits::{ensure_items, require, SiteExtractor, SiteFeed};
use crate::util::{
    escape_path, hashed_hex, parse_jst_datetime, resolve_relative_url, trim_description,
};

const SITE: &str = "narou";

/// `2006/01/02 15:04` is 16 bytes long
const TIMESTAMP_LEN: usize = 16;

/// Shousetsuka ni Narou table of contents, which is paginated.
#[derive(Debug, Default)]
pub struct NarouSource;

impl NarouSource {
    pub fn new() -> Self {
        Self
    }
}

/// What one table-of-contents page contributes.
#[derive(Debug)]
struct Page {
    items: Vec<Item>,
    next: Option<String>,
}

#[async_trait]
impl SiteExtractor for NarouSource {
    fn site(&self) -> &'static str {
        SITE
    }

    async fn extract(
        &self,
        fetcher: &dyn Fetcher,
        target: Url,
        conditional: &ConditionalRequest,
    ) -> FeedResult<SiteFeed> {
        let (mut document, mut metadata) = fetch_document(fetcher, &target, conditional)
            .await
            .map_err(FeedError::stage(SITE, "FetchErr"))?;

        let mut feed =
            parse_header(&document, &target).map_err(FeedError::within(SITE, "ParseErr"))?;
        let mut chapter = String::new();
        let mut visited = HashSet::from([target.clone()]);

        loop {
            let page = parse_page(&document, &target, &mut chapter)
                .map_err(FeedError::within(SITE, "ParseErr"))?;
            for item in page.items {
                feed.bump_updated(item.latest_timestamp());
                feed.push(item);
            }

            let Some(next) = page.next else {
                break;
            };

            let next_url = target.join(&next).map_err(|source| {
                FeedError::stage(SITE, "cannot parse next URL")(FeedError::InvalidUrl {
                    url: next.clone(),
                    source,
                })
            })?;

            if !visited.insert(next_url.clone()) {
                tracing::warn!(site = SITE, url = %next_url, "next page already fetched");
                break;
            }
            tracing::debug!(site = SITE, url = %next_url, "following next page");

            // the last page fetched owns the validators
            (document, metadata) = fetch_document(fetcher, &next_url, conditional)
                .await
                .map_err(FeedError::stage(SITE, "Fetch(Next)Err"))?;
        }

        Ok(SiteFeed {
            name: format!("{}_{}", SITE, escape_path(target.path())),
            feed: ensure_items(SITE, feed)?,
            metadata,
        })
    }
}

fn parse_header(document: &Document, target: &Url) -> FeedResult<Feed> {
    let html = document.html();
    let root = html.root_element();

    let title = require(SITE, "title", select_text(root, "h1.p-novel__title")?.trim().to_string())?;
    let author = require(SITE, "author", select_text(root, "div.p-novel__author > a")?.trim().to_string())?;
    let description = require(SITE, "description", select_text(root, "div.p-novel__summary")?)?;

    Ok(Feed::new(title, target.as_str())
        .with_description(trim_description(&description))
        .with_author(author))
}

/// Collect the episodes of one page. `chapter` carries the most recent
/// chapter heading across pages.
fn parse_page(document: &Document, target: &Url, chapter: &mut String) -> FeedResult<Page> {
    let html = document.html();
    let root = html.root_element();

    let list = selector("div.p-eplist")?;
    let chapter_title = selector("div.p-eplist__chapter-title")?;
    let sublist = selector("div.p-eplist__sublist")?;

    let mut items = Vec::new();

    for entry in root.select(&list).flat_map(|list| list.child_elements()) {
        if chapter_title.matches(&entry) {
            *chapter = trim_description(&element_text(entry));
            continue;
        }

        if !sublist.matches(&entry) {
            continue;
        }

        let subtitle = trim_description(&select_text(entry, "a.p-eplist__subtitle")?);
        if subtitle.is_empty() {
            continue;
        }
        let href = select_attr(entry, "a.p-eplist__subtitle", "href")?
            .ok_or_else(|| FeedError::missing(SITE, "href"))?;
        let link = resolve_relative_url(target, &href)?;

        let title = if chapter.is_empty() {
            subtitle
        } else {
            format!("{}/{}", chapter, subtitle)
        };

        let created = select_text(entry, "div.p-eplist__update")?;
        if created.trim().is_empty() {
            return Err(FeedError::missing(SITE, "created timestamp"));
        }
        let created = parse_timestamp(&created)?;

        let updated = select_attr(entry, "div.p-eplist__update > span", "title")?
            .map(|revised| parse_timestamp(&revised))
            .transpose()?;

        items.push(
            Item::new(hashed_hex(&link), title, link)
                .with_created(Some(created))
                .with_updated(updated),
        );
    }

    let next = select_attr(
        root,
        r#"a[class="c-pager__item c-pager__item--next"]"#,
        "href",
    )?;

    Ok(Page { items, next })
}

/// Parse the leading `YYYY/MM/DD hh:mm` of a listing timestamp in JST.
fn parse_timestamp(raw: &str) -> FeedResult<DateTime<Utc>> {
    let cleaned = trim_description(raw);
    let head = cleaned.get(..TIMESTAMP_LEN).ok_or_else(|| FeedError::Timestamp {
        value: cleaned.clone(),
        reason: "time string is too short".to_string(),
    })?;

    parse_jst_datetime(head, "%Y/%m/%d %H:%M")
}
