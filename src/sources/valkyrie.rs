use async_trait::async_trait;
use scraper::ElementRef;
use url::Url;

use crate::domain::{ConditionalRequest, Feed, Item};
use crate::errors::{FeedError, FeedResult};
use crate::fetcher::document::{select_attr, select_text, selector};
use crate::fetcher::{fetch_document, Document, Fetcher};
use crate::sources::traits::{ensure_items, require, SiteExtractor, SiteFeed};
use crate::util::{escape_path, hashed_hex, resolve_relative_url, trim_description};

const SITE: &str = "valkyrie";

/// Comic Valkyrie series pages: the newest story plus the back numbers.
#[derive(Debug, Default)]
pub struct ValkyrieSource;

impl ValkyrieSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SiteExtractor for ValkyrieSource {
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

    let title = require(SITE, "title", select_text(root, "title")?)?;
    let author = require(
        SITE,
        "author",
        trim_description(&select_text(root, "#writer > p")?),
    )?;
    let description = trim_description(&select_text(root, "#bg > main > div > div.t_box > p")?);

    let mut feed = Feed::new(title, target.as_str())
        .with_description(description)
        .with_author(author);

    let new_story = selector("#new_story")?;
    if let Some(latest) = root.select(&new_story).next() {
        push_story(&mut feed, latest, target, "div > p.title", "div > a", "figure > img")?;
    }

    let back_numbers = selector("#back_number > div > div")?;
    for story in root.select(&back_numbers) {
        push_story(&mut feed, story, target, "p.title", "div > a", "figure > img")?;
    }

    ensure_items(SITE, feed)
}

fn push_story(
    feed: &mut Feed,
    story: ElementRef<'_>,
    target: &Url,
    title_css: &str,
    link_css: &str,
    image_css: &str,
) -> FeedResult<()> {
    let title = select_text(story, title_css)?;
    let Some(href) = select_attr(story, link_css, "href")? else {
        return Ok(());
    };
    if title.trim().is_empty() {
        return Ok(());
    }

    let link = resolve_relative_url(target, &href)?;
    let thumbnail = select_attr(story, image_css, "src")?
        .map(|src| resolve_relative_url(target, &src))
        .transpose()?;

    feed.push(Item::new(hashed_hex(&link), title, link).with_enclosure(thumbnail));
    Ok(())
}
