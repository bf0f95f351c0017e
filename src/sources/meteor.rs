use async_trait::async_trait;
use scraper::ElementRef;
use url::Url;

use crate::domain::{ConditionalRequest, Feed, Item};
use crate::errors::{FeedError, FeedResult};
use crate::fetcher::document::{element_text, select_attr, select_text, selector};
use crate::fetcher::{fetch_document, Document, Fetcher};
use crate::sources::traits::{ensure_items, require, SiteExtractor, SiteFeed};
use crate::util::{escape_path, hashed_hex, resolve_relative_url, trim_description};

const SITE: &str = "meteor";

const AUTHOR_LABEL: &str = "著者";

/// Comic Meteor (kirapo.jp) title pages.
#[derive(Debug, Default)]
pub struct MeteorSource;

impl MeteorSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SiteExtractor for MeteorSource {
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

/// Strip the `著者` label and its `：` separator from the author line.
fn strip_author_label(raw: &str) -> FeedResult<String> {
    let rest = raw
        .trim()
        .strip_prefix(AUTHOR_LABEL)
        .ok_or_else(|| FeedError::missing(SITE, "author label"))?;

    let name = rest
        .trim_start()
        .strip_prefix(['：', ':'])
        .ok_or_else(|| FeedError::missing(SITE, "author separator"))?
        .trim();

    require(SITE, "author", name.to_string())
}

fn has_class(element: ElementRef<'_>, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}

fn parse_feed(document: &Document, target: &Url) -> FeedResult<Feed> {
    let html = document.html();
    let root = html.root_element();

    let title = require(
        SITE,
        "title",
        select_text(root, "#contents > div.h2_area > h2 > div")?
            .trim()
            .to_string(),
    )?;

    let author = strip_author_label(&select_text(
        root,
        "#contents > div.work_author_intro.container-fluid > div > div.work_author_intro_txt_box > div.work_author_intro_name",
    )?)?;

    let description = require(
        SITE,
        "desc",
        trim_description(&select_text(root, "#contents > div.work_story.container-fluid > div")?),
    )?;

    let mut feed = Feed::new(title, target.as_str())
        .with_description(description)
        .with_author(author);

    let episodes = selector("#contents > div.work_episode > div.work_episode_box > div")?;
    let nested = selector("div")?;

    for block in root.select(&episodes) {
        if has_class(block, "work_episode_table") || has_class(block, "episode_more_first") {
            push_episode(&mut feed, block, target)?;
        } else if has_class(block, "moreEpi") {
            for inner in block.select(&nested) {
                if has_class(inner, "work_episode_table") {
                    push_episode(&mut feed, inner, target)?;
                }
            }
        }
    }

    ensure_items(SITE, feed)
}

fn push_episode(feed: &mut Feed, episode: ElementRef<'_>, target: &Url) -> FeedResult<()> {
    let Some(href) = select_attr(episode, "a", "href")? else {
        return Ok(());
    };

    let title_selector = selector("div.work_episode_txt.d-table-cell")?;
    let title: String = episode
        .select(&title_selector)
        .map(element_text)
        .collect::<String>()
        .trim()
        .to_string();

    let link = resolve_relative_url(target, &href)?;
    feed.push(Item::new(hashed_hex(&link), title, link));
    Ok(())
}
