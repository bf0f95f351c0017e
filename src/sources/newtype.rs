use async_trait::async_trait;
use scraper::{ElementRef, Html};
use serde::Deserialize;
use url::Url;

use crate::domain::{ConditionalRequest, Feed, Item};
use crate::errors::{FeedError, FeedResult};
use crate::fetcher::document::{select_attr, select_text, selector};
use crate::fetcher::{fetch_document, fetch_json, Document, Fetcher};
use crate::sources::traits::{ensure_items, require, SiteExtractor, SiteFeed};
use crate::util::{escape_path, hashed_hex, parse_jst_date, resolve_relative_url, trim_description};

const SITE: &str = "newtype";

const CONTENTS: &str = "contents";

/// Newest-first first page of the episode list, relative to the series URL.
const MORE_PATH: &str = "more/1/Dsc";

/// Web Newtype comic pages. Series metadata comes from the HTML page, the
/// episode list from a JSON endpoint that returns an HTML fragment.
#[derive(Debug, Default)]
pub struct NewtypeSource;

impl NewtypeSource {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Deserialize)]
struct MorePage {
    #[serde(default)]
    html: String,
}

#[async_trait]
impl SiteExtractor for NewtypeSource {
    fn site(&self) -> &'static str {
        SITE
    }

    async fn extract(
        &self,
        fetcher: &dyn Fetcher,
        target: Url,
        conditional: &ConditionalRequest,
    ) -> FeedResult<SiteFeed> {
        let canonical = canonicalize(&target).map_err(FeedError::stage(SITE, "URLSanitizeErr"))?;

        let (document, _) = fetch_document(fetcher, &canonical, conditional)
            .await
            .map_err(FeedError::stage(SITE, "FetchErr"))?;
        let mut feed =
            parse_header(&document, &canonical).map_err(FeedError::within(SITE, "ParseErr"))?;

        let more_url = canonical.join(MORE_PATH).map_err(|source| FeedError::InvalidUrl {
            url: MORE_PATH.to_string(),
            source,
        })?;
        let (page, metadata) = fetch_json::<MorePage>(fetcher, &more_url, conditional)
            .await
            .map_err(FeedError::stage(SITE, "FetchErr"))?;

        parse_episodes(&mut feed, &page.html, &more_url)
            .map_err(FeedError::within(SITE, "ParseErr"))?;

        Ok(SiteFeed {
            name: format!("{}_{}", SITE, escape_path(canonical.path())),
            feed: ensure_items(SITE, feed)?,
            metadata,
        })
    }
}

/// Cut the target down to `/contents/<slug>/`, dropping any deeper path,
/// query and fragment.
fn canonicalize(target: &Url) -> FeedResult<Url> {
    let mut segments = target.path_segments().into_iter().flatten();
    let slug = match (segments.next(), segments.next()) {
        (Some(CONTENTS), Some(slug)) if !slug.is_empty() => slug.to_string(),
        _ => {
            return Err(FeedError::InvalidInput {
                site: SITE,
                reason: format!("no series slug in {}", target),
            })
        }
    };

    let mut canonical = target.clone();
    canonical.set_path(&format!("/{}/{}/", CONTENTS, slug));
    canonical.set_query(None);
    canonical.set_fragment(None);
    Ok(canonical)
}

fn parse_header(document: &Document, canonical: &Url) -> FeedResult<Feed> {
    let html = document.html();
    let root = html.root_element();

    let title = require(SITE, "title", select_text(root, "h1.contents__ttl")?.trim().to_string())?;
    let author = require(
        SITE,
        "author",
        select_text(root, "div.contents__info")?.trim().to_string(),
    )?;
    let description = require(
        SITE,
        "desc",
        trim_description(&select_text(root, "div.contents__txt--desc")?),
    )?;

    Ok(Feed::new(title, canonical.as_str())
        .with_description(description)
        .with_author(author))
}

fn parse_episodes(feed: &mut Feed, fragment: &str, base: &Url) -> FeedResult<()> {
    let html = Html::parse_fragment(fragment);
    let entries = selector("li > a")?;

    for entry in html.root_element().select(&entries) {
        let Some(href) = entry.value().attr("href") else {
            continue;
        };
        let link = resolve_relative_url(base, href)?;
        let title = episode_title(entry)?;

        let thumbnail = select_attr(entry, "img", "src")?
            .map(|src| resolve_relative_url(base, &src))
            .transpose()?;

        let date_text = select_text(entry, "div.detail__txt--date")?;
        let date = date_text.split(' ').next().unwrap_or_default();
        let created = match parse_jst_date(date, "%Y/%m/%d") {
            Ok(created) => Some(created),
            Err(e) => {
                tracing::warn!(site = SITE, link = %link, error = %e, "unparseable episode date");
                None
            }
        };

        // the same link can appear under several titles
        let id = hashed_hex(&format!("{}{}", link, title));
        feed.push(
            Item::new(id, title, link)
                .with_created(created)
                .with_enclosure(thumbnail),
        );
    }
    Ok(())
}

fn episode_title(entry: ElementRef<'_>) -> FeedResult<String> {
    let title = select_text(entry, "h2.detail__txt--ttl-sub")?;
    let caution = select_text(entry, "div.detail__txt--caution")?;
    Ok(if title.trim().is_empty() || caution.is_empty() {
        title
    } else {
        format!("{} {}", title, caution)
    })
}
