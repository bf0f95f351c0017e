use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::domain::{ConditionalRequest, Feed, Item};
use crate::errors::{FeedError, FeedResult};
use crate::fetcher::document::next_data_script;
use crate::fetcher::{fetch_document, Document, Fetcher};
use crate::sources::traits::{ensure_items, require, SiteExtractor, SiteFeed};
use crate::util::{escape_path, hashed_hex, origin, parse_jst_date, trim_description};

const SITE: &str = "fuz";

const FREE_ONLY: &str = "freeOnly";

const DATE_FORMAT: &str = "%Y/%m/%d";

/// COMIC FUZ manga pages. Adding `?freeOnly` to the target keeps only the
/// chapters readable without points.
#[derive(Debug, Default)]
pub struct FuzSource;

impl FuzSource {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Default, Deserialize)]
struct NextData {
    #[serde(default)]
    props: Props,
}

#[derive(Debug, Default, Deserialize)]
struct Props {
    #[serde(rename = "pageProps", default)]
    page_props: MangaDetail,
}

#[derive(Debug, Default, Deserialize)]
struct MangaDetail {
    manga: Option<Manga>,
    #[serde(default)]
    authorships: Vec<Authorship>,
    #[serde(default)]
    chapters: Vec<ChapterGroup>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Manga {
    #[serde(default)]
    manga_name: String,
    #[serde(default)]
    long_description: String,
    #[serde(default)]
    latest_updated_date: String,
}

#[derive(Debug, Deserialize)]
struct Authorship {
    #[serde(default)]
    author: Vec<Author>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Author {
    #[serde(default)]
    author_name: String,
}

#[derive(Debug, Deserialize)]
struct ChapterGroup {
    #[serde(default)]
    chapters: Vec<Chapter>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Chapter {
    chapter_id: u32,
    #[serde(default)]
    chapter_main_name: String,
    #[serde(default)]
    chapter_sub_name: String,
    #[serde(default)]
    updated_date: String,
    point_consumption: Option<PointConsumption>,
}

#[derive(Debug, Deserialize)]
struct PointConsumption {
    #[serde(default)]
    amount: u32,
}

impl Chapter {
    fn is_free(&self) -> bool {
        self.point_consumption.as_ref().map_or(0, |p| p.amount) == 0
    }

    fn title(&self) -> String {
        if self.chapter_sub_name.is_empty() {
            self.chapter_main_name.clone()
        } else if self.chapter_main_name.is_empty() {
            self.chapter_sub_name.clone()
        } else {
            format!("{}/{}", self.chapter_main_name, self.chapter_sub_name)
        }
    }
}

#[async_trait]
impl SiteExtractor for FuzSource {
    fn site(&self) -> &'static str {
        SITE
    }

    async fn extract(
        &self,
        fetcher: &dyn Fetcher,
        target: Url,
        conditional: &ConditionalRequest,
    ) -> FeedResult<SiteFeed> {
        let (target, free_only) = strip_free_only(target);
        manga_id(&target)?;

        let (document, metadata) = fetch_document(fetcher, &target, conditional)
            .await
            .map_err(FeedError::stage(SITE, "FetchErr"))?;

        let feed = parse_feed(&document, &target, free_only)
            .map_err(FeedError::within(SITE, "ParseErr"))?;

        let suffix = if free_only { "_freeOnly" } else { "" };
        Ok(SiteFeed {
            name: format!("{}_{}{}", SITE, escape_path(target.path()), suffix),
            feed,
            metadata,
        })
    }
}

/// Remove the `freeOnly` flag from the query, reporting whether it was there.
fn strip_free_only(mut target: Url) -> (Url, bool) {
    let mut free_only = false;
    let kept: Vec<(String, String)> = target
        .query_pairs()
        .filter(|(key, _)| {
            let is_flag = key == FREE_ONLY;
            free_only |= is_flag;
            !is_flag
        })
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        target.set_query(None);
    } else {
        target.query_pairs_mut().clear().extend_pairs(kept);
    }
    (target, free_only)
}

fn manga_id(target: &Url) -> FeedResult<u32> {
    let id = target
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();

    if id.is_empty() {
        return Err(FeedError::InvalidInput {
            site: SITE,
            reason: "invalid URI".to_string(),
        });
    }

    id.parse::<u32>().map_err(|e| FeedError::InvalidInput {
        site: SITE,
        reason: format!("invalid id: {}", e),
    })
}

fn parse_feed(document: &Document, target: &Url, free_only: bool) -> FeedResult<Feed> {
    let script = next_data_script(&document.html())?.ok_or_else(|| FeedError::DataNotFound {
        site: SITE,
        what: "__NEXT_DATA__".to_string(),
    })?;

    let detail = serde_json::from_str::<NextData>(&script)
        .map_err(|e| FeedError::stage(SITE, "__NEXT_DATA__ parse error")(e.into()))?
        .props
        .page_props;

    let manga = detail.manga.ok_or_else(|| FeedError::DataNotFound {
        site: SITE,
        what: "manga".to_string(),
    })?;

    let title = require(SITE, "mangaName", manga.manga_name)?;
    let authors: Vec<&str> = detail
        .authorships
        .iter()
        .flat_map(|a| a.author.iter())
        .map(|a| a.author_name.trim())
        .filter(|name| !name.is_empty())
        .collect();
    let author = require(SITE, "author", authors.join("/"))?;

    let latest_update = parse_jst_date(&manga.latest_updated_date, DATE_FORMAT)
        .map_err(FeedError::stage(SITE, "LatestUpdatedDate"))?;

    let mut feed = Feed::new(title, target.as_str())
        .with_description(trim_description(&manga.long_description))
        .with_author(author)
        .with_created(Some(latest_update));

    let base = origin(target)?;
    for chapter in detail.chapters.iter().flat_map(|g| g.chapters.iter()) {
        if free_only && !chapter.is_free() {
            continue;
        }
        let Ok(updated) = parse_jst_date(&chapter.updated_date, DATE_FORMAT) else {
            continue;
        };

        let link = format!("{}manga/viewer/{}", base, chapter.chapter_id);
        feed.push(Item::new(hashed_hex(&link), chapter.title(), link).with_updated(Some(updated)));
    }

    ensure_items(SITE, feed)
}
