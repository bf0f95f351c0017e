use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::domain::{ConditionalRequest, Feed, Item};
use crate::errors::{FeedError, FeedResult};
use crate::fetcher::document::next_data_script;
use crate::fetcher::{fetch_document, Document, Fetcher};
use crate::sources::traits::{ensure_items, require, SiteExtractor, SiteFeed};
use crate::util::{hashed_hex, origin, resolve_relative_url, trim_description};

const SITE: &str = "ganganonline";

/// Gangan Online title pages (`__NEXT_DATA__` payload).
#[derive(Debug, Default)]
pub struct GanganOnlineSource;

impl GanganOnlineSource {
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
    page_props: PageProps,
}

#[derive(Debug, Default, Deserialize)]
struct PageProps {
    data: Option<TitleData>,
}

#[derive(Debug, Default, Deserialize)]
struct TitleData {
    default: Option<TitleDetail>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TitleDetail {
    #[serde(default)]
    chapters: Vec<Chapter>,
    title_name: Option<String>,
    author: Option<String>,
    description: Option<String>,
    title_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Chapter {
    id: Option<u64>,
    #[serde(default)]
    status: i64,
    thumbnail_url: Option<String>,
    main_text: Option<String>,
    sub_text: Option<String>,
}

#[async_trait]
impl SiteExtractor for GanganOnlineSource {
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

        let (title_id, feed) =
            parse_feed(&document, &target).map_err(FeedError::within(SITE, "ParseErr"))?;

        Ok(SiteFeed {
            name: format!("{}_{}", SITE, title_id),
            feed,
            metadata,
        })
    }
}

fn parse_feed(document: &Document, target: &Url) -> FeedResult<(u64, Feed)> {
    let script = next_data_script(&document.html())?.ok_or_else(|| FeedError::DataNotFound {
        site: SITE,
        what: "__NEXT_DATA__".to_string(),
    })?;

    let next_data: NextData = serde_json::from_str(&script)
        .map_err(|e| FeedError::stage(SITE, "__NEXT_DATA__ parse error")(e.into()))?;

    let detail = next_data
        .props
        .page_props
        .data
        .and_then(|d| d.default)
        .ok_or_else(|| FeedError::DataNotFound {
            site: SITE,
            what: "title data".to_string(),
        })?;

    let title_id = detail.title_id.ok_or_else(|| FeedError::missing(SITE, "titleId"))?;
    let title = require(SITE, "titleName", detail.title_name.unwrap_or_default())?;
    let author = require(SITE, "author", detail.author.unwrap_or_default())?;

    let mut feed = Feed::new(title, target.as_str())
        .with_description(trim_description(&detail.description.unwrap_or_default()))
        .with_author(author);

    let base = origin(target)?;
    for chapter in detail.chapters {
        // non-zero status marks chapters that are not readable
        if chapter.status != 0 {
            continue;
        }
        let (Some(id), Some(main_text)) = (chapter.id, chapter.main_text) else {
            continue;
        };

        let link = format!("{}title/{}/chapter/{}", base, title_id, id);
        let thumbnail = chapter
            .thumbnail_url
            .map(|src| resolve_relative_url(&base, &src))
            .transpose()?;

        feed.push(
            Item::new(hashed_hex(&link), main_text, link)
                .with_description(chapter.sub_text)
                .with_enclosure(thumbnail),
        );
    }

    Ok((title_id, ensure_items(SITE, feed)?))
}
