use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::domain::{ConditionalRequest, Feed, Item};
use crate::errors::{FeedError, FeedResult};
use crate::fetcher::document::next_data_script;
use crate::fetcher::{fetch_document, Document, Fetcher};
use crate::sources::traits::{ensure_items, require, SiteExtractor, SiteFeed};
use crate::util::{escape_path, origin, trim_description};

const SITE: &str = "comicwalker";

/// Query key of the dehydrated react-query entry holding the work detail.
const DETAIL_QUERY_KEY: &str = "/api/contents/details/work";

/// ComicWalker work pages. The work detail is one of many dehydrated
/// queries in `__NEXT_DATA__`; it is located by its query key.
#[derive(Debug, Default)]
pub struct ComicWalkerSource;

impl ComicWalkerSource {
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
#[serde(rename_all = "camelCase")]
struct PageProps {
    #[serde(default)]
    work_code: String,
    #[serde(default)]
    dehydrated_state: DehydratedState,
}

#[derive(Debug, Default, Deserialize)]
struct DehydratedState {
    #[serde(default)]
    queries: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct QueryState {
    data: WorkDetail,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkDetail {
    work: Work,
    #[serde(default)]
    first_episodes: EpisodePage,
}

#[derive(Debug, Deserialize)]
struct Work {
    #[serde(default)]
    title: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    authors: Vec<Author>,
}

#[derive(Debug, Deserialize)]
struct Author {
    #[serde(default)]
    name: String,
    #[serde(default)]
    role: String,
}

#[derive(Debug, Default, Deserialize)]
struct EpisodePage {
    #[serde(default)]
    result: Vec<Episode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Episode {
    id: String,
    code: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    sub_title: String,
    update_date: Option<DateTime<Utc>>,
    #[serde(default)]
    is_active: bool,
}

#[async_trait]
impl SiteExtractor for ComicWalkerSource {
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

        let (work_code, feed) =
            parse_feed(&document, &target).map_err(FeedError::within(SITE, "ParseErr"))?;

        Ok(SiteFeed {
            name: format!("{}_{}", SITE, escape_path(&work_code)),
            feed,
            metadata,
        })
    }
}

/// Find the `state` of the first query whose key array names the detail API.
fn find_detail_state(queries: &[Value]) -> Option<&Value> {
    queries.iter().find_map(|query| {
        let keys = query.get("queryKey")?.as_array()?;
        keys.iter()
            .any(|key| key.as_str() == Some(DETAIL_QUERY_KEY))
            .then(|| query.get("state"))
            .flatten()
    })
}

fn parse_feed(document: &Document, target: &Url) -> FeedResult<(String, Feed)> {
    let script = next_data_script(&document.html())?.ok_or_else(|| FeedError::DataNotFound {
        site: SITE,
        what: "__NEXT_DATA__".to_string(),
    })?;

    let page_props = serde_json::from_str::<NextData>(&script)
        .map_err(|e| FeedError::stage(SITE, "__NEXT_DATA__ parse error")(e.into()))?
        .props
        .page_props;

    if page_props.dehydrated_state.queries.is_empty() {
        return Err(FeedError::DataNotFound {
            site: SITE,
            what: "Queries".to_string(),
        });
    }

    let work_code = require(SITE, "workCode", page_props.work_code)?;

    let state = find_detail_state(&page_props.dehydrated_state.queries).ok_or_else(|| {
        FeedError::DataNotFound {
            site: SITE,
            what: "comic detail".to_string(),
        }
    })?;
    let detail = QueryState::deserialize(state)
        .map_err(|e| FeedError::stage(SITE, "Detailed JSON parse error")(e.into()))?
        .data;

    let title = require(SITE, "title", detail.work.title)?;
    let authors: Vec<String> = detail
        .work
        .authors
        .iter()
        .filter(|a| !a.name.trim().is_empty())
        .map(|a| format!("{}({})", a.name, a.role))
        .collect();
    let author = require(SITE, "author", authors.join(", "))?;

    let base = origin(target)?;
    let work_link = format!("{}detail/{}", base, work_code);

    let mut feed = Feed::new(title, work_link.as_str())
        .with_description(trim_description(&detail.work.summary))
        .with_author(author);

    for episode in detail.first_episodes.result {
        if !episode.is_active {
            continue;
        }
        let link = format!("{}/episodes/{}", work_link, episode.code);
        feed.bump_updated(episode.update_date);
        feed.push(
            Item::new(episode.id, episode.title, link)
                .with_description(Some(episode.sub_title))
                .with_created(episode.update_date),
        );
    }

    Ok((work_code, ensure_items(SITE, feed)?))
}
