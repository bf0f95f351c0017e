use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use url::Url;

use crate::domain::{CacheMetadata, ConditionalRequest, Feed, Item};
use crate::errors::{FeedError, FeedResult};
use crate::fetcher::{fetch_json, Fetcher};
use crate::sources::traits::{ensure_items, require, SiteExtractor, SiteFeed};
use crate::util::{escape_path, origin};

const SITE: &str = "takecomi";

/// Number of most recent episodes requested from the episode API.
const EPISODE_WINDOW: i64 = 5;

/// Takecomic series. The page itself is never fetched; three JSON calls
/// against the site API build the feed.
#[derive(Debug, Default)]
pub struct TakecomiSource;

impl TakecomiSource {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Deserialize)]
struct EpisodesResponse {
    series: Series,
}

#[derive(Debug, Deserialize)]
struct Series {
    summary: Summary,
    #[serde(default)]
    episodes: Vec<Episode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Summary {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    publish_date: Option<i64>,
    #[serde(default)]
    updated_on: Option<i64>,
    #[serde(default)]
    author: Vec<Author>,
    #[serde(default)]
    num_episodes: i64,
}

#[derive(Debug, Deserialize)]
struct Author {
    #[serde(default)]
    name: String,
    #[serde(default)]
    role: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Episode {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    date_published: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessResponse {
    series_access: SeriesAccess,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeriesAccess {
    #[serde(default)]
    episode_accesses: Vec<EpisodeAccess>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpisodeAccess {
    episode_id: String,
    #[serde(default)]
    has_access: bool,
}

/// A rich-text paragraph of the series description.
#[derive(Debug, Deserialize)]
struct RichTextBlock {
    #[serde(default)]
    children: Vec<RichTextLeaf>,
}

#[derive(Debug, Deserialize)]
struct RichTextLeaf {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl SiteExtractor for TakecomiSource {
    fn site(&self) -> &'static str {
        SITE
    }

    async fn extract(
        &self,
        fetcher: &dyn Fetcher,
        target: Url,
        _conditional: &ConditionalRequest,
    ) -> FeedResult<SiteFeed> {
        let series_hash = series_hash(&target)?;
        let base = origin(&target)?;
        let no_validators = ConditionalRequest::none();

        let summary_url = api_url(&base, "api/episodes", &[("seriesHash", series_hash.clone())])?;
        let (simple, _) = fetch_json::<EpisodesResponse>(fetcher, &summary_url, &no_validators)
            .await
            .map_err(FeedError::stage(SITE, "SummaryErr"))?;

        let description = dequote_description(&simple.series.summary.description)?;

        if simple.series.summary.num_episodes < 1 {
            return Err(FeedError::EmptyResult { site: SITE });
        }
        let (from, to) = episode_window(simple.series.summary.num_episodes);
        let window = [
            ("episodeFrom", from.to_string()),
            ("episodeTo", to.to_string()),
            ("seriesHash", series_hash),
        ];

        let detail_url = api_url(&base, "api/episodes", &window)?;
        let (detail, _) = fetch_json::<EpisodesResponse>(fetcher, &detail_url, &no_validators)
            .await
            .map_err(FeedError::stage(SITE, "EpisodesErr"))?;

        let access_url = api_url(&base, "api/series/access", &window)?;
        let (access, _) = fetch_json::<AccessResponse>(fetcher, &access_url, &no_validators)
            .await
            .map_err(FeedError::stage(SITE, "AccessErr"))?;

        let feed = build_feed(&target, &base, description, detail.series, access.series_access)
            .map_err(FeedError::within(SITE, "ParseErr"))?;

        Ok(SiteFeed {
            name: format!("{}_{}", SITE, escape_path(target.path())),
            feed,
            metadata: CacheMetadata::default(),
        })
    }
}

fn series_hash(target: &Url) -> FeedResult<String> {
    target
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| FeedError::InvalidInput {
            site: SITE,
            reason: "invalid URI".to_string(),
        })
}

fn api_url(base: &Url, path: &str, query: &[(&str, String)]) -> FeedResult<Url> {
    let mut url = base.join(path).map_err(|source| FeedError::InvalidUrl {
        url: path.to_string(),
        source,
    })?;
    url.query_pairs_mut()
        .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
    Ok(url)
}

fn episode_window(num_episodes: i64) -> (i64, i64) {
    ((num_episodes - EPISODE_WINDOW).max(1), num_episodes)
}

/// The description is itself JSON: paragraphs of text runs.
fn dequote_description(raw: &str) -> FeedResult<String> {
    let blocks: Vec<RichTextBlock> = serde_json::from_str(raw)
        .map_err(|e| FeedError::stage(SITE, "DescriptionErr")(e.into()))?;
    Ok(blocks
        .iter()
        .flat_map(|block| block.children.iter())
        .map(|leaf| leaf.text.as_str())
        .collect())
}

fn unix_time(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|s| Utc.timestamp_opt(s, 0).single())
}

fn build_feed(
    target: &Url,
    base: &Url,
    description: String,
    series: Series,
    access: SeriesAccess,
) -> FeedResult<Feed> {
    let readable: HashMap<String, bool> = access
        .episode_accesses
        .into_iter()
        .map(|a| (a.episode_id, a.has_access))
        .collect();

    let title = require(SITE, "name", series.summary.name)?;
    let authors: Vec<String> = series
        .summary
        .author
        .iter()
        .filter(|a| !a.name.trim().is_empty())
        .map(|a| format!("{}({})", a.name, a.role))
        .collect();
    let author = require(SITE, "author", authors.join("/"))?;

    let mut feed = Feed::new(title, target.as_str())
        .with_description(description)
        .with_author(author)
        .with_created(unix_time(series.summary.publish_date))
        .with_updated(unix_time(series.summary.updated_on));

    for episode in series.episodes {
        if !readable.get(&episode.id).copied().unwrap_or(false) {
            continue;
        }
        let link = format!("{}episodes/{}", base, episode.id);
        feed.push(
            Item::new(episode.id, episode.title, link)
                .with_updated(unix_time(episode.date_published)),
        );
    }

    ensure_items(SITE, feed)
}
