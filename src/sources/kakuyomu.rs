use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use url::Url;

use crate::domain::{ConditionalRequest, Feed, Item};
use crate::errors::{FeedError, FeedResult};
use crate::fetcher::document::next_data_script;
use crate::fetcher::{fetch_document, Document, Fetcher};
use crate::sources::traits::{ensure_items, SiteExtractor, SiteFeed};
use crate::util::{escape_path, origin, parse_rfc3339, trim_description};

const SITE: &str = "kakuyomu";

static WORK_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/works/(\d+)").expect("work path pattern"));

/// Kakuyomu work pages. Everything comes from the Apollo cache embedded in
/// `__NEXT_DATA__`, a flat map of `Typename:id` entities linked by `__ref`.
#[derive(Debug, Default)]
pub struct KakuyomuSource;

impl KakuyomuSource {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Default, Deserialize)]
struct NextData {
    #[serde(default)]
    props: Props,
    #[serde(default)]
    query: Query,
}

#[derive(Debug, Default, Deserialize)]
struct Props {
    #[serde(rename = "pageProps", default)]
    page_props: PageProps,
}

#[derive(Debug, Default, Deserialize)]
struct PageProps {
    #[serde(rename = "__APOLLO_STATE__")]
    apollo_state: Option<Map<String, Value>>,
}

#[derive(Debug, Default, Deserialize)]
struct Query {
    #[serde(rename = "workId")]
    work_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WorkEntity {
    title: Option<String>,
    introduction: Option<String>,
    #[serde(rename = "lastEpisodePublishedAt")]
    last_episode_published_at: Option<String>,
    author: Option<EntityRef>,
}

#[derive(Debug, Deserialize)]
struct EntityRef {
    #[serde(rename = "__ref")]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserAccountEntity {
    #[serde(rename = "activityName")]
    activity_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EpisodeEntity {
    #[serde(rename = "__typename")]
    typename: Option<String>,
    id: Option<String>,
    title: Option<String>,
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
}

#[async_trait]
impl SiteExtractor for KakuyomuSource {
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

        let (work_id, feed) =
            parse_feed(&document, &target).map_err(FeedError::within(SITE, "ParseErr"))?;

        Ok(SiteFeed {
            name: format!("{}_works{}", SITE, work_id),
            feed,
            metadata,
        })
    }
}

fn entity<T: for<'de> Deserialize<'de>>(
    state: &Map<String, Value>,
    key: &str,
    what: &'static str,
) -> FeedResult<T> {
    let value = state.get(key).ok_or_else(|| FeedError::DataNotFound {
        site: SITE,
        what: format!("{} ({})", what, key),
    })?;
    serde_json::from_value(value.clone()).map_err(|e| FeedError::stage(SITE, what)(e.into()))
}

fn work_id_from_path(target: &Url) -> Option<String> {
    WORK_PATH
        .captures(target.path())
        .map(|caps| caps[1].to_string())
}

fn parse_feed(document: &Document, target: &Url) -> FeedResult<(String, Feed)> {
    let script = next_data_script(&document.html())?.ok_or_else(|| FeedError::DataNotFound {
        site: SITE,
        what: "__NEXT_DATA__".to_string(),
    })?;

    let next_data: NextData = serde_json::from_str(&script)
        .map_err(|e| FeedError::stage(SITE, "__NEXT_DATA__ parse error")(e.into()))?;

    let state = next_data
        .props
        .page_props
        .apollo_state
        .ok_or_else(|| FeedError::DataNotFound {
            site: SITE,
            what: "__APOLLO_STATE__".to_string(),
        })?;

    let work_id = match next_data.query.work_id.filter(|id| !id.is_empty()) {
        Some(id) => id,
        None => work_id_from_path(target).ok_or_else(|| FeedError::missing(SITE, "workId"))?,
    };
    // the id ends up in the stable name and therefore in a file name
    if escape_path(&work_id) != work_id {
        return Err(FeedError::InvalidInput {
            site: SITE,
            reason: format!("unexpected workId {}", work_id),
        });
    }

    let work: WorkEntity = entity(&state, &format!("Work:{}", work_id), "work")?;

    let title = work
        .title
        .filter(|t| !t.is_empty())
        .ok_or_else(|| FeedError::missing(SITE, "title"))?;
    let introduction = work
        .introduction
        .ok_or_else(|| FeedError::missing(SITE, "introduction"))?;
    let updated = work
        .last_episode_published_at
        .ok_or_else(|| FeedError::missing(SITE, "lastEpisodePublishedAt"))
        .and_then(|raw| parse_rfc3339(&raw))?;

    let author_ref = work
        .author
        .and_then(|r| r.id)
        .ok_or_else(|| FeedError::missing(SITE, "authorRef"))?;
    let account: UserAccountEntity = entity(&state, &author_ref, "author account")?;
    let author = account
        .activity_name
        .ok_or_else(|| FeedError::missing(SITE, "activityName"))?;

    let base = origin(target)?;
    let mut feed = Feed::new(title, format!("{}works/{}", base, work_id))
        .with_description(trim_description(&introduction))
        .with_author(author)
        .with_updated(Some(updated));

    let mut episodes: Vec<Item> = state
        .values()
        .filter_map(|value| serde_json::from_value::<EpisodeEntity>(value.clone()).ok())
        .filter(|episode| episode.typename.as_deref() == Some("Episode"))
        .filter_map(|episode| {
            let id = episode.id?;
            let title = episode.title?;
            let published = parse_rfc3339(&episode.published_at?).ok()?;
            let link = format!("{}works/{}/episodes/{}", base, work_id, id);
            Some(Item::new(id, title, link).with_created(Some(published)))
        })
        .collect();

    // the cache is unordered
    episodes.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
    feed.items = episodes;

    Ok((work_id, ensure_items(SITE, feed)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(next_data: &str) -> Document {
        Document::from_text(format!(
            r#"<html><body><script id="__NEXT_DATA__" type="application/json">{}</script></body></html>"#,
            next_data
        ))
    }

    const NEXT_DATA: &str = r#"{
      "props": {"pageProps": {"__APOLLO_STATE__": {
        "Work:1177354055000000000": {
          "__typename": "Work",
          "id": "1177354055000000000",
          "title": "テストタイトル",
          "introduction": "テスト\nてすと\r\nストーリー",
          "lastEpisodePublishedAt": "2023-05-18T07:17:12Z",
          "author": {"__ref": "UserAccount:1"}
        },
        "UserAccount:1": {"__typename": "UserAccount", "activityName": "テスト著者"},
        "Episode:300": {"__typename": "Episode", "id": "300", "title": "第3話", "publishedAt": "2023-05-18T07:17:12Z"},
        "Episode:100": {"__typename": "Episode", "id": "100", "title": "第1話", "publishedAt": "2023-05-01T00:00:00Z"},
        "Episode:200": {"__typename": "Episode", "id": "200", "title": "第2話", "publishedAt": "2023-05-10T00:00:00Z"},
        "Episode:999": {"__typename": "Episode", "id": "999", "title": "draft", "publishedAt": null},
        "TableOfContentsChapter:1": {"__typename": "TableOfContentsChapter", "id": "1"},
        "ROOT_QUERY": {"__typename": "Query"}
      }}},
      "query": {"workId": "1177354055000000000"}
    }"#;

    #[test]
    fn test_parse_feed() {
        let target = Url::parse("https://kakuyomu.jp/works/1177354055000000000").unwrap();
        let (work_id, feed) = parse_feed(&page(NEXT_DATA), &target).unwrap();

        assert_eq!(work_id, "1177354055000000000");
        assert_eq!(feed.title, "テストタイトル");
        assert_eq!(feed.link, "https://kakuyomu.jp/works/1177354055000000000");
        assert_eq!(feed.author, "テスト著者");
        assert_eq!(feed.description, "テストてすとストーリー");
        assert_eq!(feed.updated, Some(parse_rfc3339("2023-05-18T16:17:12+09:00").unwrap()));

        let ids: Vec<&str> = feed.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["100", "200", "300"]);
        assert_eq!(
            feed.items[0].link,
            "https://kakuyomu.jp/works/1177354055000000000/episodes/100"
        );
        assert_eq!(feed.items[2].title, "第3話");
    }

    #[test]
    fn test_work_id_falls_back_to_path() {
        let data = NEXT_DATA.replace(r#""query": {"workId": "1177354055000000000"}"#, r#""query": {}"#);
        let target = Url::parse("https://kakuyomu.jp/works/1177354055000000000/episodes/5").unwrap();
        let (work_id, _) = parse_feed(&page(&data), &target).unwrap();
        assert_eq!(work_id, "1177354055000000000");
    }

    #[test]
    fn test_missing_next_data() {
        let target = Url::parse("https://kakuyomu.jp/works/1").unwrap();
        let err = parse_feed(&Document::from_text("<html></html>"), &target).unwrap_err();
        assert!(matches!(err, FeedError::DataNotFound { site: "kakuyomu", .. }));
    }

    #[test]
    fn test_missing_apollo_state() {
        let target = Url::parse("https://kakuyomu.jp/works/1").unwrap();
        let err = parse_feed(&page(r#"{"props":{"pageProps":{}}}"#), &target).unwrap_err();
        assert!(
            matches!(&err, FeedError::DataNotFound { what, .. } if what == "__APOLLO_STATE__")
        );
    }

    #[test]
    fn test_broken_json_is_parse_error() {
        let target = Url::parse("https://kakuyomu.jp/works/1").unwrap();
        let err = parse_feed(&page("{not json"), &target).unwrap_err();
        assert!(matches!(err.root(), FeedError::Json(_)));
    }

    #[test]
    fn test_missing_author_name() {
        let data = NEXT_DATA.replace(r#""activityName": "テスト著者""#, r#""name": "x""#);
        let target = Url::parse("https://kakuyomu.jp/works/1177354055000000000").unwrap();
        let err = parse_feed(&page(&data), &target).unwrap_err();
        assert!(matches!(err, FeedError::MissingField { field: "activityName", .. }));
    }

    #[test]
    fn test_unsafe_work_id_is_rejected() {
        let data = NEXT_DATA.replace(
            r#""query": {"workId": "1177354055000000000"}"#,
            r#""query": {"workId": "../../tmp/evil"}"#,
        );
        let target = Url::parse("https://kakuyomu.jp/works/1177354055000000000").unwrap();
        let err = parse_feed(&page(&data), &target).unwrap_err();
        assert!(matches!(err, FeedError::InvalidInput { site: "kakuyomu", .. }));
    }

    #[test]
    fn test_untitled_episode_is_skipped() {
        let data = NEXT_DATA.replace(r#""title": "第2話", "#, r#""title": "", "#);
        let target = Url::parse("https://kakuyomu.jp/works/1177354055000000000").unwrap();
        let (_, feed) = parse_feed(&page(&data), &target).unwrap();

        let ids: Vec<&str> = feed.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["100", "300"]);
    }
}
