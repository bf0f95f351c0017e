//! URL and identity helpers shared by every site extractor.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use md5::{Digest, Md5};
use url::Url;

use crate::errors::{FeedError, FeedResult};

const JST_OFFSET_SECS: i32 = 9 * 3600;

/// Keep only `[A-Za-z0-9_]`, producing a filesystem-safe slug.
pub fn escape_path(path: &str) -> String {
    path.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

/// Normalize line breaks, trim every line and glue the lines back together
/// with no separator.
pub fn trim_description(desc: &str) -> String {
    desc.replace("\r\n", "\n")
        .replace('\r', "\n")
        .split('\n')
        .map(str::trim)
        .collect()
}

/// Resolve `relative` against `base`; absolute URLs pass through unchanged.
pub fn resolve_relative_url(base: &Url, relative: &str) -> FeedResult<String> {
    base.join(relative)
        .map(String::from)
        .map_err(|source| FeedError::InvalidUrl {
            url: relative.to_string(),
            source,
        })
}

/// Hex-encoded MD5 of `id`, used for items without a natural identifier.
pub fn hashed_hex(id: &str) -> String {
    hex::encode(Md5::digest(id.as_bytes()))
}

/// Scheme, host and port of `target` as a base for site-relative API paths.
pub fn origin(target: &Url) -> FeedResult<Url> {
    target
        .join("/")
        .map_err(|source| FeedError::InvalidUrl {
            url: target.to_string(),
            source,
        })
}

/// Parse a wall-clock time in Asia/Tokyo with a chrono format string.
pub fn parse_jst_datetime(value: &str, format: &str) -> FeedResult<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(value, format).map_err(|e| FeedError::Timestamp {
        value: value.to_string(),
        reason: e.to_string(),
    })?;
    localize_jst(naive, value)
}

/// Parse a calendar date in Asia/Tokyo; the result is local midnight.
pub fn parse_jst_date(value: &str, format: &str) -> FeedResult<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(value, format).map_err(|e| FeedError::Timestamp {
        value: value.to_string(),
        reason: e.to_string(),
    })?;
    localize_jst(date.and_time(Default::default()), value)
}

fn localize_jst(naive: NaiveDateTime, value: &str) -> FeedResult<DateTime<Utc>> {
    let timestamp_error = |reason: &str| FeedError::Timestamp {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    FixedOffset::east_opt(JST_OFFSET_SECS)
        .ok_or_else(|| timestamp_error("invalid Asia/Tokyo offset"))?
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| timestamp_error("ambiguous local time"))
}

pub fn parse_rfc3339(value: &str) -> FeedResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| FeedError::Timestamp {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_path() {
        assert_eq!(escape_path("sa1Tama"), "sa1Tama");
        assert_eq!(escape_path("sa1/ama"), "sa1ama");
        assert_eq!(escape_path("sa1_ama"), "sa1_ama");
        assert_eq!(escape_path("/path_t/est"), "path_test");
        assert_eq!(escape_path("/ワーク/1-2"), "12");
    }

    #[test]
    fn test_trim_description() {
        assert_eq!(trim_description("sa1Tama"), "sa1Tama");
        assert_eq!(trim_description(" sa1 \nTama"), "sa1Tama");
        assert_eq!(trim_description("    sa1 \r Tama"), "sa1Tama");
        assert_eq!(trim_description("a\r\n  b \r\n\r\nc"), "abc");
    }

    #[test]
    fn test_trim_description_idempotent() {
        let inputs = ["  テスト\r\n てすと \n", "a b\rc", "", "\n\n", " x "];
        for input in inputs {
            let once = trim_description(input);
            assert_eq!(trim_description(&once), once, "input {:?}", input);
        }
    }

    #[test]
    fn test_resolve_relative_url() {
        let base = Url::parse("https://www.example.com/").unwrap();

        assert_eq!(
            resolve_relative_url(&base, "saitama").unwrap(),
            "https://www.example.com/saitama"
        );
        assert_eq!(
            resolve_relative_url(&base, "sait/ama").unwrap(),
            "https://www.example.com/sait/ama"
        );
        assert_eq!(
            resolve_relative_url(&base, "sait/ama/").unwrap(),
            "https://www.example.com/sait/ama/"
        );
        assert_eq!(
            resolve_relative_url(&base, "https://cdn.example.org/a.png").unwrap(),
            "https://cdn.example.org/a.png"
        );
    }

    #[test]
    fn test_hashed_hex() {
        assert_eq!(hashed_hex(""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(hashed_hex("example"), "1a79a4d60de6718e8e5b326e338ae533");
        assert_eq!(hashed_hex("example"), hashed_hex("example"));
    }

    #[test]
    fn test_origin() {
        let target = Url::parse("http://127.0.0.1:8080/series/abc?x=1").unwrap();
        assert_eq!(origin(&target).unwrap().as_str(), "http://127.0.0.1:8080/");
    }

    #[test]
    fn test_parse_jst_datetime() {
        let parsed = parse_jst_datetime("2022/05/27 18:41", "%Y/%m/%d %H:%M").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2022-05-27T09:41:00+00:00");

        assert!(parse_jst_datetime("hogehogehogehoge", "%Y/%m/%d %H:%M").is_err());
    }

    #[test]
    fn test_parse_jst_date_accepts_unpadded() {
        let parsed = parse_jst_date("2024/8/2", "%Y/%m/%d").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-08-01T15:00:00+00:00");
    }
}
