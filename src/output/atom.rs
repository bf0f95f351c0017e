use std::io::Write;

use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::domain::{Feed, Item};
use crate::errors::{FeedError, FeedResult};

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";

fn xml_err(e: impl std::fmt::Display) -> FeedError {
    FeedError::Serialize(e.to_string())
}

/// Render `feed` as an Atom 1.0 document.
pub fn to_atom(feed: &Feed) -> FeedResult<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_err)?;

    let mut root = BytesStart::new("feed");
    root.push_attribute(("xmlns", ATOM_NS));
    writer.write_event(Event::Start(root)).map_err(xml_err)?;

    let updated = feed_updated(feed);

    write_text_element(&mut writer, "title", &feed.title)?;
    write_text_element(&mut writer, "id", &feed.link)?;
    write_text_element(&mut writer, "updated", &timestamp(updated))?;
    write_link(&mut writer, "alternate", &feed.link)?;
    if !feed.description.is_empty() {
        write_text_element(&mut writer, "subtitle", &feed.description)?;
    }
    if !feed.author.is_empty() {
        writer
            .write_event(Event::Start(BytesStart::new("author")))
            .map_err(xml_err)?;
        write_text_element(&mut writer, "name", &feed.author)?;
        writer
            .write_event(Event::End(BytesEnd::new("author")))
            .map_err(xml_err)?;
    }

    for item in &feed.items {
        write_entry(&mut writer, item, updated)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("feed")))
        .map_err(xml_err)?;

    String::from_utf8(writer.into_inner()).map_err(xml_err)
}

/// Atom requires a feed-level `updated`; fall back to the newest known time.
fn feed_updated(feed: &Feed) -> DateTime<Utc> {
    feed.updated
        .or(feed.created)
        .or_else(|| feed.items.iter().filter_map(Item::latest_timestamp).max())
        .unwrap_or_else(Utc::now)
}

fn write_entry<W: Write>(
    writer: &mut Writer<W>,
    item: &Item,
    fallback: DateTime<Utc>,
) -> FeedResult<()> {
    writer
        .write_event(Event::Start(BytesStart::new("entry")))
        .map_err(xml_err)?;

    write_text_element(writer, "title", &item.title)?;
    write_text_element(writer, "id", &item.id)?;
    write_link(writer, "alternate", &item.link)?;

    let updated = item.updated.or(item.created).unwrap_or(fallback);
    write_text_element(writer, "updated", &timestamp(updated))?;
    if let Some(created) = item.created {
        write_text_element(writer, "published", &timestamp(created))?;
    }
    if let Some(description) = &item.description {
        write_text_element(writer, "summary", description)?;
    }
    if let Some(enclosure) = &item.enclosure {
        write_link(writer, "enclosure", enclosure)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("entry")))
        .map_err(xml_err)?;
    Ok(())
}

fn write_text_element<W: Write>(writer: &mut Writer<W>, name: &str, text: &str) -> FeedResult<()> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Text(BytesText::new(&sanitize_text(text))))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_err)?;
    Ok(())
}

fn write_link<W: Write>(writer: &mut Writer<W>, rel: &str, href: &str) -> FeedResult<()> {
    let mut link = BytesStart::new("link");
    link.push_attribute(("rel", rel));
    link.push_attribute(("href", href));
    writer.write_event(Event::Empty(link)).map_err(xml_err)?;
    Ok(())
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

// XML 1.0 forbids control characters other than tab, LF and CR
fn sanitize_text(input: &str) -> String {
    input
        .chars()
        .filter(|&c| matches!(c, '\t' | '\n' | '\r') || !c.is_control())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::parse_rfc3339;

    fn sample_feed() -> Feed {
        let mut feed = Feed::new("テスト & タイトル", "https://kirapo.jp/meteor/titles/test")
            .with_description("テストストーリー")
            .with_author("テスト著者")
            .with_updated(Some(parse_rfc3339("2023-05-18T16:17:12+09:00").unwrap()));

        feed.push(
            Item::new("eeec23eabaa19622c2dff466251aa48a", "第2話 <前編>", "https://example.com/test/2")
                .with_created(Some(parse_rfc3339("2023-05-11T00:00:00+09:00").unwrap()))
                .with_description(Some("サブタイトル".to_string()))
                .with_enclosure(Some("https://example.com/img/2.jpg".to_string())),
        );
        feed.push(Item::new("1", "第1話\u{0008}", "https://example.com/test/1"));
        feed
    }

    #[test]
    fn test_output_is_a_valid_atom_feed() {
        let xml = to_atom(&sample_feed()).unwrap();
        let parsed = feed_rs::parser::parse(xml.as_bytes()).unwrap();

        assert_eq!(parsed.feed_type, feed_rs::model::FeedType::Atom);
        assert_eq!(parsed.title.unwrap().content, "テスト & タイトル");
        assert_eq!(parsed.authors[0].name, "テスト著者");
        assert_eq!(
            parsed.updated,
            Some(parse_rfc3339("2023-05-18T07:17:12Z").unwrap())
        );

        assert_eq!(parsed.entries.len(), 2);
        let first = &parsed.entries[0];
        assert_eq!(first.id, "eeec23eabaa19622c2dff466251aa48a");
        assert_eq!(first.title.as_ref().unwrap().content, "第2話 <前編>");
        assert_eq!(first.summary.as_ref().unwrap().content, "サブタイトル");
        assert_eq!(
            first.published,
            Some(parse_rfc3339("2023-05-10T15:00:00Z").unwrap())
        );
        assert!(first
            .links
            .iter()
            .any(|l| l.href == "https://example.com/test/2"));
        assert!(first
            .links
            .iter()
            .any(|l| l.rel.as_deref() == Some("enclosure") && l.href == "https://example.com/img/2.jpg"));

        assert_eq!(parsed.entries[1].title.as_ref().unwrap().content, "第1話");
    }

    #[test]
    fn test_entry_without_time_uses_feed_updated() {
        let xml = to_atom(&sample_feed()).unwrap();
        let parsed = feed_rs::parser::parse(xml.as_bytes()).unwrap();
        assert_eq!(parsed.entries[1].updated, parsed.updated);
    }

    #[test]
    fn test_feed_updated_fallback_order() {
        let mut feed = Feed::new("t", "https://example.com/");
        let created = parse_rfc3339("2023-01-01T00:00:00Z").unwrap();
        let item_time = parse_rfc3339("2023-02-01T00:00:00Z").unwrap();

        feed.push(Item::new("1", "a", "https://example.com/1").with_updated(Some(item_time)));
        assert_eq!(feed_updated(&feed), item_time);

        let feed = feed.with_created(Some(created));
        assert_eq!(feed_updated(&feed), created);
    }

    #[test]
    fn test_special_characters_are_escaped() {
        let xml = to_atom(&sample_feed()).unwrap();
        assert!(xml.contains("テスト &amp; タイトル"));
        assert!(xml.contains("第2話 &lt;前編&gt;"));
        assert!(!xml.contains('\u{0008}'));
    }
}
