use encoding_rs::Encoding;
use scraper::{ElementRef, Html, Selector};

use crate::errors::{FeedError, FeedResult};

/// Decoded text of a fetched page.
#[derive(Debug, Clone)]
pub struct Document {
    text: String,
}

impl Document {
    /// Detect the charset of `bytes` and decode them.
    ///
    /// A byte order mark wins over statistical detection. Undecodable input
    /// is an error rather than being replaced.
    pub fn decode(bytes: &[u8]) -> FeedResult<Self> {
        if bytes.is_empty() {
            return Err(FeedError::CharsetDetect("empty body".to_string()));
        }

        let (encoding, payload) = match Encoding::for_bom(bytes) {
            Some((encoding, bom_len)) => (encoding, &bytes[bom_len..]),
            None => {
                let mut detector = chardetng::EncodingDetector::new();
                detector.feed(bytes, true);
                (detector.guess(None, true), bytes)
            }
        };

        let text = encoding
            .decode_without_bom_handling_and_without_replacement(payload)
            .ok_or_else(|| {
                FeedError::CharsetDecode(format!("malformed {} input", encoding.name()))
            })?;

        Ok(Self {
            text: text.into_owned(),
        })
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn html(&self) -> Html {
        Html::parse_document(&self.text)
    }
}

pub fn selector(css: &str) -> FeedResult<Selector> {
    Selector::parse(css).map_err(|e| FeedError::Selector(format!("{}: {}", css, e)))
}

/// Concatenated text of every element under `scope` matching `css`.
pub fn select_text(scope: ElementRef<'_>, css: &str) -> FeedResult<String> {
    let selector = selector(css)?;
    Ok(scope
        .select(&selector)
        .flat_map(|element| element.text())
        .collect())
}

/// Attribute of the first element under `scope` matching `css`.
pub fn select_attr(scope: ElementRef<'_>, css: &str, attr: &str) -> FeedResult<Option<String>> {
    let selector = selector(css)?;
    Ok(scope
        .select(&selector)
        .next()
        .and_then(|element| element.value().attr(attr))
        .map(String::from))
}

pub fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect()
}

/// Body of `<script id="__NEXT_DATA__">`, if present and non-empty.
pub fn next_data_script(html: &Html) -> FeedResult<Option<String>> {
    let text = select_text(html.root_element(), "script#__NEXT_DATA__")?;
    Ok(Some(text).filter(|t| !t.trim().is_empty()))
}
