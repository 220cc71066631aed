//! RSS 2.0 / Atom 1.0 parsing into a format-independent model.
//!
//! Documents are classified by their root element and then read with
//! feed-rs. Parsing is pure: no I/O, no clock reads beyond the "now"
//! fallback used for entries without a usable date.

mod atom;
mod rss;

use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use feed_rs::model::{FeedType, Link, Text};
use feed_rs::parser::{self, ParseErrorKind, ParseFeedError};
use html_escape::decode_html_entities;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::app::ParseError;

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";

pub const UNTITLED_FEED: &str = "Untitled Feed";
pub const UNTITLED_ARTICLE: &str = "Untitled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedFormat {
    Rss2,
    Atom,
}

impl fmt::Display for FeedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedFormat::Rss2 => f.write_str("RSS 2.0"),
            FeedFormat::Atom => f.write_str("Atom 1.0"),
        }
    }
}

/// Channel-level metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedMeta {
    pub title: String,
    pub description: String,
    pub link: String,
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedArticle {
    pub title: String,
    pub link: String,
    pub summary: String,
    pub content: Option<String>,
    pub author: Option<String>,
    pub image_url: Option<String>,
    pub guid: Option<String>,
    pub published_at: DateTime<Utc>,
}

impl ParsedArticle {
    /// Stable identity within a feed: guid, then link, then title.
    pub fn identity(&self) -> &str {
        match self.guid.as_deref() {
            Some(guid) if !guid.is_empty() => guid,
            _ if !self.link.is_empty() => &self.link,
            _ => &self.title,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFeed {
    pub feed: FeedMeta,
    pub articles: Vec<ParsedArticle>,
    pub format: FeedFormat,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FeedParser;

impl FeedParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, raw_text: &str, source_url: &str) -> Result<ParsedFeed, ParseError> {
        parse(raw_text, source_url)
    }
}

pub fn parse(raw_text: &str, source_url: &str) -> Result<ParsedFeed, ParseError> {
    let text = raw_text.trim_start_matches('\u{feff}').trim_start();
    let expected = detect_format(text)?;

    // Entries without an id keep an empty one so identity falls back to
    // link, then title, instead of a generated value.
    let reader = parser::Builder::new()
        .id_generator(|_, _, _| String::new())
        .build();

    let feed = reader.parse(text.as_bytes()).map_err(|e| match e {
        ParseFeedError::ParseError(ParseErrorKind::NoFeedRoot) => {
            ParseError::InvalidFeedStructure("document has no feed root".into())
        }
        ParseFeedError::ParseError(kind) => ParseError::InvalidFeedStructure(format!("{:?}", kind)),
        other => ParseError::MalformedXml(other.to_string()),
    })?;

    let consistent = matches!(
        (expected, &feed.feed_type),
        (FeedFormat::Rss2, FeedType::RSS2) | (FeedFormat::Atom, FeedType::Atom)
    );
    if !consistent {
        return Err(ParseError::UnsupportedFormat(format!(
            "{:?} document",
            feed.feed_type
        )));
    }

    Ok(match expected {
        FeedFormat::Rss2 => rss::from_rss(feed, source_url),
        FeedFormat::Atom => atom::from_atom(feed, source_url),
    })
}

/// Opening tag of the document element.
struct RootTag<'a> {
    name: &'a str,
    attributes: &'a str,
}

impl RootTag<'_> {
    fn local_name(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(self.name)
    }

    fn version(&self) -> Option<&str> {
        static VERSION: OnceLock<Option<Regex>> = OnceLock::new();
        VERSION
            .get_or_init(|| Regex::new(r#"(?:^|\s)version\s*=\s*["']([^"']*)["']"#).ok())
            .as_ref()?
            .captures(self.attributes)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }

    fn declares(&self, namespace: &str) -> bool {
        self.attributes.contains(namespace)
    }
}

fn root_tag(text: &str) -> Option<RootTag<'_>> {
    static ROOT: OnceLock<Option<Regex>> = OnceLock::new();
    let caps = ROOT
        .get_or_init(|| {
            Regex::new(
                r"^(?s:\s*(?:<\?.*?\?>|<!--.*?-->|<![^>]*>))*\s*<([A-Za-z_][\w.:-]*)([^>]*)>",
            )
            .ok()
        })
        .as_ref()?
        .captures(text)?;

    Some(RootTag {
        name: caps.get(1)?.as_str(),
        attributes: caps.get(2)?.as_str(),
    })
}

fn has_channel(text: &str) -> bool {
    static CHANNEL: OnceLock<Option<Regex>> = OnceLock::new();
    CHANNEL
        .get_or_init(|| Regex::new(r"<channel[\s/>]").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(text))
}

/// Classifies a document by its root element before handing it to feed-rs,
/// which accepts more dialects than we store.
fn detect_format(text: &str) -> Result<FeedFormat, ParseError> {
    let root = root_tag(text)
        .ok_or_else(|| ParseError::MalformedXml("no root element found".into()))?;

    match root.local_name() {
        "rss" if root.version() == Some("2.0") => {
            if has_channel(text) {
                Ok(FeedFormat::Rss2)
            } else {
                Err(ParseError::InvalidFeedStructure(
                    "RSS document has no <channel> element".into(),
                ))
            }
        }
        "rss" => Err(ParseError::UnsupportedFormat(format!(
            "rss version {}",
            root.version().unwrap_or("(none)")
        ))),
        "feed" if root.declares(ATOM_NS) => Ok(FeedFormat::Atom),
        "feed" => Err(ParseError::UnsupportedFormat(
            "feed element outside the Atom namespace".into(),
        )),
        _ => Err(ParseError::UnsupportedFormat(format!(
            "root element <{}>",
            root.name
        ))),
    }
}

/// Trimmed, non-empty text.
pub(crate) fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub(crate) fn text_content(text: Option<Text>) -> Option<String> {
    text.and_then(|t| non_empty(&t.content))
}

/// `rel="alternate"` link, else the first link of any relation.
pub(crate) fn preferred_link(links: &[Link]) -> Option<String> {
    let usable: Vec<&Link> = links.iter().filter(|l| !l.href.trim().is_empty()).collect();
    usable
        .iter()
        .find(|l| l.rel.as_deref() == Some("alternate"))
        .or_else(|| usable.iter().find(|l| l.rel.as_deref() != Some("self")))
        .or_else(|| usable.first())
        .map(|l| l.href.trim().to_string())
}

pub(crate) fn is_image_type(media_type: &str) -> bool {
    media_type.trim().to_ascii_lowercase().starts_with("image/")
}

pub(crate) fn decode_title(raw: &str) -> String {
    decode_html_entities(raw).to_string()
}

fn img_src_regex() -> Option<&'static Regex> {
    static IMG_SRC: OnceLock<Option<Regex>> = OnceLock::new();
    IMG_SRC
        .get_or_init(|| Regex::new(r#"(?i)<img[^>]*\ssrc\s*=\s*["']([^"']+)["']"#).ok())
        .as_ref()
}

/// `src` of the first `<img>` tag in an HTML fragment.
pub(crate) fn first_image_src(html: &str) -> Option<String> {
    img_src_regex()?
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Sample RSS Feed</title>
    <link>https://example.com</link>
    <description>A sample RSS feed for testing</description>
    <item>
      <title>First Article</title>
      <link>https://example.com/article1</link>
      <description>This is the first article</description>
      <author>john@example.com (John Doe)</author>
      <pubDate>Mon, 01 Jan 2024 12:00:00 GMT</pubDate>
      <guid>article-1</guid>
    </item>
    <item>
      <title>Second Article</title>
      <link>https://example.com/article2</link>
      <description>This is the second article</description>
      <pubDate>Tue, 02 Jan 2024 12:00:00 GMT</pubDate>
    </item>
  </channel>
</rss>"#;

    const SAMPLE_ATOM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Sample Atom Feed</title>
  <subtitle>An Atom test feed</subtitle>
  <link href="https://example.com/atom.xml" rel="self"/>
  <link href="https://example.com" rel="alternate"/>
  <entry>
    <title>Atom Entry</title>
    <link href="https://example.com/entry1"/>
    <id>urn:entry:1</id>
    <updated>2024-01-01T00:00:00Z</updated>
    <summary>Entry summary</summary>
  </entry>
</feed>"#;

    #[test]
    fn test_sample_rss_scenario() {
        let parsed = parse(SAMPLE_RSS, "https://example.com/feed.xml").unwrap();

        assert_eq!(parsed.format, FeedFormat::Rss2);
        assert_eq!(parsed.feed.title, "Sample RSS Feed");
        assert_eq!(parsed.articles.len(), 2);
        assert_eq!(parsed.articles[0].title, "First Article");
        assert_eq!(parsed.articles[1].title, "Second Article");
        assert_eq!(
            parsed.articles[0].author.as_deref(),
            Some("john@example.com (John Doe)")
        );
    }

    #[test]
    fn test_format_detection() {
        let rss = parse(SAMPLE_RSS, "https://example.com/feed.xml").unwrap();
        assert_eq!(rss.format.to_string(), "RSS 2.0");

        let atom = parse(SAMPLE_ATOM, "https://example.com/atom.xml").unwrap();
        assert_eq!(atom.format.to_string(), "Atom 1.0");
    }

    #[test]
    fn test_unknown_root_is_unsupported() {
        let err = parse("<html><body/></html>", "https://example.com").unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_rss_without_version_two_is_unsupported() {
        let err = parse(
            r#"<rss version="0.91"><channel><title>Old</title></channel></rss>"#,
            "https://example.com",
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_feed_outside_atom_namespace_is_unsupported() {
        let err = parse("<feed><title>Not Atom</title></feed>", "https://example.com").unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_malformed_xml() {
        for text in ["", "   ", "not xml at all", "<<<>>>"] {
            let err = parse(text, "https://example.com").unwrap_err();
            assert!(matches!(err, ParseError::MalformedXml(_)), "{:?}", text);
        }
    }

    #[test]
    fn test_rss_without_version_is_unsupported() {
        let err = parse("<rss><channel/></rss>", "https://example.com").unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_rdf_is_unsupported() {
        let err = parse(
            r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"><channel/></rdf:RDF>"#,
            "https://example.com",
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_root_tag_skips_prolog() {
        let text = "<?xml version=\"1.0\"?>\n<!-- generated -->\n<!DOCTYPE rss>\n<rss version=\"2.0\">";
        let root = root_tag(text).unwrap();
        assert_eq!(root.name, "rss");
        assert_eq!(root.version(), Some("2.0"));
    }

    #[test]
    fn test_prefixed_atom_root() {
        let root = root_tag(r#"<atom:feed xmlns:atom="http://www.w3.org/2005/Atom">"#).unwrap();
        assert_eq!(root.local_name(), "feed");
        assert!(root.declares(ATOM_NS));
    }

    #[test]
    fn test_first_image_src_case_insensitive() {
        let html = r#"<p>Intro</p><IMG class="hero" SRC="https://example.com/a.png"><img src="https://example.com/b.png">"#;
        assert_eq!(
            first_image_src(html).as_deref(),
            Some("https://example.com/a.png")
        );
    }

    #[test]
    fn test_first_image_src_ignores_data_src() {
        let html = r#"<img data-src="https://example.com/lazy.png">"#;
        assert_eq!(first_image_src(html), None);
    }

    #[test]
    fn test_identity_fallbacks() {
        let mut article = ParsedArticle {
            title: "Title".into(),
            link: String::new(),
            summary: String::new(),
            content: None,
            author: None,
            image_url: None,
            guid: None,
            published_at: Utc::now(),
        };
        assert_eq!(article.identity(), "Title");

        article.link = "https://example.com/a".into();
        assert_eq!(article.identity(), "https://example.com/a");

        article.guid = Some("guid-1".into());
        assert_eq!(article.identity(), "guid-1");
    }
}
