use chrono::Utc;
use feed_rs::model::{Entry, Feed, MediaContent, MediaObject};

use super::{
    decode_title, first_image_src, is_image_type, non_empty, preferred_link, text_content,
    FeedFormat, FeedMeta, ParsedArticle, ParsedFeed, UNTITLED_ARTICLE, UNTITLED_FEED,
};

const IMAGE_EXTENSIONS: [&str; 7] = [".jpg", ".jpeg", ".png", ".gif", ".webp", ".avif", ".svg"];

pub(super) fn from_atom(feed: Feed, source_url: &str) -> ParsedFeed {
    let meta = FeedMeta {
        title: text_content(feed.title)
            .map(|t| decode_title(&t))
            .unwrap_or_else(|| UNTITLED_FEED.to_string()),
        description: text_content(feed.description).unwrap_or_default(),
        link: preferred_link(&feed.links).unwrap_or_else(|| source_url.to_string()),
        icon_url: feed
            .icon
            .or(feed.logo)
            .and_then(|image| non_empty(&image.uri)),
    };

    ParsedFeed {
        feed: meta,
        articles: feed.entries.into_iter().map(from_entry).collect(),
        format: FeedFormat::Atom,
    }
}

fn from_entry(entry: Entry) -> ParsedArticle {
    let summary = text_content(entry.summary);
    let content = entry
        .content
        .and_then(|c| c.body)
        .and_then(|body| non_empty(&body))
        .or_else(|| summary.clone());

    let image_url =
        media_image(&entry.media).or_else(|| content.as_deref().and_then(first_image_src));

    ParsedArticle {
        title: text_content(entry.title)
            .map(|t| decode_title(&t))
            .unwrap_or_else(|| UNTITLED_ARTICLE.to_string()),
        link: preferred_link(&entry.links).unwrap_or_default(),
        summary: summary.unwrap_or_default(),
        content,
        author: entry
            .authors
            .into_iter()
            .find_map(|person| non_empty(&person.name)),
        image_url,
        guid: non_empty(&entry.id),
        published_at: entry.published.or(entry.updated).unwrap_or_else(Utc::now),
    }
}

/// Media RSS image attached to an entry: image-like `media:content`, then
/// a `media:thumbnail`.
fn media_image(media: &[MediaObject]) -> Option<String> {
    media
        .iter()
        .flat_map(|object| object.content.iter())
        .filter(|content| is_image_content(content))
        .find_map(|content| content.url.as_ref())
        .map(|url| url.to_string())
        .or_else(|| {
            media
                .iter()
                .flat_map(|object| object.thumbnails.iter())
                .find_map(|thumbnail| non_empty(&thumbnail.image.uri))
        })
}

fn is_image_content(content: &MediaContent) -> bool {
    let typed_image = content
        .content_type
        .as_ref()
        .is_some_and(|t| is_image_type(&t.to_string()));
    let image_path = content.url.as_ref().is_some_and(|url| {
        let path = url.path().to_ascii_lowercase();
        IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
    });
    typed_image || image_path
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::super::parse;
    use super::*;

    fn atom(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:media="http://search.yahoo.com/mrss/">
  <title>Atom Feed</title>
  {}
</feed>"#,
            body
        )
    }

    #[test]
    fn test_feed_metadata() {
        let parsed = parse(
            &atom(r#"
                <subtitle>Things happen</subtitle>
                <logo>https://example.com/logo.png</logo>
                <link rel="self" href="https://example.com/atom.xml"/>
                <link rel="alternate" href="https://example.com/"/>
            "#),
            "https://example.com/atom.xml",
        )
        .unwrap();

        assert_eq!(parsed.format, FeedFormat::Atom);
        assert_eq!(parsed.feed.title, "Atom Feed");
        assert_eq!(parsed.feed.description, "Things happen");
        assert_eq!(parsed.feed.link, "https://example.com/");
        assert_eq!(
            parsed.feed.icon_url.as_deref(),
            Some("https://example.com/logo.png")
        );
    }

    #[test]
    fn test_icon_preferred_over_logo() {
        let parsed = parse(
            &atom("<icon>https://example.com/icon.ico</icon><logo>https://example.com/logo.png</logo>"),
            "https://example.com/atom.xml",
        )
        .unwrap();
        assert_eq!(
            parsed.feed.icon_url.as_deref(),
            Some("https://example.com/icon.ico")
        );
    }

    #[test]
    fn test_feed_link_defaults_to_source_url() {
        let parsed = parse(&atom(""), "https://example.com/atom.xml").unwrap();
        assert_eq!(parsed.feed.link, "https://example.com/atom.xml");
        assert_eq!(parsed.feed.description, "");
        assert!(parsed.articles.is_empty());
    }

    #[test]
    fn test_any_link_when_no_alternate() {
        let parsed = parse(
            &atom(r#"<entry><title>E</title><link rel="related" href="https://example.com/related"/></entry>"#),
            "https://example.com/atom.xml",
        )
        .unwrap();
        assert_eq!(parsed.articles[0].link, "https://example.com/related");
    }

    #[test]
    fn test_entry_fields() {
        let parsed = parse(
            &atom(r#"
            <entry>
                <title>Entry One</title>
                <id>urn:uuid:1225c695-cfb8-4ebb-aaaa-80da344efa6a</id>
                <link rel="enclosure" href="https://example.com/file.bin"/>
                <link rel="alternate" href="https://example.com/one"/>
                <published>2024-02-01T10:00:00Z</published>
                <updated>2024-02-03T10:00:00Z</updated>
                <author><name>Ada</name><email>ada@example.com</email></author>
                <summary>Short</summary>
                <content type="html">&lt;p&gt;Long&lt;/p&gt;</content>
            </entry>"#),
            "https://example.com/atom.xml",
        )
        .unwrap();

        let entry = &parsed.articles[0];
        assert_eq!(entry.title, "Entry One");
        assert_eq!(entry.link, "https://example.com/one");
        assert_eq!(entry.summary, "Short");
        assert_eq!(entry.content.as_deref(), Some("<p>Long</p>"));
        assert_eq!(entry.author.as_deref(), Some("Ada"));
        assert_eq!(
            entry.guid.as_deref(),
            Some("urn:uuid:1225c695-cfb8-4ebb-aaaa-80da344efa6a")
        );
        assert_eq!(
            entry.published_at,
            Utc.with_ymd_and_hms(2024, 2, 1, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_entry_without_id_or_link_keeps_stable_identity() {
        let doc = atom("<entry><title>Linkless</title><updated>2024-01-01T00:00:00Z</updated></entry>");
        let first = parse(&doc, "https://example.com/atom.xml").unwrap();
        let second = parse(&doc, "https://example.com/atom.xml").unwrap();

        assert!(first.articles[0].guid.is_none());
        assert_eq!(first.articles[0].identity(), "Linkless");
        assert_eq!(first, second);
    }

    #[test]
    fn test_updated_used_when_published_missing() {
        let parsed = parse(
            &atom("<entry><title>E</title><updated>2023-12-13T18:30:02Z</updated></entry>"),
            "https://example.com/atom.xml",
        )
        .unwrap();
        assert_eq!(
            parsed.articles[0].published_at,
            Utc.with_ymd_and_hms(2023, 12, 13, 18, 30, 2).unwrap()
        );
    }

    #[test]
    fn test_entry_defaults() {
        let before = Utc::now();
        let parsed = parse(&atom("<entry><title>Bare</title></entry>"), "https://example.com/atom.xml").unwrap();
        let entry = &parsed.articles[0];

        assert_eq!(entry.link, "");
        assert_eq!(entry.summary, "");
        assert!(entry.content.is_none());
        assert!(entry.author.is_none());
        assert!((entry.published_at - before).abs() < Duration::seconds(1));
    }

    #[test]
    fn test_content_falls_back_to_summary() {
        let parsed = parse(
            &atom("<entry><title>E</title><summary>Only summary</summary></entry>"),
            "https://example.com/atom.xml",
        )
        .unwrap();
        assert_eq!(parsed.articles[0].content.as_deref(), Some("Only summary"));
    }

    #[test]
    fn test_media_image_preferred() {
        let parsed = parse(
            &atom(r#"<entry>
                <title>E</title>
                <content type="html">&lt;img src="https://example.com/inline.png"&gt;</content>
                <media:content url="https://example.com/media.jpg" medium="image"/>
            </entry>"#),
            "https://example.com/atom.xml",
        )
        .unwrap();
        assert_eq!(
            parsed.articles[0].image_url.as_deref(),
            Some("https://example.com/media.jpg")
        );
    }

    #[test]
    fn test_media_thumbnail_in_group() {
        let parsed = parse(
            &atom(r#"<entry>
                <title>E</title>
                <media:group>
                    <media:content url="https://example.com/video.mp4" type="video/mp4"/>
                    <media:thumbnail url="https://example.com/thumb.jpg"/>
                </media:group>
            </entry>"#),
            "https://example.com/atom.xml",
        )
        .unwrap();
        assert_eq!(
            parsed.articles[0].image_url.as_deref(),
            Some("https://example.com/thumb.jpg")
        );
    }
}
