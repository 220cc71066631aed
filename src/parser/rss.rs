use chrono::Utc;
use feed_rs::model::{Entry, Feed, MediaObject, Person};

use super::{
    decode_title, first_image_src, is_image_type, non_empty, preferred_link, text_content,
    FeedFormat, FeedMeta, ParsedArticle, ParsedFeed, UNTITLED_ARTICLE, UNTITLED_FEED,
};

pub(super) fn from_rss(feed: Feed, source_url: &str) -> ParsedFeed {
    let meta = FeedMeta {
        title: text_content(feed.title)
            .map(|t| decode_title(&t))
            .unwrap_or_else(|| UNTITLED_FEED.to_string()),
        description: text_content(feed.description).unwrap_or_default(),
        link: preferred_link(&feed.links).unwrap_or_else(|| source_url.to_string()),
        icon_url: feed
            .logo
            .or(feed.icon)
            .and_then(|image| non_empty(&image.uri)),
    };

    ParsedFeed {
        feed: meta,
        articles: feed.entries.into_iter().map(from_item).collect(),
        format: FeedFormat::Rss2,
    }
}

fn from_item(item: Entry) -> ParsedArticle {
    let description = text_content(item.summary);
    let content = item
        .content
        .and_then(|c| c.body)
        .and_then(|body| non_empty(&body))
        .or_else(|| description.clone());

    let image_url =
        image_enclosure(&item.media).or_else(|| content.as_deref().and_then(first_image_src));

    ParsedArticle {
        title: text_content(item.title)
            .map(|t| decode_title(&t))
            .unwrap_or_else(|| UNTITLED_ARTICLE.to_string()),
        link: preferred_link(&item.links).unwrap_or_default(),
        summary: description.unwrap_or_default(),
        content,
        author: item_author(&item.authors),
        image_url,
        guid: non_empty(&item.id),
        published_at: item.published.unwrap_or_else(Utc::now),
    }
}

/// `<author>` wins over `<dc:creator>` wherever they appear. feed-rs keeps
/// the raw `<author>` text as the contact address and `<dc:creator>` as a
/// plain name.
fn item_author(authors: &[Person]) -> Option<String> {
    authors
        .iter()
        .find_map(|person| person.email.as_deref().and_then(non_empty))
        .or_else(|| authors.iter().find_map(|person| non_empty(&person.name)))
}

/// First enclosure whose MIME type is an image.
fn image_enclosure(media: &[MediaObject]) -> Option<String> {
    media
        .iter()
        .flat_map(|object| object.content.iter())
        .filter(|content| {
            content
                .content_type
                .as_ref()
                .is_some_and(|t| is_image_type(&t.to_string()))
        })
        .find_map(|content| content.url.as_ref())
        .map(|url| url.to_string())
}
