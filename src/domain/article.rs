use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::parser::ParsedArticle;
use crate::store::{Collection, Record};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub feed_id: String,
    pub title: String,
    pub summary: String,
    pub content: Option<String>,
    pub author: Option<String>,
    pub image_url: Option<String>,
    pub link: String,
    pub guid: Option<String>,
    pub published_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
    pub is_favorite: bool,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Article {
    /// Build a fresh, unread article owned by `feed_id`.
    pub fn from_parsed(feed_id: &str, parsed: &ParsedArticle) -> Self {
        Self {
            id: Self::generate_id(feed_id, parsed.identity()),
            feed_id: feed_id.to_string(),
            title: parsed.title.clone(),
            summary: parsed.summary.clone(),
            content: parsed.content.clone(),
            author: parsed.author.clone(),
            image_url: parsed.image_url.clone(),
            link: parsed.link.clone(),
            guid: parsed.guid.clone(),
            published_at: parsed.published_at,
            read_at: None,
            is_favorite: false,
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    /// Generate a deterministic ID from the owning feed and the entry identity
    pub fn generate_id(feed_id: &str, entry_identity: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(feed_id.as_bytes());
        hasher.update(entry_identity.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }

    /// Read and not favorited: the only state eviction may delete.
    pub fn is_evictable(&self) -> bool {
        self.is_read() && !self.is_favorite
    }

    /// Get the best available content for display
    pub fn display_content(&self) -> &str {
        self.content.as_deref().unwrap_or(&self.summary)
    }
}

impl Record for Article {
    const COLLECTION: Collection = Collection::Articles;

    fn key(&self) -> String {
        self.id.clone()
    }
}
