use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::parser::FeedMeta;
use crate::store::{Collection, Record};

pub const DEFAULT_REFRESH_INTERVAL_MINUTES: u32 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feed {
    pub id: String,
    pub url: String,
    pub title: String,
    pub description: String,
    pub link: Option<String>,
    pub icon_url: Option<String>,
    pub category_id: Option<String>,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub refresh_interval_minutes: u32,
    pub paused: bool,
    pub error_count: u32,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Feed {
    pub fn new(url: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            url,
            title: String::new(),
            description: String::new(),
            link: None,
            icon_url: None,
            category_id: None,
            last_fetched_at: None,
            refresh_interval_minutes: DEFAULT_REFRESH_INTERVAL_MINUTES,
            paused: false,
            error_count: 0,
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            &self.url
        } else {
            &self.title
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Neither soft-deleted nor paused.
    pub fn is_refreshable(&self) -> bool {
        !self.is_deleted() && !self.paused
    }

    /// Copy parsed channel metadata onto the stored feed.
    pub fn apply_meta(&mut self, meta: &FeedMeta) {
        self.title = meta.title.clone();
        self.description = meta.description.clone();
        self.link = Some(meta.link.clone());
        if meta.icon_url.is_some() {
            self.icon_url = meta.icon_url.clone();
        }
    }

    pub fn apply_update(&mut self, update: &FeedUpdate) {
        if let Some(ref title) = update.title {
            self.title = title.clone();
        }
        if let Some(ref description) = update.description {
            self.description = description.clone();
        }
        if update.clear_category {
            self.category_id = None;
        } else if let Some(ref category_id) = update.category_id {
            self.category_id = Some(category_id.clone());
        }
        if let Some(minutes) = update.refresh_interval_minutes {
            self.refresh_interval_minutes = minutes;
        }
        if let Some(paused) = update.paused {
            self.paused = paused;
        }
    }
}

impl Record for Feed {
    const COLLECTION: Collection = Collection::Feeds;

    fn key(&self) -> String {
        self.id.clone()
    }
}

/// User edits to a feed. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<String>,
    /// Takes precedence over `category_id`.
    pub clear_category: bool,
    pub refresh_interval_minutes: Option<u32>,
    pub paused: Option<bool>,
}
