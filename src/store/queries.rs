//! Read models and user actions layered over any [`Store`].

use std::cmp::Reverse;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use crate::app::{EstuaryError, Result, StoreResult};
use crate::domain::{Article, Category, Feed, SyncState, UserSettings};
use crate::store::{Collection, IndexValue, Store, SINGLETON_KEY};

#[async_trait]
pub trait StoreExt: Store + Sized {
    async fn feed(&self, feed_id: &str) -> StoreResult<Option<Feed>> {
        self.get::<Feed>(feed_id).await
    }

    /// Subscribed feeds (not soft-deleted), ordered by title.
    async fn active_feeds(&self) -> StoreResult<Vec<Feed>> {
        let mut feeds: Vec<Feed> = self
            .get_all_by_index("deleted_at", IndexValue::Null)
            .await?;
        feeds.sort_by_key(|f| f.display_title().to_lowercase());
        Ok(feeds)
    }

    /// Any feed record for `url`, soft-deleted ones included.
    async fn find_feed_by_url(&self, url: &str) -> StoreResult<Option<Feed>> {
        let feeds: Vec<Feed> = self.get_all_by_index("url", url.into()).await?;
        Ok(feeds
            .iter()
            .find(|f| !f.is_deleted())
            .or_else(|| feeds.first())
            .cloned())
    }

    async fn find_active_feed_by_url(&self, url: &str) -> StoreResult<Option<Feed>> {
        let feeds: Vec<Feed> = self.get_all_by_index("url", url.into()).await?;
        Ok(feeds.into_iter().find(|f| !f.is_deleted()))
    }

    async fn feeds_by_category(&self, category_id: &str) -> StoreResult<Vec<Feed>> {
        let feeds: Vec<Feed> = self
            .get_all_by_index("category_id", category_id.into())
            .await?;
        Ok(feeds.into_iter().filter(|f| !f.is_deleted()).collect())
    }

    async fn article(&self, article_id: &str) -> StoreResult<Option<Article>> {
        self.get::<Article>(article_id).await
    }

    /// Articles of one feed, newest first.
    async fn articles_for_feed(&self, feed_id: &str) -> StoreResult<Vec<Article>> {
        let articles = self.get_all_by_index("feed_id", feed_id.into()).await?;
        Ok(newest_first(articles))
    }

    async fn favorite_articles(&self) -> StoreResult<Vec<Article>> {
        let articles = self.get_all_by_index("is_favorite", true.into()).await?;
        Ok(newest_first(articles))
    }

    async fn unread_articles(&self) -> StoreResult<Vec<Article>> {
        let articles = self.get_all_by_index("read_at", IndexValue::Null).await?;
        Ok(newest_first(articles))
    }

    async fn unread_count(&self, feed_id: &str) -> StoreResult<usize> {
        let articles: Vec<Article> = self.get_all_by_index("feed_id", feed_id.into()).await?;
        Ok(articles
            .iter()
            .filter(|a| a.deleted_at.is_none() && !a.is_read())
            .count())
    }

    /// Stamp `read_at` the first time an article is read. Later calls keep
    /// the original timestamp.
    async fn mark_read(&self, article_id: &str) -> Result<Article> {
        let mut article = self
            .article(article_id)
            .await?
            .ok_or_else(|| EstuaryError::ArticleNotFound(article_id.to_string()))?;

        if article.read_at.is_none() {
            article.read_at = Some(Utc::now());
            self.put(&article).await?;
            debug!(article_id, "Marked article read");
        }
        Ok(article)
    }

    /// Flip the favorite flag and return the new value.
    async fn toggle_favorite(&self, article_id: &str) -> Result<bool> {
        let mut article = self
            .article(article_id)
            .await?
            .ok_or_else(|| EstuaryError::ArticleNotFound(article_id.to_string()))?;

        article.is_favorite = !article.is_favorite;
        self.put(&article).await?;
        Ok(article.is_favorite)
    }

    /// Categories ordered by `sort_order`, then name.
    async fn categories(&self) -> StoreResult<Vec<Category>> {
        let mut categories: Vec<Category> = self.get_all().await?;
        categories.sort_by(|a, b| {
            a.sort_order
                .cmp(&b.sort_order)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(categories)
    }

    /// Create a category placed after the existing ones.
    async fn create_category(&self, name: &str) -> Result<Category> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EstuaryError::Other("Category name cannot be empty".into()));
        }

        let next_order = self
            .categories()
            .await?
            .iter()
            .map(|c| c.sort_order + 1)
            .max()
            .unwrap_or(0);

        let category = Category::new(name.to_string(), next_order);
        self.put(&category).await?;
        Ok(category)
    }

    /// Delete a category and detach every feed that referenced it.
    async fn delete_category(&self, category_id: &str) -> Result<()> {
        if self.get::<Category>(category_id).await?.is_none() {
            return Err(EstuaryError::CategoryNotFound(category_id.to_string()));
        }

        let feeds: Vec<Feed> = self
            .get_all_by_index("category_id", category_id.into())
            .await?;
        for mut feed in feeds {
            feed.category_id = None;
            self.put(&feed).await?;
        }

        self.delete(Collection::Categories, category_id).await?;
        Ok(())
    }

    /// Stored settings, or defaults when none were saved yet.
    async fn settings(&self) -> StoreResult<UserSettings> {
        Ok(self
            .get::<UserSettings>(SINGLETON_KEY)
            .await?
            .unwrap_or_default())
    }

    async fn save_settings(&self, settings: &UserSettings) -> StoreResult<()> {
        self.put(settings).await?;
        Ok(())
    }

    async fn sync_state(&self) -> StoreResult<SyncState> {
        Ok(self
            .get::<SyncState>(SINGLETON_KEY)
            .await?
            .unwrap_or_default())
    }
}

impl<S: Store> StoreExt for S {}

fn newest_first(mut articles: Vec<Article>) -> Vec<Article> {
    articles.retain(|a| a.deleted_at.is_none());
    articles.sort_by_key(|a| Reverse(a.published_at));
    articles
}
