//! Refresh orchestration: fetch → parse → merge into the store.

mod queue;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::app::{EstuaryError, Result};
use crate::domain::{Article, Category, Feed, FeedUpdate};
use crate::fetcher::Fetcher;
use crate::parser::{FeedParser, ParsedArticle};
use crate::store::{IndexValue, LocalStore, Store, StoreExt};

pub use queue::QueueReport;

pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Canonical form of a subscription URL. Only http(s) is accepted.
pub fn normalize_feed_url(url: &str) -> Result<String> {
    let url = Url::parse(url.trim())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(EstuaryError::Other(format!(
            "Unsupported URL scheme: {}",
            url.scheme()
        )));
    }
    Ok(url.to_string())
}

/// Outcome of one `refresh_all_feeds` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshSummary {
    /// Another refresh held the lock; nothing was done.
    AlreadyRunning,
    Completed(RefreshReport),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub feeds: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub new_articles: usize,
}

/// Clears the refreshing flag when the refresh ends, however it ends.
struct RefreshGuard<'a>(&'a AtomicBool);

impl<'a> RefreshGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SyncScheduler<S: Store = LocalStore> {
    store: Arc<S>,
    fetcher: Arc<dyn Fetcher + Send + Sync>,
    parser: FeedParser,
    batch_size: usize,
    refreshing: AtomicBool,
    auto_refresh: Mutex<Option<oneshot::Sender<()>>>,
}

impl<S: Store> SyncScheduler<S> {
    pub fn new(store: Arc<S>, fetcher: Arc<dyn Fetcher + Send + Sync>) -> Self {
        Self {
            store,
            fetcher,
            parser: FeedParser::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            refreshing: AtomicBool::new(false),
            auto_refresh: Mutex::new(None),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    /// Refresh every subscribed, unpaused feed in batches. Per-feed failures
    /// are logged and counted, never returned.
    pub async fn refresh_all_feeds(&self) -> Result<RefreshSummary> {
        let Some(_guard) = RefreshGuard::acquire(&self.refreshing) else {
            debug!("Refresh already in progress, skipping");
            return Ok(RefreshSummary::AlreadyRunning);
        };

        self.write_sync_state(true, None).await?;
        let outcome = self.refresh_feeds().await;
        self.write_sync_state(false, Some(Utc::now())).await?;

        outcome.map(RefreshSummary::Completed)
    }

    async fn refresh_feeds(&self) -> Result<RefreshReport> {
        let feeds: Vec<Feed> = self
            .store
            .get_all::<Feed>()
            .await?
            .into_iter()
            .filter(|f| f.is_refreshable())
            .collect();

        let mut report = RefreshReport {
            feeds: feeds.len(),
            ..Default::default()
        };
        info!(feeds = feeds.len(), batch_size = self.batch_size, "Refreshing feeds");

        for batch in feeds.chunks(self.batch_size) {
            let mut pending = Vec::with_capacity(batch.len());
            for feed in batch {
                pending.push(self.refresh_feed(feed));
            }

            for result in join_all(pending).await {
                match result {
                    Ok(inserted) => {
                        report.succeeded += 1;
                        report.new_articles += inserted;
                    }
                    Err(_) => report.failed += 1,
                }
            }
        }

        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            new_articles = report.new_articles,
            "Refresh complete"
        );
        Ok(report)
    }

    /// Fetch and merge one feed. On failure the feed's `error_count` is
    /// bumped and `last_fetched_at` stays as it was.
    pub async fn refresh_feed(&self, feed: &Feed) -> Result<usize> {
        match self.fetch_and_merge(feed).await {
            Ok(inserted) => {
                debug!(feed_id = %feed.id, url = %feed.url, inserted, "Feed refreshed");
                Ok(inserted)
            }
            Err(e) => {
                warn!(feed_id = %feed.id, url = %feed.url, error = %e, "Feed refresh failed");
                self.record_failure(feed).await;
                Err(e)
            }
        }
    }

    pub async fn refresh_feed_by_id(&self, feed_id: &str) -> Result<usize> {
        let feed = self
            .store
            .feed(feed_id)
            .await?
            .filter(|f| !f.is_deleted())
            .ok_or_else(|| EstuaryError::FeedNotFound(feed_id.to_string()))?;
        self.refresh_feed(&feed).await
    }

    async fn fetch_and_merge(&self, feed: &Feed) -> Result<usize> {
        let body = self.fetcher.fetch(&feed.url).await?;
        let parsed = self.parser.parse(&body, &feed.url)?;

        // Reload so edits made while the fetch was in flight survive.
        let mut current = self.store.feed(&feed.id).await?.unwrap_or_else(|| feed.clone());
        current.apply_meta(&parsed.feed);
        current.last_fetched_at = Some(Utc::now());
        current.error_count = 0;

        let inserted = self.merge_articles(&current.id, &parsed.articles).await?;
        self.store.put(&current).await?;
        Ok(inserted)
    }

    async fn record_failure(&self, feed: &Feed) {
        let mut current = match self.store.feed(&feed.id).await {
            Ok(Some(current)) => current,
            _ => feed.clone(),
        };
        current.error_count = current.error_count.saturating_add(1);

        if let Err(e) = self.store.put(&current).await {
            error!(feed_id = %feed.id, error = %e, "Failed to record refresh failure");
        }
    }

    /// Insert entries the feed has not seen before. Stored articles are left
    /// untouched so read and favorite state survive.
    async fn merge_articles(&self, feed_id: &str, entries: &[ParsedArticle]) -> Result<usize> {
        let stored: Vec<Article> = self
            .store
            .get_all_by_index("feed_id", IndexValue::from(feed_id))
            .await?;
        let mut known: HashSet<String> = stored.into_iter().map(|a| a.id).collect();

        let fresh: Vec<Article> = entries
            .iter()
            .map(|entry| Article::from_parsed(feed_id, entry))
            .filter(|article| known.insert(article.id.clone()))
            .collect();

        let report = self.store.bulk_put(&fresh).await?;
        if report.failed > 0 {
            warn!(feed_id, failed = report.failed, "Some articles could not be stored");
        }
        Ok(report.written)
    }

    /// Preserves the pending operation queue.
    async fn write_sync_state(
        &self,
        is_syncing: bool,
        last_sync_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut state = self.store.sync_state().await?;
        state.is_syncing = is_syncing;
        state.last_sync_at = last_sync_at;
        self.store.put(&state).await?;
        Ok(())
    }

    /// Subscribe to a feed: validate, fetch, parse, then store the feed and
    /// its articles. A soft-deleted subscription to the same URL is revived.
    pub async fn subscribe(&self, url: &str, category_id: Option<&str>) -> Result<Feed> {
        let url = normalize_feed_url(url)?;

        if self.store.find_active_feed_by_url(&url).await?.is_some() {
            return Err(EstuaryError::FeedAlreadyExists(url));
        }
        if let Some(category_id) = category_id {
            if self.store.get::<Category>(category_id).await?.is_none() {
                return Err(EstuaryError::CategoryNotFound(category_id.to_string()));
            }
        }

        let body = self.fetcher.fetch(&url).await?;
        let parsed = self.parser.parse(&body, &url)?;

        let mut feed = match self.store.find_feed_by_url(&url).await? {
            Some(mut revived) => {
                info!(feed_id = %revived.id, url = %url, "Reviving unsubscribed feed");
                revived.deleted_at = None;
                revived
            }
            None => {
                let mut feed = Feed::new(url.clone());
                feed.refresh_interval_minutes =
                    self.store.settings().await?.default_refresh_interval_minutes;
                feed
            }
        };
        feed.category_id = category_id.map(str::to_string);
        feed.apply_meta(&parsed.feed);
        feed.last_fetched_at = Some(Utc::now());
        feed.error_count = 0;

        let inserted = self.merge_articles(&feed.id, &parsed.articles).await?;
        self.store.put(&feed).await?;

        info!(
            feed_id = %feed.id,
            title = %feed.title,
            format = %parsed.format,
            articles = inserted,
            "Subscribed"
        );
        Ok(feed)
    }

    /// Soft-delete a feed. Its articles stay until the retention window
    /// passes and maintenance purges them.
    pub async fn unsubscribe(&self, feed_id: &str) -> Result<()> {
        let mut feed = self
            .store
            .feed(feed_id)
            .await?
            .ok_or_else(|| EstuaryError::FeedNotFound(feed_id.to_string()))?;

        if feed.deleted_at.is_none() {
            feed.deleted_at = Some(Utc::now());
            self.store.put(&feed).await?;
            info!(feed_id, url = %feed.url, "Unsubscribed");
        }
        Ok(())
    }

    pub async fn update_feed(&self, feed_id: &str, update: &FeedUpdate) -> Result<Feed> {
        let mut feed = self
            .store
            .feed(feed_id)
            .await?
            .filter(|f| !f.is_deleted())
            .ok_or_else(|| EstuaryError::FeedNotFound(feed_id.to_string()))?;

        if let Some(category_id) = update.category_id.as_deref().filter(|_| !update.clear_category) {
            if self.store.get::<Category>(category_id).await?.is_none() {
                return Err(EstuaryError::CategoryNotFound(category_id.to_string()));
            }
        }

        feed.apply_update(update);
        self.store.put(&feed).await?;
        Ok(feed)
    }

    fn auto_refresh_slot(&self) -> MutexGuard<'_, Option<oneshot::Sender<()>>> {
        self.auto_refresh
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_auto_refresh_running(&self) -> bool {
        self.auto_refresh_slot()
            .as_ref()
            .is_some_and(|cancel| !cancel.is_closed())
    }

    /// Stop scheduling refreshes. A refresh already running is allowed to
    /// finish.
    pub fn stop_auto_refresh(&self) {
        if let Some(cancel) = self.auto_refresh_slot().take() {
            let _ = cancel.send(());
            info!("Auto refresh stopped");
        }
    }
}

impl<S: Store + 'static> SyncScheduler<S> {
    /// Refresh now and then every `minutes`. Any earlier schedule is
    /// cancelled first. Returns `false` when nothing was scheduled because
    /// `minutes` is zero or background sync is disabled in settings.
    pub async fn start_auto_refresh(self: &Arc<Self>, minutes: u64) -> Result<bool> {
        self.stop_auto_refresh();

        if minutes == 0 {
            debug!("Auto refresh interval is zero, not scheduling");
            return Ok(false);
        }
        if !self.store.settings().await?.background_sync_enabled {
            info!("Background sync disabled in settings, not scheduling");
            return Ok(false);
        }

        self.start_auto_refresh_with_period(Duration::from_secs(minutes * 60));
        Ok(true)
    }

    pub fn start_auto_refresh_with_period(self: &Arc<Self>, period: Duration) {
        self.stop_auto_refresh();

        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();
        let scheduler: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            loop {
                let Some(this) = scheduler.upgrade() else {
                    break;
                };
                match this.refresh_all_feeds().await {
                    Ok(RefreshSummary::AlreadyRunning) => {
                        debug!("Scheduled refresh skipped, one is already running")
                    }
                    Ok(RefreshSummary::Completed(_)) => {}
                    Err(e) => error!(error = %e, "Scheduled refresh failed"),
                }
                drop(this);

                tokio::select! {
                    _ = tokio::time::sleep(period) => {}
                    _ = &mut cancel_rx => break,
                }
            }
            debug!("Auto refresh task exited");
        });

        *self.auto_refresh_slot() = Some(cancel_tx);
        info!(period_secs = period.as_secs(), "Auto refresh started");
    }
}
