//! Quota monitoring and retention-policy pruning.
//!
//! Only articles that are read and not favorited are ever evicted by count
//! limits. Emergency cleanup under quota pressure follows the same rule and
//! reports when it could not bring usage back under the critical threshold.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use crate::app::Result;
use crate::config::CacheConfig;
use crate::domain::{Article, Feed};
use crate::store::{Collection, IndexValue, LocalStore, Quota, Store, StoreExt};

#[derive(Debug, Clone, PartialEq)]
pub struct CachePolicy {
    pub max_total_articles: usize,
    pub deleted_feed_retention: Duration,
    pub warning_percent: f64,
    pub critical_percent: f64,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::from(&CacheConfig::default())
    }
}

impl From<&CacheConfig> for CachePolicy {
    fn from(config: &CacheConfig) -> Self {
        Self {
            max_total_articles: config.max_total_articles,
            deleted_feed_retention: Duration::days(config.deleted_feed_retention_days),
            warning_percent: config.warning_percent,
            critical_percent: config.critical_percent,
        }
    }
}

impl CachePolicy {
    pub fn pressure(&self, quota: &Quota) -> QuotaPressure {
        if quota.percent_used > self.critical_percent {
            QuotaPressure::Critical
        } else if quota.percent_used > self.warning_percent {
            QuotaPressure::Warning
        } else {
            QuotaPressure::Normal
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QuotaPressure {
    #[default]
    Normal,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaintenanceReport {
    pub quota: Quota,
    pub pressure: QuotaPressure,
    pub emergency: bool,
    pub pruned_per_feed: usize,
    pub pruned_global: usize,
    pub purged_feeds: usize,
    pub purged_articles: usize,
    /// Quota after emergency cleanup, when one ran.
    pub quota_after: Option<Quota>,
    /// Emergency cleanup ran and usage is still above the critical threshold.
    pub still_critical: bool,
}

impl MaintenanceReport {
    pub fn articles_deleted(&self) -> usize {
        self.pruned_per_feed + self.pruned_global + self.purged_articles
    }
}

pub struct CacheManager<S: Store = LocalStore> {
    store: Arc<S>,
    policy: CachePolicy,
}

impl<S: Store> CacheManager<S> {
    pub fn new(store: Arc<S>, policy: CachePolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub async fn run_maintenance(&self) -> Result<MaintenanceReport> {
        let quota = self.store.get_quota().await?;
        let pressure = self.policy.pressure(&quota);
        let max_per_feed = self.store.settings().await?.max_articles_per_feed;

        let mut report = MaintenanceReport {
            quota,
            pressure,
            ..Default::default()
        };

        match pressure {
            QuotaPressure::Critical => {
                warn!(
                    percent_used = quota.percent_used,
                    "Storage quota critical, running emergency cleanup"
                );
                report.emergency = true;
                report.pruned_global = self.enforce_global_cap().await?;
                report.pruned_per_feed = self.prune_feeds(max_per_feed).await?;

                let after = self.store.get_quota().await?;
                report.still_critical = self.policy.pressure(&after) == QuotaPressure::Critical;
                report.quota_after = Some(after);
                if report.still_critical {
                    warn!(
                        percent_used = after.percent_used,
                        "Storage still critical after emergency cleanup"
                    );
                }
                return Ok(report);
            }
            QuotaPressure::Warning => {
                warn!(percent_used = quota.percent_used, "Storage quota above warning threshold");
            }
            QuotaPressure::Normal => {}
        }

        report.pruned_per_feed = self.prune_feeds(max_per_feed).await?;
        report.pruned_global = self.enforce_global_cap().await?;
        let (feeds, articles) = self.purge_deleted_feeds().await?;
        report.purged_feeds = feeds;
        report.purged_articles = articles;

        info!(
            pruned_per_feed = report.pruned_per_feed,
            pruned_global = report.pruned_global,
            purged_feeds = report.purged_feeds,
            "Maintenance complete"
        );
        Ok(report)
    }

    /// Delete read, unfavorited articles past each feed's newest `max_per_feed`.
    async fn prune_feeds(&self, max_per_feed: usize) -> Result<usize> {
        let mut deleted = 0;
        for feed in self.store.active_feeds().await? {
            let articles = self.store.articles_for_feed(&feed.id).await?;
            if articles.len() <= max_per_feed {
                continue;
            }

            let overflow: Vec<&Article> = articles
                .iter()
                .skip(max_per_feed)
                .filter(|a| a.is_evictable())
                .collect();
            for article in &overflow {
                self.store.delete(Collection::Articles, &article.id).await?;
            }

            if !overflow.is_empty() {
                debug!(feed_id = %feed.id, deleted = overflow.len(), "Pruned feed overflow");
            }
            deleted += overflow.len();
        }
        Ok(deleted)
    }

    /// Delete the oldest evictable articles until the store is at the cap or
    /// nothing evictable is left.
    async fn enforce_global_cap(&self) -> Result<usize> {
        let articles: Vec<Article> = self.store.get_all().await?;
        let excess = articles
            .len()
            .saturating_sub(self.policy.max_total_articles);
        if excess == 0 {
            return Ok(0);
        }

        let mut candidates: Vec<&Article> = articles.iter().filter(|a| a.is_evictable()).collect();
        candidates.sort_by_key(|a| a.published_at);

        let doomed = &candidates[..excess.min(candidates.len())];
        for article in doomed {
            self.store.delete(Collection::Articles, &article.id).await?;
        }

        if doomed.len() < excess {
            warn!(
                remaining_over_cap = excess - doomed.len(),
                "Global article cap exceeded by unread or favorited articles"
            );
        }
        Ok(doomed.len())
    }

    /// Hard-delete feeds unsubscribed longer than the retention window, with
    /// their read articles. Favorited or unread articles are kept, and so is
    /// the feed record they belong to.
    async fn purge_deleted_feeds(&self) -> Result<(usize, usize)> {
        let cutoff = Utc::now() - self.policy.deleted_feed_retention;
        let feeds: Vec<Feed> = self.store.get_all().await?;

        let mut purged_feeds = 0;
        let mut purged_articles = 0;
        for feed in feeds {
            let Some(deleted_at) = feed.deleted_at else {
                continue;
            };
            if deleted_at >= cutoff {
                continue;
            }

            let articles: Vec<Article> = self
                .store
                .get_all_by_index("feed_id", IndexValue::from(feed.id.as_str()))
                .await?;

            let mut kept = 0;
            for article in &articles {
                if !article.is_evictable() {
                    kept += 1;
                    continue;
                }
                self.store.delete(Collection::Articles, &article.id).await?;
                purged_articles += 1;
            }

            if kept == 0 {
                self.store.delete(Collection::Feeds, &feed.id).await?;
                purged_feeds += 1;
                info!(feed_id = %feed.id, url = %feed.url, "Purged unsubscribed feed");
            } else {
                debug!(feed_id = %feed.id, kept, "Keeping unsubscribed feed for its unread or favorited articles");
            }
        }
        Ok((purged_feeds, purged_articles))
    }
}
