use std::path::PathBuf;
use std::sync::Arc;

use crate::app::error::{EstuaryError, Result};
use crate::cache::{CacheManager, CachePolicy};
use crate::config::Config;
use crate::fetcher::{Fetcher, HttpFetcher};
use crate::store::{LocalStore, Store};
use crate::sync::SyncScheduler;

/// Wires the store, fetcher, scheduler and cache manager together.
pub struct AppContext {
    pub config: Config,
    pub store: Arc<LocalStore>,
    pub fetcher: Arc<dyn Fetcher + Send + Sync>,
    pub scheduler: Arc<SyncScheduler>,
    pub cache: CacheManager,
}

impl AppContext {
    pub async fn new(config: Config) -> Result<Self> {
        let db_path = match config.storage.db_path.clone() {
            Some(p) => p,
            None => Self::default_db_path()?,
        };
        let store = LocalStore::open(db_path).with_quota(config.storage.quota_bytes);
        let fetcher: Arc<dyn Fetcher + Send + Sync> = Arc::new(HttpFetcher::new(&config.sync)?);

        Self::assemble(config, store, fetcher).await
    }

    pub async fn in_memory() -> Result<Self> {
        let config = Config::default();
        let fetcher: Arc<dyn Fetcher + Send + Sync> = Arc::new(HttpFetcher::new(&config.sync)?);
        Self::assemble(config, LocalStore::in_memory(), fetcher).await
    }

    /// Build a context around an already chosen store and fetcher. The store
    /// is initialized here.
    pub async fn assemble(
        config: Config,
        store: LocalStore,
        fetcher: Arc<dyn Fetcher + Send + Sync>,
    ) -> Result<Self> {
        store.init().await?;
        let store = Arc::new(store);

        let scheduler = Arc::new(
            SyncScheduler::new(store.clone(), fetcher.clone())
                .with_batch_size(config.sync.batch_size),
        );
        let cache = CacheManager::new(store.clone(), CachePolicy::from(&config.cache));

        Ok(Self {
            config,
            store,
            fetcher,
            scheduler,
            cache,
        })
    }

    fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| EstuaryError::Config("Could not find data directory".into()))?;
        Ok(data_dir.join("estuary").join("estuary.db"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreExt;

    #[tokio::test]
    async fn test_in_memory_context_is_ready() {
        let ctx = AppContext::in_memory().await.unwrap();
        assert!(ctx.store.active_feeds().await.unwrap().is_empty());
        assert_eq!(ctx.cache.policy().max_total_articles, 1000);
    }

    #[tokio::test]
    async fn test_context_uses_configured_db_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.db_path = Some(dir.path().join("data").join("estuary.db"));

        let ctx = AppContext::new(config).await.unwrap();
        ctx.store.create_category("News").await.unwrap();
        assert!(dir.path().join("data").join("estuary.db").exists());
    }
}
