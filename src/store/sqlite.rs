use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use rusqlite_migration::{Migrations, M};
use tokio::sync::OnceCell;
use tokio_rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::app::{StoreError, StoreResult};
use crate::store::{BulkPutReport, Collection, IndexValue, Quota, Record, Store};

const MIGRATION_INITIAL: &str = include_str!("../../migrations/001-initial/up.sql");
const MIGRATION_STATE_INDEXES: &str = include_str!("../../migrations/002-state-indexes/up.sql");

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    File(PathBuf),
    InMemory,
}

/// SQLite-backed record store. Each collection is a table of JSON documents.
pub struct LocalStore {
    location: StoreLocation,
    quota_bytes: Option<u64>,
    conn: OnceCell<Connection>,
}

impl LocalStore {
    pub fn new(location: StoreLocation) -> Self {
        Self {
            location,
            quota_bytes: None,
            conn: OnceCell::new(),
        }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Self::new(StoreLocation::File(path.as_ref().to_path_buf()))
    }

    pub fn in_memory() -> Self {
        Self::new(StoreLocation::InMemory)
    }

    /// Storage budget that quota accounting is measured against.
    pub fn with_quota(mut self, quota_bytes: Option<u64>) -> Self {
        self.quota_bytes = quota_bytes;
        self
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    pub(crate) fn migrations() -> Migrations<'static> {
        Migrations::new(vec![M::up(MIGRATION_INITIAL), M::up(MIGRATION_STATE_INDEXES)])
    }

    fn conn(&self) -> StoreResult<&Connection> {
        self.conn.get().ok_or(StoreError::NotInitialized)
    }

    async fn connect(&self) -> StoreResult<Connection> {
        let conn = match &self.location {
            StoreLocation::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| StoreError::StorageUnavailable(e.to_string()))?;
                }
                Connection::open(path).await
            }
            StoreLocation::InMemory => Connection::open_in_memory().await,
        }
        .map_err(|e| StoreError::StorageUnavailable(e.to_string()))?;

        conn.call(|conn| {
            Self::migrations()
                .to_latest(conn)
                .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))
        })
        .await
        .map_err(|e| StoreError::StorageUnavailable(e.to_string()))?;

        info!(location = ?self.location, "Local store ready");
        Ok(conn)
    }

    /// Migration version currently applied to the database.
    pub async fn schema_version(&self) -> StoreResult<i64> {
        let version = self
            .conn()?
            .call(|conn| Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?))
            .await?;
        Ok(version)
    }

    async fn query_bodies(&self, sql: String, value: Option<IndexValue>) -> StoreResult<Vec<String>> {
        let bodies = self
            .conn()?
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let bodies = match value {
                    Some(value) => stmt
                        .query_map(params![value], |row| row.get(0))?
                        .collect::<rusqlite::Result<Vec<String>>>()?,
                    None => stmt
                        .query_map([], |row| row.get(0))?
                        .collect::<rusqlite::Result<Vec<String>>>()?,
                };
                Ok(bodies)
            })
            .await?;
        Ok(bodies)
    }
}

fn decode_all<R: Record>(bodies: Vec<String>) -> StoreResult<Vec<R>> {
    bodies
        .iter()
        .map(|body| serde_json::from_str(body).map_err(StoreError::from))
        .collect()
}

#[async_trait]
impl Store for LocalStore {
    async fn init(&self) -> StoreResult<()> {
        self.conn.get_or_try_init(|| self.connect()).await?;
        Ok(())
    }

    async fn put<R: Record>(&self, record: &R) -> StoreResult<String> {
        let conn = self.conn()?;
        let key = record.key();
        let body = serde_json::to_string(record)?;
        let sql = format!(
            "INSERT OR REPLACE INTO {} (id, body) VALUES (?1, ?2)",
            R::COLLECTION.table()
        );

        let id = key.clone();
        conn.call(move |conn| {
            conn.execute(&sql, params![id, body])?;
            Ok(())
        })
        .await?;

        Ok(key)
    }

    async fn get<R: Record>(&self, key: &str) -> StoreResult<Option<R>> {
        let conn = self.conn()?;
        let sql = format!("SELECT body FROM {} WHERE id = ?1", R::COLLECTION.table());
        let key = key.to_string();

        let body: Option<String> = conn
            .call(move |conn| Ok(conn.query_row(&sql, params![key], |row| row.get(0)).optional()?))
            .await?;

        Ok(body.map(|b| serde_json::from_str(&b)).transpose()?)
    }

    async fn get_all<R: Record>(&self) -> StoreResult<Vec<R>> {
        let sql = format!("SELECT body FROM {}", R::COLLECTION.table());
        decode_all(self.query_bodies(sql, None).await?)
    }

    async fn get_all_by_index<R: Record>(
        &self,
        index: &str,
        value: IndexValue,
    ) -> StoreResult<Vec<R>> {
        self.conn()?;
        if !R::COLLECTION.has_index(index) {
            return Err(StoreError::UnknownIndex {
                collection: R::COLLECTION,
                index: index.to_string(),
            });
        }

        // Must match the indexed expression exactly for SQLite to use the index.
        let sql = format!(
            "SELECT body FROM {} WHERE json_extract(body, '$.{}') IS ?1",
            R::COLLECTION.table(),
            index
        );
        decode_all(self.query_bodies(sql, Some(value)).await?)
    }

    async fn delete(&self, collection: Collection, key: &str) -> StoreResult<()> {
        let conn = self.conn()?;
        let sql = format!("DELETE FROM {} WHERE id = ?1", collection.table());
        let key = key.to_string();

        conn.call(move |conn| {
            conn.execute(&sql, params![key])?;
            Ok(())
        })
        .await?;
        Ok(())
    }

    async fn clear(&self, collection: Collection) -> StoreResult<()> {
        let conn = self.conn()?;
        let sql = format!("DELETE FROM {}", collection.table());

        let removed = conn.call(move |conn| Ok(conn.execute(&sql, [])?)).await?;
        debug!(%collection, removed, "Cleared collection");
        Ok(())
    }

    async fn bulk_put<R: Record>(&self, records: &[R]) -> StoreResult<BulkPutReport> {
        let conn = self.conn()?;
        if records.is_empty() {
            return Ok(BulkPutReport::default());
        }

        let mut report = BulkPutReport::default();
        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            match serde_json::to_string(record) {
                Ok(body) => rows.push((record.key(), body)),
                Err(e) => {
                    warn!(key = %record.key(), error = %e, "Skipping unserializable record");
                    report.failed += 1;
                }
            }
        }

        let sql = format!(
            "INSERT OR REPLACE INTO {} (id, body) VALUES (?1, ?2)",
            R::COLLECTION.table()
        );

        let (written, rejected) = conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let mut written = 0;
                let mut rejected = 0;
                {
                    let mut stmt = tx.prepare(&sql)?;
                    for (key, body) in &rows {
                        match stmt.execute(params![key, body]) {
                            Ok(_) => written += 1,
                            Err(e) => {
                                warn!(key = %key, error = %e, "Skipping record in bulk write");
                                rejected += 1;
                            }
                        }
                    }
                }
                tx.commit()?;
                Ok((written, rejected))
            })
            .await?;

        report.written += written;
        report.failed += rejected;
        Ok(report)
    }

    async fn get_quota(&self) -> StoreResult<Quota> {
        let conn = self.conn()?;
        let Some(quota_bytes) = self.quota_bytes else {
            return Ok(Quota::default());
        };

        let usage: i64 = conn
            .call(|conn| {
                let page_count: i64 = conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;
                let free_pages: i64 =
                    conn.query_row("PRAGMA freelist_count", [], |row| row.get(0))?;
                let page_size: i64 = conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;
                Ok((page_count - free_pages).max(0) * page_size)
            })
            .await?;

        Ok(Quota::from_usage(usage as u64, quota_bytes))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tokio_test::assert_ok;

    use super::*;
    use crate::domain::{Article, Feed, SyncState};
    use crate::parser::ParsedArticle;

    async fn store() -> LocalStore {
        let store = LocalStore::in_memory();
        store.init().await.unwrap();
        store
    }

    fn article(feed_id: &str, guid: &str) -> Article {
        Article::from_parsed(
            feed_id,
            &ParsedArticle {
                title: guid.to_string(),
                link: format!("https://example.com/{}", guid),
                summary: String::new(),
                content: None,
                author: None,
                image_url: None,
                guid: Some(guid.to_string()),
                published_at: Utc::now(),
            },
        )
    }

    #[tokio::test]
    async fn test_operations_before_init_fail() {
        let store = LocalStore::in_memory();
        let feed = Feed::new("https://example.com/feed.xml".into());

        assert!(matches!(store.put(&feed).await, Err(StoreError::NotInitialized)));
        assert!(matches!(
            store.get::<Feed>(&feed.id).await,
            Err(StoreError::NotInitialized)
        ));
        assert!(matches!(
            store.get_all::<Feed>().await,
            Err(StoreError::NotInitialized)
        ));
        assert!(matches!(
            store.clear(Collection::Feeds).await,
            Err(StoreError::NotInitialized)
        ));
        assert!(matches!(
            store.bulk_put::<Feed>(&[]).await,
            Err(StoreError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn test_init_is_idempotent_and_concurrent_safe() {
        let store = LocalStore::in_memory();
        let (a, b) = tokio::join!(store.init(), store.init());
        assert_ok!(a);
        assert_ok!(b);
        assert_ok!(store.init().await);
        assert_eq!(store.schema_version().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let store = store().await;
        let mut feed = Feed::new("https://example.com/feed.xml".into());
        feed.title = "Example".into();

        let key = store.put(&feed).await.unwrap();
        assert_eq!(key, feed.id);

        let retrieved: Feed = store.get(&key).await.unwrap().unwrap();
        assert_eq!(retrieved, feed);
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let store = store().await;
        assert!(store.get::<Feed>("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_replaces() {
        let store = store().await;
        let mut feed = Feed::new("https://example.com/feed.xml".into());
        store.put(&feed).await.unwrap();

        feed.title = "Renamed".into();
        store.put(&feed).await.unwrap();

        let all: Vec<Feed> = store.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "Renamed");
    }

    #[tokio::test]
    async fn test_get_all_by_index() {
        let store = store().await;
        let mut read = article("feed-a", "a1");
        read.read_at = Some(Utc::now());
        let mut favorite = article("feed-a", "a2");
        favorite.is_favorite = true;
        let other = article("feed-b", "b1");

        for a in [&read, &favorite, &other] {
            store.put(a).await.unwrap();
        }

        let by_feed: Vec<Article> = store
            .get_all_by_index("feed_id", "feed-a".into())
            .await
            .unwrap();
        assert_eq!(by_feed.len(), 2);

        let favorites: Vec<Article> = store
            .get_all_by_index("is_favorite", true.into())
            .await
            .unwrap();
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].id, favorite.id);

        let unread: Vec<Article> = store
            .get_all_by_index("read_at", IndexValue::Null)
            .await
            .unwrap();
        assert_eq!(unread.len(), 2);

        let none: Vec<Article> = store
            .get_all_by_index("feed_id", "feed-z".into())
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_index() {
        let store = store().await;
        let err = store
            .get_all_by_index::<Article>("title", "x".into())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownIndex { .. }));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = store().await;
        let feed = Feed::new("https://example.com/feed.xml".into());
        store.put(&feed).await.unwrap();

        store.delete(Collection::Feeds, &feed.id).await.unwrap();
        store.delete(Collection::Feeds, &feed.id).await.unwrap();
        assert!(store.get::<Feed>(&feed.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_only_touches_one_collection() {
        let store = store().await;
        store
            .put(&Feed::new("https://example.com/feed.xml".into()))
            .await
            .unwrap();
        store.put(&article("feed-a", "a1")).await.unwrap();

        store.clear(Collection::Articles).await.unwrap();
        assert!(store.get_all::<Article>().await.unwrap().is_empty());
        assert_eq!(store.get_all::<Feed>().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bulk_put() {
        let store = store().await;
        assert_eq!(
            store.bulk_put::<Article>(&[]).await.unwrap(),
            BulkPutReport::default()
        );

        let articles: Vec<Article> = (0..3).map(|i| article("feed-a", &format!("e{}", i))).collect();
        let report = store.bulk_put(&articles).await.unwrap();
        assert_eq!(report.written, 3);
        assert_eq!(report.failed, 0);
        assert_eq!(store.get_all::<Article>().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_singleton_record() {
        let store = store().await;
        let state = SyncState {
            is_syncing: true,
            ..Default::default()
        };
        store.put(&state).await.unwrap();

        let loaded: SyncState = store.get("default").await.unwrap().unwrap();
        assert!(loaded.is_syncing);
    }

    #[tokio::test]
    async fn test_quota_without_budget() {
        let store = store().await;
        assert_eq!(store.get_quota().await.unwrap(), Quota::default());
        assert!(!store.is_quota_exceeded().await.unwrap());
    }

    #[tokio::test]
    async fn test_quota_with_tiny_budget_is_exceeded() {
        let store = LocalStore::in_memory().with_quota(Some(1));
        store.init().await.unwrap();

        let quota = store.get_quota().await.unwrap();
        assert!(quota.usage > 0);
        assert_eq!(quota.available, 0);
        assert!(store.is_quota_exceeded().await.unwrap());
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("estuary.db");
        let feed = Feed::new("https://example.com/feed.xml".into());

        {
            let store = LocalStore::open(&path);
            store.init().await.unwrap();
            store.put(&feed).await.unwrap();
        }

        let store = LocalStore::open(&path);
        store.init().await.unwrap();
        let loaded: Option<Feed> = store.get(&feed.id).await.unwrap();
        assert_eq!(loaded, Some(feed));
    }

    #[tokio::test]
    async fn test_upgrade_from_first_version_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("estuary.db");
        let feed = Feed::new("https://example.com/feed.xml".into());

        {
            let mut conn = rusqlite::Connection::open(&path).unwrap();
            Migrations::new(vec![M::up(MIGRATION_INITIAL)])
                .to_latest(&mut conn)
                .unwrap();
            conn.execute(
                "INSERT INTO feeds (id, body) VALUES (?1, ?2)",
                params![feed.id, serde_json::to_string(&feed).unwrap()],
            )
            .unwrap();
        }

        let store = LocalStore::open(&path);
        store.init().await.unwrap();
        assert_eq!(store.schema_version().await.unwrap(), 2);

        let paused: Vec<Feed> = store
            .get_all_by_index("paused", false.into())
            .await
            .unwrap();
        assert_eq!(paused, vec![feed]);
    }

    #[tokio::test]
    async fn test_unwritable_location_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let store = LocalStore::open(blocker.join("estuary.db"));
        assert!(matches!(
            store.init().await,
            Err(StoreError::StorageUnavailable(_))
        ));
    }

    #[test]
    fn test_migrations_are_valid() {
        assert!(LocalStore::migrations().validate().is_ok());
    }
}
