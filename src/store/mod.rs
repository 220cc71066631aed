pub mod queries;
pub mod sqlite;

use std::fmt;

use async_trait::async_trait;
use rusqlite::types::{ToSql, ToSqlOutput, Value};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::app::StoreResult;

pub use queries::StoreExt;
pub use sqlite::{LocalStore, StoreLocation};

/// Key of the settings and sync-state singleton records.
pub const SINGLETON_KEY: &str = "default";

/// Quota percentage above which the store reports itself as exceeded.
pub const QUOTA_EXCEEDED_PERCENT: f64 = 90.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Feeds,
    Articles,
    Categories,
    Settings,
    SyncState,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Feeds,
        Collection::Articles,
        Collection::Categories,
        Collection::Settings,
        Collection::SyncState,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            Collection::Feeds => "feeds",
            Collection::Articles => "articles",
            Collection::Categories => "categories",
            Collection::Settings => "settings",
            Collection::SyncState => "sync_state",
        }
    }

    /// Secondary indexes, named after the record field they cover.
    pub fn indexes(&self) -> &'static [&'static str] {
        match self {
            Collection::Feeds => &["url", "category_id", "deleted_at", "paused"],
            Collection::Articles => &["feed_id", "published_at", "read_at", "is_favorite"],
            Collection::Categories => &["name"],
            Collection::Settings | Collection::SyncState => &[],
        }
    }

    pub fn has_index(&self, index: &str) -> bool {
        self.indexes().contains(&index)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// A typed document living in one collection.
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: Collection;

    fn key(&self) -> String;
}

/// Value compared against an indexed field. `Null` matches absent/null fields.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexValue {
    Text(String),
    Integer(i64),
    Bool(bool),
    Null,
}

impl From<&str> for IndexValue {
    fn from(s: &str) -> Self {
        IndexValue::Text(s.to_string())
    }
}

impl From<String> for IndexValue {
    fn from(s: String) -> Self {
        IndexValue::Text(s)
    }
}

impl From<i64> for IndexValue {
    fn from(i: i64) -> Self {
        IndexValue::Integer(i)
    }
}

impl From<bool> for IndexValue {
    fn from(b: bool) -> Self {
        IndexValue::Bool(b)
    }
}

impl<T: Into<IndexValue>> From<Option<T>> for IndexValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(IndexValue::Null)
    }
}

impl ToSql for IndexValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            IndexValue::Text(s) => ToSqlOutput::from(s.as_str()),
            IndexValue::Integer(i) => ToSqlOutput::from(*i),
            // json_extract yields 0/1 for JSON booleans
            IndexValue::Bool(b) => ToSqlOutput::from(i64::from(*b)),
            IndexValue::Null => ToSqlOutput::Owned(Value::Null),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Quota {
    pub usage: u64,
    pub quota: u64,
    pub percent_used: f64,
    pub available: u64,
}

impl Quota {
    pub fn from_usage(usage: u64, quota: u64) -> Self {
        if quota == 0 {
            return Self::default();
        }
        Self {
            usage,
            quota,
            percent_used: usage as f64 * 100.0 / quota as f64,
            available: quota.saturating_sub(usage),
        }
    }

    pub fn is_exceeded(&self) -> bool {
        self.percent_used > QUOTA_EXCEEDED_PERCENT
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkPutReport {
    pub written: usize,
    pub failed: usize,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Open and migrate the backing database. Safe to call repeatedly and
    /// concurrently; every other operation fails with `NotInitialized`
    /// until it has succeeded once.
    async fn init(&self) -> StoreResult<()>;

    /// Insert or replace by primary key.
    async fn put<R: Record>(&self, record: &R) -> StoreResult<String>;
    async fn get<R: Record>(&self, key: &str) -> StoreResult<Option<R>>;
    async fn get_all<R: Record>(&self) -> StoreResult<Vec<R>>;
    async fn get_all_by_index<R: Record>(
        &self,
        index: &str,
        value: IndexValue,
    ) -> StoreResult<Vec<R>>;
    async fn delete(&self, collection: Collection, key: &str) -> StoreResult<()>;
    async fn clear(&self, collection: Collection) -> StoreResult<()>;

    /// Write many records, skipping (and logging) the ones that fail.
    async fn bulk_put<R: Record>(&self, records: &[R]) -> StoreResult<BulkPutReport>;

    async fn get_quota(&self) -> StoreResult<Quota>;

    async fn is_quota_exceeded(&self) -> StoreResult<bool> {
        Ok(self.get_quota().await?.is_exceeded())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_without_budget_is_zero() {
        let quota = Quota::from_usage(4096, 0);
        assert_eq!(quota, Quota::default());
        assert!(!quota.is_exceeded());
    }

    #[test]
    fn test_quota_percentages() {
        let quota = Quota::from_usage(450, 500);
        assert_eq!(quota.available, 50);
        assert!((quota.percent_used - 90.0).abs() < 1e-9);
        // exactly 90% is not over the threshold
        assert!(!quota.is_exceeded());

        assert!(Quota::from_usage(460, 500).is_exceeded());
    }

    #[test]
    fn test_quota_usage_over_budget() {
        let quota = Quota::from_usage(800, 500);
        assert_eq!(quota.available, 0);
        assert!(quota.is_exceeded());
    }

    #[test]
    fn test_index_value_from_option() {
        assert_eq!(IndexValue::from(None::<&str>), IndexValue::Null);
        assert_eq!(IndexValue::from(Some("x")), IndexValue::Text("x".into()));
    }

    #[test]
    fn test_collection_indexes() {
        assert!(Collection::Articles.has_index("feed_id"));
        assert!(Collection::Feeds.has_index("deleted_at"));
        assert!(!Collection::Settings.has_index("id"));
    }
}
