use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::FeedUpdate;
use crate::store::{Collection, Record, SINGLETON_KEY};

/// A user action deferred until the network is reachable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncOperation {
    AddFeed {
        url: String,
        category_id: Option<String>,
    },
    DeleteFeed {
        feed_id: String,
    },
    UpdateFeed {
        feed_id: String,
        update: FeedUpdate,
    },
    RefreshFeed {
        feed_id: String,
    },
}

impl SyncOperation {
    pub fn kind(&self) -> &'static str {
        match self {
            SyncOperation::AddFeed { .. } => "ADD_FEED",
            SyncOperation::DeleteFeed { .. } => "DELETE_FEED",
            SyncOperation::UpdateFeed { .. } => "UPDATE_FEED",
            SyncOperation::RefreshFeed { .. } => "REFRESH_FEED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedOperation {
    pub operation: SyncOperation,
    pub queued_at: DateTime<Utc>,
}

impl QueuedOperation {
    pub fn new(operation: SyncOperation) -> Self {
        Self {
            operation,
            queued_at: Utc::now(),
        }
    }
}

/// Singleton record written only by the sync scheduler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncState {
    pub is_syncing: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub pending_operations: Vec<QueuedOperation>,
}

impl Record for SyncState {
    const COLLECTION: Collection = Collection::SyncState;

    fn key(&self) -> String {
        SINGLETON_KEY.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_serializes_with_kind_tag() {
        let op = SyncOperation::AddFeed {
            url: "https://example.com/feed.xml".into(),
            category_id: None,
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["kind"], "ADD_FEED");
        assert_eq!(json["payload"]["url"], "https://example.com/feed.xml");

        let back: SyncOperation = serde_json::from_value(json).unwrap();
        assert_eq!(back, op);
    }

    #[test]
    fn test_kind_matches_serialized_tag() {
        let op = SyncOperation::RefreshFeed {
            feed_id: "f1".into(),
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["kind"], op.kind());
    }
}
