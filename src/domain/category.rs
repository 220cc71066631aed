use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::{Collection, Record};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
}

impl Category {
    pub fn new(name: String, sort_order: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            sort_order,
            created_at: Utc::now(),
        }
    }
}

impl Record for Category {
    const COLLECTION: Collection = Collection::Categories;

    fn key(&self) -> String {
        self.id.clone()
    }
}
