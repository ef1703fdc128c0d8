use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::lifecycle::SoftDeletable;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl SoftDeletable for Category {
    fn entity_type() -> &'static str { "category" }
    fn id(&self) -> Uuid { self.id }
    fn deleted_at(&self) -> Option<DateTime<Utc>> { self.deleted_at }
    fn set_deleted_at(&mut self, at: Option<DateTime<Utc>>) { self.deleted_at = at; }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub title: String,
    pub description: Option<String>,
}

impl NewCategory {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), description: None }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.title.trim().is_empty() {
            return Err(AppError::validation("category title must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryChanges {
    pub title: Option<String>,
    pub description: Option<String>,
}
