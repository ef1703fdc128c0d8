use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::lifecycle::SoftDeletable;
use crate::models::category::Category;
use crate::models::vote::JokeScore;

pub const MAX_TITLE_LENGTH: usize = 96;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Joke {
    pub id: Uuid,
    /// Owner. Never changes after creation.
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl SoftDeletable for Joke {
    fn entity_type() -> &'static str { "joke" }
    fn id(&self) -> Uuid { self.id }
    fn deleted_at(&self) -> Option<DateTime<Utc>> { self.deleted_at }
    fn set_deleted_at(&mut self, at: Option<DateTime<Utc>>) { self.deleted_at = at; }
}

/// A joke with its live categories and vote summary.
#[derive(Debug, Clone, Serialize)]
pub struct JokeDetails {
    #[serde(flatten)]
    pub joke: Joke,
    pub categories: Vec<Category>,
    pub score: JokeScore,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewJoke {
    pub title: String,
    pub content: String,
    /// Category titles. Unknown titles are ignored; when none match, the
    /// placeholder category is attached instead.
    #[serde(default)]
    pub categories: Vec<String>,
}

impl NewJoke {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            categories: Vec::new(),
        }
    }

    pub fn in_categories<I, S>(mut self, titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = titles.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> AppResult<()> {
        validate_title(&self.title)?;
        if self.content.trim().is_empty() {
            return Err(AppError::validation("joke content must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JokeChanges {
    pub title: Option<String>,
    pub content: Option<String>,
}

impl JokeChanges {
    pub fn validate(&self) -> AppResult<()> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if matches!(&self.content, Some(content) if content.trim().is_empty()) {
            return Err(AppError::validation("joke content must not be empty"));
        }
        Ok(())
    }
}

fn validate_title(title: &str) -> AppResult<()> {
    let length = title.trim().chars().count();
    if length == 0 {
        return Err(AppError::validation("joke title must not be empty"));
    }
    if length > MAX_TITLE_LENGTH {
        return Err(AppError::validation(format!(
            "joke title must be less than {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(())
}
