use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

/// A live rating. "No vote" is `Option::<Rating>::None`, never a zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Up,
    Down,
}

impl Rating {
    pub fn value(self) -> i64 {
        match self {
            Rating::Up => 1,
            Rating::Down => -1,
        }
    }

    pub fn from_value(value: i64) -> AppResult<Self> {
        match value {
            1 => Ok(Rating::Up),
            -1 => Ok(Rating::Down),
            other => Err(AppError::internal(format!("invalid stored rating: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub user_id: Uuid,
    pub joke_id: Uuid,
    pub rating: Rating,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What a like/dislike did to the (user, joke) row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteChange {
    Created(Rating),
    Flipped { from: Rating, to: Rating },
}

impl VoteChange {
    /// Decide the change for casting `wanted` over `existing`.
    /// Casting the same direction twice is a conflict.
    pub fn plan(existing: Option<Rating>, wanted: Rating) -> AppResult<Self> {
        match existing {
            None => Ok(VoteChange::Created(wanted)),
            Some(current) if current == wanted => Err(already_cast(wanted)),
            Some(current) => Ok(VoteChange::Flipped { from: current, to: wanted }),
        }
    }

    pub fn rating(&self) -> Rating {
        match self {
            VoteChange::Created(r) => *r,
            VoteChange::Flipped { to, .. } => *to,
        }
    }
}

/// Conflict for casting the direction a user already holds.
pub fn already_cast(rating: Rating) -> AppError {
    AppError::conflict(match rating {
        Rating::Up => "You have already liked this joke.",
        Rating::Down => "You have already disliked this joke.",
    })
}

/// Vote summary for one joke.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct JokeScore {
    pub likes: i64,
    pub dislikes: i64,
    /// Net rating as a percentage of votes cast, rounded to two decimals.
    /// Zero when the net rating is not positive.
    pub average_rating: f64,
}

impl JokeScore {
    pub fn new(likes: i64, dislikes: i64) -> Self {
        let total = likes + dislikes;
        let net = likes - dislikes;
        let average_rating = if net > 0 && total > 0 {
            ((net as f64 / total as f64) * 100.0 * 100.0).round() / 100.0
        } else {
            0.0
        };
        Self { likes, dislikes, average_rating }
    }

    pub fn total(&self) -> i64 {
        self.likes + self.dislikes
    }
}
