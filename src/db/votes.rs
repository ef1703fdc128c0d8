use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::row_parsers::vote_from_row;
use super::timestamp;
use crate::errors::{AppError, AppResult};
use crate::models::vote::{already_cast, JokeScore, Rating, Vote, VoteChange};

pub async fn find(pool: &SqlitePool, user_id: Uuid, joke_id: Uuid) -> AppResult<Option<Vote>> {
    let row = sqlx::query("SELECT * FROM votes WHERE user_id = ? AND joke_id = ?")
        .bind(user_id.to_string())
        .bind(joke_id.to_string())
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(vote_from_row).transpose()
}

pub async fn rating(pool: &SqlitePool, user_id: Uuid, joke_id: Uuid) -> AppResult<Option<Rating>> {
    Ok(find(pool, user_id, joke_id).await?.map(|vote| vote.rating))
}

/// Cast `wanted` for (user, joke). The upsert only touches the row when the
/// direction differs, so a repeat cast affects nothing and is a conflict
/// even when two requests race.
pub async fn cast(pool: &SqlitePool, user_id: Uuid, joke_id: Uuid, wanted: Rating) -> AppResult<VoteChange> {
    let mut tx = pool.begin().await?;

    let existing: Option<i64> = sqlx::query("SELECT rating FROM votes WHERE user_id = ? AND joke_id = ?")
        .bind(user_id.to_string())
        .bind(joke_id.to_string())
        .fetch_optional(&mut *tx)
        .await?
        .map(|row| row.try_get::<i64, _>("rating"))
        .transpose()?;
    let existing = existing.map(Rating::from_value).transpose()?;
    let change = VoteChange::plan(existing, wanted)?;

    let now = timestamp(Utc::now());
    let result = sqlx::query(
        "INSERT INTO votes (user_id, joke_id, rating, created_at, updated_at) VALUES (?, ?, ?, ?, ?) \
         ON CONFLICT(user_id, joke_id) DO UPDATE SET rating = excluded.rating, updated_at = excluded.updated_at \
         WHERE votes.rating <> excluded.rating",
    )
    .bind(user_id.to_string())
    .bind(joke_id.to_string())
    .bind(wanted.value())
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        // Same direction landed between our read and write.
        return Err(already_cast(wanted));
    }

    tx.commit().await?;
    Ok(change)
}

/// Delete the (user, joke) vote. Conflict when there is none.
pub async fn remove(pool: &SqlitePool, user_id: Uuid, joke_id: Uuid) -> AppResult<Rating> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query("SELECT rating FROM votes WHERE user_id = ? AND joke_id = ?")
        .bind(user_id.to_string())
        .bind(joke_id.to_string())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::conflict("Unable to remove non-existent vote. You have not voted on this joke."))?;
    let rating = Rating::from_value(row.try_get("rating")?)?;

    sqlx::query("DELETE FROM votes WHERE user_id = ? AND joke_id = ?")
        .bind(user_id.to_string())
        .bind(joke_id.to_string())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(rating)
}

pub async fn score(pool: &SqlitePool, joke_id: Uuid) -> AppResult<JokeScore> {
    let row = sqlx::query(
        "SELECT COALESCE(SUM(CASE WHEN rating = 1 THEN 1 ELSE 0 END), 0) AS likes, \
                COALESCE(SUM(CASE WHEN rating = -1 THEN 1 ELSE 0 END), 0) AS dislikes \
         FROM votes WHERE joke_id = ?",
    )
    .bind(joke_id.to_string())
    .fetch_one(pool)
    .await?;

    Ok(JokeScore::new(row.try_get("likes")?, row.try_get("dislikes")?))
}

pub async fn count_for(pool: &SqlitePool, user_id: Uuid, joke_id: Uuid) -> AppResult<i64> {
    let row = sqlx::query("SELECT COUNT(*) AS n FROM votes WHERE user_id = ? AND joke_id = ?")
        .bind(user_id.to_string())
        .bind(joke_id.to_string())
        .fetch_one(pool)
        .await?;
    Ok(row.try_get("n")?)
}
