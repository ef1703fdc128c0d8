use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::row_parsers::joke_from_row;
use super::timestamp;
use crate::errors::{AppError, AppResult};
use crate::models::category::Category;
use crate::models::joke::{Joke, JokeChanges, NewJoke};

pub async fn insert(conn: &mut SqliteConnection, owner: Uuid, new: &NewJoke) -> AppResult<Joke> {
    new.validate()?;
    let now = Utc::now();
    let joke = Joke {
        id: Uuid::new_v4(),
        user_id: owner,
        title: new.title.trim().to_string(),
        content: new.content.clone(),
        created_at: now,
        updated_at: now,
        deleted_at: None,
    };

    sqlx::query("INSERT INTO jokes (id, user_id, title, content, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)")
        .bind(joke.id.to_string())
        .bind(owner.to_string())
        .bind(&joke.title)
        .bind(&joke.content)
        .bind(timestamp(now))
        .bind(timestamp(now))
        .execute(&mut *conn)
        .await?;

    Ok(joke)
}

pub async fn attach(conn: &mut SqliteConnection, joke_id: Uuid, categories: &[Category]) -> AppResult<()> {
    for category in categories {
        sqlx::query("INSERT OR IGNORE INTO category_joke (category_id, joke_id) VALUES (?, ?)")
            .bind(category.id.to_string())
            .bind(joke_id.to_string())
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub async fn list_live(pool: &SqlitePool) -> AppResult<Vec<Joke>> {
    let rows = sqlx::query("SELECT * FROM jokes WHERE deleted_at IS NULL ORDER BY created_at DESC, id")
        .fetch_all(pool)
        .await?;
    rows.iter().map(joke_from_row).collect()
}

pub async fn list_by_owner(pool: &SqlitePool, owner: Uuid) -> AppResult<Vec<Joke>> {
    let rows = sqlx::query("SELECT * FROM jokes WHERE user_id = ? AND deleted_at IS NULL ORDER BY created_at DESC, id")
        .bind(owner.to_string())
        .fetch_all(pool)
        .await?;
    rows.iter().map(joke_from_row).collect()
}

pub async fn search(pool: &SqlitePool, term: &str) -> AppResult<Vec<Joke>> {
    let pattern = format!("%{}%", term.trim());
    let rows = sqlx::query(
        "SELECT * FROM jokes WHERE deleted_at IS NULL AND (title LIKE ? OR content LIKE ?) ORDER BY created_at DESC, id",
    )
    .bind(&pattern)
    .bind(&pattern)
    .fetch_all(pool)
    .await?;
    rows.iter().map(joke_from_row).collect()
}

/// Live jokes attached to a category.
pub async fn in_category(pool: &SqlitePool, category_id: Uuid) -> AppResult<Vec<Joke>> {
    let rows = sqlx::query(
        "SELECT j.* FROM jokes j JOIN category_joke cj ON cj.joke_id = j.id \
         WHERE cj.category_id = ? AND j.deleted_at IS NULL ORDER BY j.created_at DESC, j.id",
    )
    .bind(category_id.to_string())
    .fetch_all(pool)
    .await?;
    rows.iter().map(joke_from_row).collect()
}

pub async fn update(pool: &SqlitePool, joke: &Joke, changes: &JokeChanges) -> AppResult<Joke> {
    changes.validate()?;
    let mut updated = joke.clone();
    if let Some(title) = &changes.title {
        updated.title = title.trim().to_string();
    }
    if let Some(content) = &changes.content {
        updated.content = content.clone();
    }
    updated.updated_at = Utc::now();

    let result = sqlx::query("UPDATE jokes SET title = ?, content = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL")
        .bind(&updated.title)
        .bind(&updated.content)
        .bind(timestamp(updated.updated_at))
        .bind(joke.id.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("joke not found"));
    }
    Ok(updated)
}
