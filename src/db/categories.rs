use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::row_parsers::category_from_row;
use super::timestamp;
use crate::errors::{AppError, AppResult};
use crate::models::category::{Category, CategoryChanges, NewCategory};

fn map_title_conflict(title: &str) -> impl FnOnce(sqlx::Error) -> AppError + '_ {
    move |err| {
        if AppError::is_unique_violation(&err) {
            AppError::duplicate_name(title)
        } else {
            err.into()
        }
    }
}

pub async fn insert(conn: &mut SqliteConnection, new: &NewCategory) -> AppResult<Category> {
    new.validate()?;
    let now = Utc::now();
    let category = Category {
        id: Uuid::new_v4(),
        title: new.title.trim().to_string(),
        description: new.description.clone(),
        created_at: now,
        updated_at: now,
        deleted_at: None,
    };

    sqlx::query("INSERT INTO categories (id, title, description, created_at, updated_at) VALUES (?, ?, ?, ?, ?)")
        .bind(category.id.to_string())
        .bind(&category.title)
        .bind(&category.description)
        .bind(timestamp(now))
        .bind(timestamp(now))
        .execute(&mut *conn)
        .await
        .map_err(map_title_conflict(&category.title))?;

    Ok(category)
}

pub async fn list_live(pool: &SqlitePool) -> AppResult<Vec<Category>> {
    let rows = sqlx::query("SELECT * FROM categories WHERE deleted_at IS NULL ORDER BY title")
        .fetch_all(pool)
        .await?;
    rows.iter().map(category_from_row).collect()
}

pub async fn search(pool: &SqlitePool, term: &str) -> AppResult<Vec<Category>> {
    let pattern = format!("%{}%", term.trim());
    let rows = sqlx::query(
        "SELECT * FROM categories WHERE deleted_at IS NULL AND (title LIKE ? OR description LIKE ?) ORDER BY title",
    )
    .bind(&pattern)
    .bind(&pattern)
    .fetch_all(pool)
    .await?;
    rows.iter().map(category_from_row).collect()
}

/// Live categories whose titles are in `titles`, ignoring unknown titles.
pub async fn find_live_by_titles(conn: &mut SqliteConnection, titles: &[String]) -> AppResult<Vec<Category>> {
    let mut found = Vec::new();
    for title in titles {
        let row = sqlx::query("SELECT * FROM categories WHERE title = ? AND deleted_at IS NULL")
            .bind(title.trim())
            .fetch_optional(&mut *conn)
            .await?;
        if let Some(row) = row {
            let category = category_from_row(&row)?;
            if !found.iter().any(|c: &Category| c.id == category.id) {
                found.push(category);
            }
        }
    }
    Ok(found)
}

/// The live placeholder category, created or brought back from the trash
/// when needed.
pub async fn ensure_placeholder(conn: &mut SqliteConnection, title: &str) -> AppResult<Category> {
    let row = sqlx::query("SELECT * FROM categories WHERE title = ?")
        .bind(title)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => {
            let mut category = category_from_row(&row)?;
            if category.deleted_at.is_some() {
                sqlx::query("UPDATE categories SET deleted_at = NULL WHERE id = ?")
                    .bind(category.id.to_string())
                    .execute(&mut *conn)
                    .await?;
                category.deleted_at = None;
                tracing::info!(category = %category.title, "placeholder category restored");
            }
            Ok(category)
        }
        None => {
            let category = insert(conn, &NewCategory::new(title)).await?;
            tracing::info!(category = %category.title, "placeholder category created");
            Ok(category)
        }
    }
}

/// Live categories a joke is attached to.
pub async fn for_joke(pool: &SqlitePool, joke_id: Uuid) -> AppResult<Vec<Category>> {
    let rows = sqlx::query(
        "SELECT c.* FROM categories c JOIN category_joke cj ON cj.category_id = c.id \
         WHERE cj.joke_id = ? AND c.deleted_at IS NULL ORDER BY c.title",
    )
    .bind(joke_id.to_string())
    .fetch_all(pool)
    .await?;
    rows.iter().map(category_from_row).collect()
}

pub async fn update(pool: &SqlitePool, category: &Category, changes: &CategoryChanges) -> AppResult<Category> {
    let mut updated = category.clone();
    if let Some(title) = &changes.title {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::validation("category title must not be empty"));
        }
        updated.title = title.to_string();
    }
    if let Some(description) = &changes.description {
        updated.description = Some(description.clone());
    }
    updated.updated_at = Utc::now();

    let result = sqlx::query(
        "UPDATE categories SET title = ?, description = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(&updated.title)
    .bind(&updated.description)
    .bind(timestamp(updated.updated_at))
    .bind(category.id.to_string())
    .execute(pool)
    .await
    .map_err(map_title_conflict(&updated.title))?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("category not found"));
    }
    Ok(updated)
}
