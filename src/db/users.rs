use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::row_parsers::user_from_row;
use super::timestamp;
use crate::errors::{AppError, AppResult};
use crate::models::user::{NewUser, User, UserChanges};

fn map_email_conflict(err: sqlx::Error) -> AppError {
    if AppError::is_unique_violation(&err) {
        AppError::conflict("The email has already been taken.")
    } else {
        err.into()
    }
}

/// Insert the user row only; role assignment is the caller's.
pub async fn insert(conn: &mut SqliteConnection, new: &NewUser) -> AppResult<User> {
    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        name: new.name.trim().to_string(),
        email: new.email.trim().to_lowercase(),
        status: new.status.unwrap_or_default(),
        email_verified_at: new.email_verified_at,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    };

    if user.name.is_empty() {
        return Err(AppError::validation("name must not be empty"));
    }
    if !user.email.contains('@') {
        return Err(AppError::validation("email must be a valid email address"));
    }

    sqlx::query(
        "INSERT INTO users (id, name, email, status, email_verified_at, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user.id.to_string())
    .bind(&user.name)
    .bind(&user.email)
    .bind(user.status.as_str())
    .bind(user.email_verified_at.map(timestamp))
    .bind(timestamp(user.created_at))
    .bind(timestamp(user.updated_at))
    .execute(&mut *conn)
    .await
    .map_err(map_email_conflict)?;

    Ok(user)
}

pub async fn find_live(conn: &mut SqliteConnection, id: Uuid) -> AppResult<Option<User>> {
    let row = sqlx::query("SELECT * FROM users WHERE id = ? AND deleted_at IS NULL")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(user_from_row).transpose()
}

/// Live users only; soft-deleted accounts cannot be looked up by email.
pub async fn find_by_email(pool: &SqlitePool, email: &str) -> AppResult<Option<User>> {
    let row = sqlx::query("SELECT * FROM users WHERE email = ? AND deleted_at IS NULL")
        .bind(email.trim().to_lowercase())
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(user_from_row).transpose()
}

pub async fn list_live(pool: &SqlitePool) -> AppResult<Vec<User>> {
    let rows = sqlx::query("SELECT * FROM users WHERE deleted_at IS NULL ORDER BY created_at, id")
        .fetch_all(pool)
        .await?;
    rows.iter().map(user_from_row).collect()
}

/// Write the profile fields of `changes` and, when asked, drop the email
/// verification. Role changes are applied separately.
pub async fn apply_changes(
    conn: &mut SqliteConnection,
    user: &User,
    changes: &UserChanges,
    clear_verification: bool,
) -> AppResult<User> {
    let mut updated = user.clone();
    if let Some(name) = &changes.name {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("name must not be empty"));
        }
        updated.name = name.to_string();
    }
    if let Some(email) = &changes.email {
        let email = email.trim().to_lowercase();
        if !email.contains('@') {
            return Err(AppError::validation("email must be a valid email address"));
        }
        updated.email = email;
    }
    if let Some(status) = changes.status {
        updated.status = status;
    }
    if clear_verification {
        updated.email_verified_at = None;
    }
    updated.updated_at = Utc::now();

    let result = sqlx::query(
        "UPDATE users SET name = ?, email = ?, status = ?, email_verified_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(&updated.name)
    .bind(&updated.email)
    .bind(updated.status.as_str())
    .bind(updated.email_verified_at.map(timestamp))
    .bind(timestamp(updated.updated_at))
    .bind(user.id.to_string())
    .execute(&mut *conn)
    .await
    .map_err(map_email_conflict)?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("user not found"));
    }
    Ok(updated)
}
