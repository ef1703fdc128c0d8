use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::authz::permissions::Permission;
use crate::authz::roles::Role;
use crate::errors::AppError;
use crate::models::category::Category;
use crate::models::joke::Joke;
use crate::models::rbac::PermissionRecord;
use crate::models::session::Session;
use crate::models::user::User;
use crate::models::vote::{Rating, Vote};

pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, AppError> {
    let s = s.trim();

    // RFC3339 (what this crate writes)
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // SQLite CURRENT_TIMESTAMP format, optional fractional seconds
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    if let Ok(naive_date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let ndt = naive_date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| AppError::internal("invalid datetime: date out of range".to_string()))?;
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    Err(AppError::internal(format!("invalid datetime: {}", s)))
}

fn parse_opt_datetime(s: Option<String>) -> Result<Option<DateTime<Utc>>, AppError> {
    match s {
        Some(s) if !s.trim().is_empty() => Ok(Some(parse_datetime(&s)?)),
        _ => Ok(None),
    }
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, AppError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name).map_err(|e| AppError::internal(format!("missing {}: {}", name, e)))
}

fn uuid_column(row: &SqliteRow, name: &str) -> Result<Uuid, AppError> {
    let s: String = column(row, name)?;
    Uuid::parse_str(&s).map_err(|e| AppError::internal(format!("invalid uuid in {}: {}", name, e)))
}

fn datetime_column(row: &SqliteRow, name: &str) -> Result<DateTime<Utc>, AppError> {
    let s: String = column(row, name)?;
    parse_datetime(&s)
}

fn opt_datetime_column(row: &SqliteRow, name: &str) -> Result<Option<DateTime<Utc>>, AppError> {
    parse_opt_datetime(column(row, name)?)
}

pub fn user_from_row(row: &SqliteRow) -> Result<User, AppError> {
    let status: String = column(row, "status")?;

    Ok(User {
        id: uuid_column(row, "id")?,
        name: column(row, "name")?,
        email: column(row, "email")?,
        status: status.parse()?,
        email_verified_at: opt_datetime_column(row, "email_verified_at")?,
        created_at: datetime_column(row, "created_at")?,
        updated_at: datetime_column(row, "updated_at")?,
        deleted_at: opt_datetime_column(row, "deleted_at")?,
    })
}

pub fn joke_from_row(row: &SqliteRow) -> Result<Joke, AppError> {
    Ok(Joke {
        id: uuid_column(row, "id")?,
        user_id: uuid_column(row, "user_id")?,
        title: column(row, "title")?,
        content: column(row, "content")?,
        created_at: datetime_column(row, "created_at")?,
        updated_at: datetime_column(row, "updated_at")?,
        deleted_at: opt_datetime_column(row, "deleted_at")?,
    })
}

pub fn category_from_row(row: &SqliteRow) -> Result<Category, AppError> {
    Ok(Category {
        id: uuid_column(row, "id")?,
        title: column(row, "title")?,
        description: column(row, "description")?,
        created_at: datetime_column(row, "created_at")?,
        updated_at: datetime_column(row, "updated_at")?,
        deleted_at: opt_datetime_column(row, "deleted_at")?,
    })
}

pub fn vote_from_row(row: &SqliteRow) -> Result<Vote, AppError> {
    let rating: i64 = column(row, "rating")?;

    Ok(Vote {
        user_id: uuid_column(row, "user_id")?,
        joke_id: uuid_column(row, "joke_id")?,
        rating: Rating::from_value(rating)?,
        created_at: datetime_column(row, "created_at")?,
        updated_at: datetime_column(row, "updated_at")?,
    })
}

/// Role header only; the caller attaches its permissions.
pub fn role_from_row(row: &SqliteRow) -> Result<Role, AppError> {
    let mut role = Role::new(column::<String>(row, "name")?, column(row, "level")?);
    role.id = uuid_column(row, "id")?;
    Ok(role)
}

/// Stored names outside the catalog are reported, not dropped.
pub fn permission_from_row(row: &SqliteRow) -> Result<PermissionRecord, AppError> {
    let name: String = column(row, "name")?;

    Ok(PermissionRecord {
        id: uuid_column(row, "id")?,
        permission: name.parse::<Permission>()?,
        created_at: datetime_column(row, "created_at")?,
    })
}

pub fn session_from_row(row: &SqliteRow) -> Result<Session, AppError> {
    Ok(Session {
        id: uuid_column(row, "id")?,
        user_id: uuid_column(row, "user_id")?,
        token_hash: column(row, "token_hash")?,
        created_at: datetime_column(row, "created_at")?,
        revoked_at: opt_datetime_column(row, "revoked_at")?,
    })
}
