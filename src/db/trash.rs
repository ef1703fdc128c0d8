use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::row_parsers;
use super::timestamp;
use crate::errors::AppResult;
use crate::lifecycle::{Scope, SoftDeletable, TrashFilter, TrashStore};
use crate::models::category::Category;
use crate::models::joke::Joke;
use crate::models::user::User;

/// Restricts `users` rows to those whose every role is the client role.
/// Must agree with `UserTarget::is_client_only`.
const CLIENT_USERS_ONLY: &str = "EXISTS (SELECT 1 FROM user_roles ur WHERE ur.user_id = users.id) \
     AND NOT EXISTS (SELECT 1 FROM user_roles ur JOIN roles r ON r.id = ur.role_id \
     WHERE ur.user_id = users.id AND r.name <> 'client')";

/// Table mapping for a soft-deletable record.
pub trait SoftDeleteTable: SoftDeletable {
    const TABLE: &'static str;

    /// Pivot `(table, column)` whose rows pointing at a record are dropped
    /// when the record is soft deleted.
    const DETACH_ON_DELETE: Option<(&'static str, &'static str)> = None;

    fn from_row(row: &SqliteRow) -> AppResult<Self>;

    /// SQL predicate over `TABLE` for a trash filter.
    fn trash_predicate(filter: TrashFilter) -> &'static str {
        match filter {
            TrashFilter::All => "1 = 1",
            TrashFilter::ClientUsersOnly => "0 = 1",
        }
    }
}

impl SoftDeleteTable for User {
    const TABLE: &'static str = "users";

    fn from_row(row: &SqliteRow) -> AppResult<Self> {
        row_parsers::user_from_row(row)
    }

    fn trash_predicate(filter: TrashFilter) -> &'static str {
        match filter {
            TrashFilter::All => "1 = 1",
            TrashFilter::ClientUsersOnly => CLIENT_USERS_ONLY,
        }
    }
}

impl SoftDeleteTable for Joke {
    const TABLE: &'static str = "jokes";

    fn from_row(row: &SqliteRow) -> AppResult<Self> {
        row_parsers::joke_from_row(row)
    }
}

impl SoftDeleteTable for Category {
    const TABLE: &'static str = "categories";
    const DETACH_ON_DELETE: Option<(&'static str, &'static str)> = Some(("category_joke", "category_id"));

    fn from_row(row: &SqliteRow) -> AppResult<Self> {
        row_parsers::category_from_row(row)
    }
}

/// [`TrashStore`] over SQLite for every [`SoftDeleteTable`].
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn trashed_ids<T: SoftDeleteTable>(
        conn: &mut SqliteConnection,
        filter: TrashFilter,
    ) -> AppResult<Vec<String>> {
        let sql = format!(
            "SELECT id FROM {} WHERE deleted_at IS NOT NULL AND ({})",
            T::TABLE,
            T::trash_predicate(filter)
        );
        let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;
        let ids = rows
            .iter()
            .map(|row| row.try_get::<String, _>("id"))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }
}

/// Soft delete on a caller-held connection, so other writes can share the
/// transaction. Detaches pivot rows. False when the row was not live.
pub async fn mark_deleted_on<T: SoftDeleteTable>(
    conn: &mut SqliteConnection,
    id: Uuid,
    at: DateTime<Utc>,
) -> AppResult<bool> {
    let sql = format!("UPDATE {} SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL", T::TABLE);
    let result = sqlx::query(&sql)
        .bind(timestamp(at))
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Ok(false);
    }

    if let Some((pivot, column)) = T::DETACH_ON_DELETE {
        let sql = format!("DELETE FROM {} WHERE {} = ?", pivot, column);
        let detached = sqlx::query(&sql).bind(id.to_string()).execute(&mut *conn).await?;
        tracing::debug!(entity = T::entity_type(), %id, detached = detached.rows_affected(), "detached on delete");
    }
    Ok(true)
}

#[async_trait]
impl<T: SoftDeleteTable> TrashStore<T> for SqliteStore {
    async fn find(&self, id: Uuid, scope: Scope) -> AppResult<Option<T>> {
        let marker = match scope {
            Scope::Live => "IS NULL",
            Scope::Trashed => "IS NOT NULL",
        };
        let sql = format!("SELECT * FROM {} WHERE id = ? AND deleted_at {}", T::TABLE, marker);
        let row = sqlx::query(&sql).bind(id.to_string()).fetch_optional(&self.pool).await?;
        row.as_ref().map(T::from_row).transpose()
    }

    async fn list_trashed(&self, filter: TrashFilter) -> AppResult<Vec<T>> {
        let sql = format!(
            "SELECT * FROM {} WHERE deleted_at IS NOT NULL AND ({}) ORDER BY deleted_at DESC",
            T::TABLE,
            T::trash_predicate(filter)
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(T::from_row).collect()
    }

    async fn mark_deleted(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;
        let changed = mark_deleted_on::<T>(&mut tx, id, at).await?;
        tx.commit().await?;
        Ok(changed)
    }

    async fn clear_deleted(&self, id: Uuid) -> AppResult<bool> {
        let sql = format!("UPDATE {} SET deleted_at = NULL WHERE id = ? AND deleted_at IS NOT NULL", T::TABLE);
        let result = sqlx::query(&sql).bind(id.to_string()).execute(&self.pool).await?;
        Ok(result.rows_affected() == 1)
    }

    async fn remove(&self, id: Uuid) -> AppResult<bool> {
        let sql = format!("DELETE FROM {} WHERE id = ? AND deleted_at IS NOT NULL", T::TABLE);
        let result = sqlx::query(&sql).bind(id.to_string()).execute(&self.pool).await?;
        Ok(result.rows_affected() == 1)
    }

    async fn restore_matching(&self, filter: TrashFilter) -> AppResult<u64> {
        let mut tx = self.pool.begin().await?;
        let ids = Self::trashed_ids::<T>(&mut *tx, filter).await?;

        let sql = format!("UPDATE {} SET deleted_at = NULL WHERE id = ? AND deleted_at IS NOT NULL", T::TABLE);
        let mut count = 0;
        for id in &ids {
            count += sqlx::query(&sql).bind(id.as_str()).execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        Ok(count)
    }

    async fn purge_matching(&self, filter: TrashFilter) -> AppResult<u64> {
        let mut tx = self.pool.begin().await?;
        let ids = Self::trashed_ids::<T>(&mut *tx, filter).await?;

        let sql = format!("DELETE FROM {} WHERE id = ? AND deleted_at IS NOT NULL", T::TABLE);
        let mut count = 0;
        for id in &ids {
            count += sqlx::query(&sql).bind(id.as_str()).execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        Ok(count)
    }
}
