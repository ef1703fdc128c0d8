use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{Lifecycle, SoftDeletable};
use crate::errors::{AppError, AppResult};

/// Which rows a lookup may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Default scope: soft-deleted rows are invisible.
    Live,
    /// Only soft-deleted rows.
    Trashed,
}

/// Narrowing applied to bulk trash operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrashFilter {
    #[default]
    All,
    /// Users whose every role is the client tier.
    ClientUsersOnly,
}

/// Persistence seam for soft-deletable records.
///
/// `mark_deleted`, `clear_deleted` and `remove` are conditional on the row
/// being in the expected state and report whether a row changed.
#[async_trait]
pub trait TrashStore<T: SoftDeletable>: Send + Sync {
    async fn find(&self, id: Uuid, scope: Scope) -> AppResult<Option<T>>;

    async fn list_trashed(&self, filter: TrashFilter) -> AppResult<Vec<T>>;

    async fn mark_deleted(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<bool>;

    async fn clear_deleted(&self, id: Uuid) -> AppResult<bool>;

    async fn remove(&self, id: Uuid) -> AppResult<bool>;

    /// Restore every trashed row matching `filter`; returns the count.
    async fn restore_matching(&self, filter: TrashFilter) -> AppResult<u64>;

    /// Purge every trashed row matching `filter`; returns the count.
    async fn purge_matching(&self, filter: TrashFilter) -> AppResult<u64>;
}

fn not_found<T: SoftDeletable>() -> AppError {
    AppError::not_found(format!("{} not found", T::entity_type()))
}

pub async fn find_live<T, S>(store: &S, id: Uuid) -> AppResult<T>
where
    T: SoftDeletable,
    S: TrashStore<T> + ?Sized,
{
    store.find(id, Scope::Live).await?.ok_or_else(not_found::<T>)
}

pub async fn find_trashed<T, S>(store: &S, id: Uuid) -> AppResult<T>
where
    T: SoftDeletable,
    S: TrashStore<T> + ?Sized,
{
    store.find(id, Scope::Trashed).await?.ok_or_else(not_found::<T>)
}

/// Move a live resource to the trash.
pub async fn soft_delete<T, S>(store: &S, resource: T) -> AppResult<T>
where
    T: SoftDeletable,
    S: TrashStore<T> + ?Sized,
{
    let id = resource.id();
    let at = Utc::now();
    let trashed = Lifecycle::new(resource).soft_delete(at).map_err(|_| not_found::<T>())?;

    if !store.mark_deleted(id, at).await? {
        return Err(not_found::<T>());
    }

    tracing::info!(entity = T::entity_type(), id = %id, "soft deleted");
    Ok(trashed)
}

/// Bring a trashed resource back.
pub async fn restore<T, S>(store: &S, resource: T) -> AppResult<T>
where
    T: SoftDeletable,
    S: TrashStore<T> + ?Sized,
{
    let id = resource.id();
    let restored = Lifecycle::new(resource).restore().map_err(|_| not_found::<T>())?;

    if !store.clear_deleted(id).await? {
        return Err(not_found::<T>());
    }

    tracing::info!(entity = T::entity_type(), id = %id, "restored");
    Ok(restored)
}

/// Permanently remove a trashed resource.
pub async fn purge<T, S>(store: &S, resource: T) -> AppResult<Uuid>
where
    T: SoftDeletable,
    S: TrashStore<T> + ?Sized,
{
    let id = Lifecycle::new(resource).purge().map_err(|_| not_found::<T>())?;

    if !store.remove(id).await? {
        return Err(not_found::<T>());
    }

    tracing::info!(entity = T::entity_type(), id = %id, "purged");
    Ok(id)
}

pub async fn restore_all<T, S>(store: &S, filter: TrashFilter) -> AppResult<u64>
where
    T: SoftDeletable,
    S: TrashStore<T> + ?Sized,
{
    let count = store.restore_matching(filter).await?;
    tracing::info!(entity = T::entity_type(), ?filter, count, "restored from trash");
    Ok(count)
}

pub async fn purge_all<T, S>(store: &S, filter: TrashFilter) -> AppResult<u64>
where
    T: SoftDeletable,
    S: TrashStore<T> + ?Sized,
{
    let count = store.purge_matching(filter).await?;
    tracing::info!(entity = T::entity_type(), ?filter, count, "purged from trash");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: Uuid,
        deleted_at: Option<DateTime<Utc>>,
    }

    impl SoftDeletable for Item {
        fn entity_type() -> &'static str {
            "item"
        }
        fn id(&self) -> Uuid {
            self.id
        }
        fn deleted_at(&self) -> Option<DateTime<Utc>> {
            self.deleted_at
        }
        fn set_deleted_at(&mut self, at: Option<DateTime<Utc>>) {
            self.deleted_at = at;
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        rows: Mutex<HashMap<Uuid, Item>>,
    }

    impl MemoryStore {
        fn insert(&self) -> Item {
            let item = Item { id: Uuid::new_v4(), deleted_at: None };
            self.rows.lock().unwrap().insert(item.id, item.clone());
            item
        }
    }

    #[async_trait]
    impl TrashStore<Item> for MemoryStore {
        async fn find(&self, id: Uuid, scope: Scope) -> AppResult<Option<Item>> {
            let rows = self.rows.lock().unwrap();
            Ok(rows.get(&id).filter(|i| (scope == Scope::Trashed) == i.deleted_at.is_some()).cloned())
        }

        async fn list_trashed(&self, _filter: TrashFilter) -> AppResult<Vec<Item>> {
            let rows = self.rows.lock().unwrap();
            Ok(rows.values().filter(|i| i.deleted_at.is_some()).cloned().collect())
        }

        async fn mark_deleted(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<bool> {
            let mut rows = self.rows.lock().unwrap();
            match rows.get_mut(&id) {
                Some(item) if item.deleted_at.is_none() => {
                    item.deleted_at = Some(at);
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn clear_deleted(&self, id: Uuid) -> AppResult<bool> {
            let mut rows = self.rows.lock().unwrap();
            match rows.get_mut(&id) {
                Some(item) if item.deleted_at.is_some() => {
                    item.deleted_at = None;
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn remove(&self, id: Uuid) -> AppResult<bool> {
            let mut rows = self.rows.lock().unwrap();
            let trashed = rows.get(&id).map(|i| i.deleted_at.is_some()).unwrap_or(false);
            Ok(trashed && rows.remove(&id).is_some())
        }

        async fn restore_matching(&self, _filter: TrashFilter) -> AppResult<u64> {
            let mut rows = self.rows.lock().unwrap();
            let mut count = 0;
            for item in rows.values_mut().filter(|i| i.deleted_at.is_some()) {
                item.deleted_at = None;
                count += 1;
            }
            Ok(count)
        }

        async fn purge_matching(&self, _filter: TrashFilter) -> AppResult<u64> {
            let mut rows = self.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|_, i| i.deleted_at.is_none());
            Ok((before - rows.len()) as u64)
        }
    }

    #[tokio::test]
    async fn soft_deleted_items_leave_the_default_scope() {
        let store = MemoryStore::default();
        let item = store.insert();

        soft_delete(&store, item.clone()).await.unwrap();
        let err = find_live::<Item, _>(&store, item.id).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(find_trashed::<Item, _>(&store, item.id).await.is_ok());
    }

    #[tokio::test]
    async fn purge_is_terminal() {
        let store = MemoryStore::default();
        let item = store.insert();

        let trashed = soft_delete(&store, item.clone()).await.unwrap();
        purge(&store, trashed).await.unwrap();

        assert!(find_live::<Item, _>(&store, item.id).await.is_err());
        assert!(find_trashed::<Item, _>(&store, item.id).await.is_err());
    }

    #[tokio::test]
    async fn restoring_a_live_item_is_not_found() {
        let store = MemoryStore::default();
        let item = store.insert();
        let err = restore(&store, item).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn stale_copy_cannot_be_deleted_twice() {
        let store = MemoryStore::default();
        let item = store.insert();

        soft_delete(&store, item.clone()).await.unwrap();
        let err = soft_delete(&store, item).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn bulk_operations_report_counts() {
        let store = MemoryStore::default();
        for _ in 0..3 {
            let item = store.insert();
            soft_delete(&store, item).await.unwrap();
        }
        store.insert();

        assert_eq!(restore_all::<Item, _>(&store, TrashFilter::All).await.unwrap(), 3);
        assert_eq!(purge_all::<Item, _>(&store, TrashFilter::All).await.unwrap(), 0);
    }
}
