//! Soft-delete lifecycle shared by users, jokes and categories.
//!
//! `Live -> SoftDeleted -> Purged`, with `SoftDeleted -> Live` on restore.
//! [`Lifecycle`] is the pure state machine; [`store`] drives it against a
//! [`TrashStore`] so every entity goes through the same transitions.

pub mod store;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

pub use store::{
    find_live, find_trashed, purge, purge_all, restore, restore_all, soft_delete, Scope, TrashFilter,
    TrashStore,
};

/// An entity carrying a deletion marker.
pub trait SoftDeletable: Clone + Send + Sync + 'static {
    /// Entity name used in messages and logs ("joke", "user", ...).
    fn entity_type() -> &'static str;

    fn id(&self) -> Uuid;

    fn deleted_at(&self) -> Option<DateTime<Utc>>;

    fn set_deleted_at(&mut self, at: Option<DateTime<Utc>>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Live,
    SoftDeleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    SoftDelete,
    Restore,
    Purge,
}

/// Result of applying a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Live(T),
    Trashed(T),
    /// Terminal. Only the id survives.
    Purged(Uuid),
}

impl<T> Outcome<T> {
    pub fn into_resource(self) -> Option<T> {
        match self {
            Outcome::Live(r) | Outcome::Trashed(r) => Some(r),
            Outcome::Purged(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lifecycle<T> {
    resource: T,
}

impl<T: SoftDeletable> Lifecycle<T> {
    pub fn new(resource: T) -> Self {
        Self { resource }
    }

    pub fn state(&self) -> LifecycleState {
        if self.resource.deleted_at().is_some() {
            LifecycleState::SoftDeleted
        } else {
            LifecycleState::Live
        }
    }

    pub fn resource(&self) -> &T {
        &self.resource
    }

    pub fn into_inner(self) -> T {
        self.resource
    }

    pub fn soft_delete(mut self, at: DateTime<Utc>) -> AppResult<T> {
        self.expect(LifecycleState::Live, Transition::SoftDelete)?;
        self.resource.set_deleted_at(Some(at));
        Ok(self.resource)
    }

    pub fn restore(mut self) -> AppResult<T> {
        self.expect(LifecycleState::SoftDeleted, Transition::Restore)?;
        self.resource.set_deleted_at(None);
        Ok(self.resource)
    }

    pub fn purge(self) -> AppResult<Uuid> {
        self.expect(LifecycleState::SoftDeleted, Transition::Purge)?;
        Ok(self.resource.id())
    }

    pub fn apply(self, transition: Transition, now: DateTime<Utc>) -> AppResult<Outcome<T>> {
        match transition {
            Transition::SoftDelete => self.soft_delete(now).map(Outcome::Trashed),
            Transition::Restore => self.restore().map(Outcome::Live),
            Transition::Purge => self.purge().map(Outcome::Purged),
        }
    }

    fn expect(&self, wanted: LifecycleState, transition: Transition) -> AppResult<()> {
        let state = self.state();
        if state == wanted {
            return Ok(());
        }
        Err(AppError::invalid_transition(format!(
            "cannot {:?} {} {} in state {:?}",
            transition,
            T::entity_type(),
            self.resource.id(),
            state
        )))
    }
}

/// Apply a transition to an in-memory resource.
pub fn apply_lifecycle<T: SoftDeletable>(resource: T, transition: Transition) -> AppResult<Outcome<T>> {
    Lifecycle::new(resource).apply(transition, Utc::now())
}
