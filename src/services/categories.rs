use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{Action, CategoryTarget, PolicyEvaluator, Principal, Target};
use crate::db::{categories, jokes};
use crate::errors::AppResult;
use crate::lifecycle::{self, TrashFilter, TrashStore};
use crate::models::category::{Category, CategoryChanges, NewCategory};
use crate::models::joke::Joke;

pub async fn list(state: &AppState, actor: &Principal) -> AppResult<Vec<Category>> {
    state.policy.authorize(actor, Action::Browse, Target::Categories)?;
    categories::list_live(&state.pool).await
}

pub async fn search(state: &AppState, actor: &Principal, term: &str) -> AppResult<Vec<Category>> {
    state.policy.authorize(actor, Action::Browse, Target::Categories)?;
    categories::search(&state.pool, term).await
}

pub async fn create(state: &AppState, actor: &Principal, new: &NewCategory) -> AppResult<Category> {
    state.policy.authorize(actor, Action::Create, Target::Categories)?;
    let mut conn = state.pool.acquire().await?;
    let category = categories::insert(&mut conn, new).await?;
    tracing::info!(category_id = %category.id, title = %category.title, "category created");
    Ok(category)
}

pub async fn view(state: &AppState, actor: &Principal, id: Uuid) -> AppResult<Category> {
    let category: Category = lifecycle::find_live(&state.store(), id).await?;
    state.policy.authorize(actor, Action::View, Target::Category(&CategoryTarget { id }))?;
    Ok(category)
}

/// Live jokes filed under a category that the actor may view.
pub async fn list_jokes(state: &AppState, actor: &Principal, id: Uuid) -> AppResult<Vec<Joke>> {
    view(state, actor, id).await?;
    state.policy.authorize(actor, Action::Browse, Target::Jokes)?;
    let filed = jokes::in_category(&state.pool, id).await?;
    super::jokes::visible(state, actor, filed).await
}

pub async fn update(state: &AppState, actor: &Principal, id: Uuid, changes: &CategoryChanges) -> AppResult<Category> {
    let category: Category = lifecycle::find_live(&state.store(), id).await?;
    state.policy.authorize(actor, Action::Update, Target::Category(&CategoryTarget { id }))?;
    categories::update(&state.pool, &category, changes).await
}

/// Soft delete. Joke associations are detached; the jokes stay.
pub async fn delete(state: &AppState, actor: &Principal, id: Uuid) -> AppResult<Category> {
    let store = state.store();
    let category: Category = lifecycle::find_live(&store, id).await?;
    state.policy.authorize(actor, Action::Delete, Target::Category(&CategoryTarget { id }))?;
    lifecycle::soft_delete(&store, category).await
}

pub async fn list_trashed(state: &AppState, actor: &Principal) -> AppResult<Vec<Category>> {
    state.policy.authorize(actor, Action::BrowseTrash, Target::Categories)?;
    TrashStore::<Category>::list_trashed(&state.store(), TrashFilter::All).await
}

pub async fn restore(state: &AppState, actor: &Principal, id: Uuid) -> AppResult<Category> {
    let store = state.store();
    let category: Category = lifecycle::find_trashed(&store, id).await?;
    state.policy.authorize(actor, Action::Restore, Target::Category(&CategoryTarget { id }))?;
    lifecycle::restore(&store, category).await
}

pub async fn purge(state: &AppState, actor: &Principal, id: Uuid) -> AppResult<Uuid> {
    let store = state.store();
    let category: Category = lifecycle::find_trashed(&store, id).await?;
    state.policy.authorize(actor, Action::Purge, Target::Category(&CategoryTarget { id }))?;
    lifecycle::purge(&store, category).await
}

pub async fn restore_all(state: &AppState, actor: &Principal) -> AppResult<u64> {
    state.policy.authorize(actor, Action::Restore, Target::Categories)?;
    lifecycle::restore_all::<Category, _>(&state.store(), TrashFilter::All).await
}

pub async fn purge_all(state: &AppState, actor: &Principal) -> AppResult<u64> {
    state.policy.authorize(actor, Action::Purge, Target::Categories)?;
    lifecycle::purge_all::<Category, _>(&state.store(), TrashFilter::All).await
}
