use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{Action, JokeTarget, PolicyEvaluator, Principal, Target};
use crate::db::{categories, jokes, votes};
use crate::errors::AppResult;
use crate::lifecycle::{self, TrashFilter, TrashStore};
use crate::models::category::Category;
use crate::models::joke::{Joke, JokeChanges, JokeDetails, NewJoke};

async fn target_for(state: &AppState, joke: &Joke) -> AppResult<(JokeTarget, Vec<Category>)> {
    let attached = categories::for_joke(&state.pool, joke.id).await?;
    Ok((JokeTarget::from_joke(joke, &attached), attached))
}

async fn details(state: &AppState, joke: Joke, attached: Vec<Category>) -> AppResult<JokeDetails> {
    let score = votes::score(&state.pool, joke.id).await?;
    Ok(JokeDetails { joke, categories: attached, score })
}

/// Keep the jokes this actor may view.
pub(crate) async fn visible(state: &AppState, actor: &Principal, all: Vec<Joke>) -> AppResult<Vec<Joke>> {
    let mut kept = Vec::with_capacity(all.len());
    for joke in all {
        let (target, _) = target_for(state, &joke).await?;
        if state.policy.evaluate(actor, Action::View, Target::Joke(&target)).is_allowed() {
            kept.push(joke);
        }
    }
    Ok(kept)
}

pub async fn list(state: &AppState, actor: &Principal) -> AppResult<Vec<Joke>> {
    state.policy.authorize(actor, Action::Browse, Target::Jokes)?;
    visible(state, actor, jokes::list_live(&state.pool).await?).await
}

pub async fn search(state: &AppState, actor: &Principal, term: &str) -> AppResult<Vec<Joke>> {
    state.policy.authorize(actor, Action::Browse, Target::Jokes)?;
    visible(state, actor, jokes::search(&state.pool, term).await?).await
}

/// Create a joke owned by the actor. Titles that match no live category
/// are dropped; a joke left with none goes into the placeholder category.
pub async fn create(state: &AppState, actor: &Principal, new: &NewJoke) -> AppResult<JokeDetails> {
    state.policy.authorize(actor, Action::Create, Target::Jokes)?;
    new.validate()?;

    let mut tx = state.pool.begin().await?;
    let joke = jokes::insert(&mut tx, actor.user_id, new).await?;
    let mut attached = categories::find_live_by_titles(&mut tx, &new.categories).await?;
    if attached.is_empty() {
        attached.push(categories::ensure_placeholder(&mut tx, state.policy.placeholder_category()).await?);
    }
    jokes::attach(&mut tx, joke.id, &attached).await?;
    tx.commit().await?;

    tracing::info!(joke_id = %joke.id, owner = %actor.user_id, categories = attached.len(), "joke created");
    details(state, joke, attached).await
}

pub async fn view(state: &AppState, actor: &Principal, id: Uuid) -> AppResult<JokeDetails> {
    let joke: Joke = lifecycle::find_live(&state.store(), id).await?;
    let (target, attached) = target_for(state, &joke).await?;
    state.policy.authorize(actor, Action::View, Target::Joke(&target))?;
    details(state, joke, attached).await
}

pub async fn update(state: &AppState, actor: &Principal, id: Uuid, changes: &JokeChanges) -> AppResult<Joke> {
    let joke: Joke = lifecycle::find_live(&state.store(), id).await?;
    let (target, _) = target_for(state, &joke).await?;
    state.policy.authorize(actor, Action::Update, Target::Joke(&target))?;

    let updated = jokes::update(&state.pool, &joke, changes).await?;
    tracing::info!(joke_id = %id, actor = %actor.user_id, "joke updated");
    Ok(updated)
}

pub async fn delete(state: &AppState, actor: &Principal, id: Uuid) -> AppResult<Joke> {
    let store = state.store();
    let joke: Joke = lifecycle::find_live(&store, id).await?;
    let (target, _) = target_for(state, &joke).await?;
    state.policy.authorize(actor, Action::Delete, Target::Joke(&target))?;
    lifecycle::soft_delete(&store, joke).await
}

pub async fn list_trashed(state: &AppState, actor: &Principal) -> AppResult<Vec<Joke>> {
    state.policy.authorize(actor, Action::BrowseTrash, Target::Jokes)?;
    TrashStore::<Joke>::list_trashed(&state.store(), TrashFilter::All).await
}

pub async fn restore(state: &AppState, actor: &Principal, id: Uuid) -> AppResult<Joke> {
    let store = state.store();
    let joke: Joke = lifecycle::find_trashed(&store, id).await?;
    let target = JokeTarget::new(joke.id, joke.user_id);
    state.policy.authorize(actor, Action::Restore, Target::Joke(&target))?;
    lifecycle::restore(&store, joke).await
}

pub async fn purge(state: &AppState, actor: &Principal, id: Uuid) -> AppResult<Uuid> {
    let store = state.store();
    let joke: Joke = lifecycle::find_trashed(&store, id).await?;
    let target = JokeTarget::new(joke.id, joke.user_id);
    state.policy.authorize(actor, Action::Purge, Target::Joke(&target))?;
    lifecycle::purge(&store, joke).await
}

pub async fn restore_all(state: &AppState, actor: &Principal) -> AppResult<u64> {
    state.policy.authorize(actor, Action::Restore, Target::Jokes)?;
    lifecycle::restore_all::<Joke, _>(&state.store(), TrashFilter::All).await
}

pub async fn purge_all(state: &AppState, actor: &Principal) -> AppResult<u64> {
    state.policy.authorize(actor, Action::Purge, Target::Jokes)?;
    lifecycle::purge_all::<Joke, _>(&state.store(), TrashFilter::All).await
}
