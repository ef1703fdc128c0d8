use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{Action, JokeTarget, PolicyEvaluator, Principal, Target};
use crate::db::votes;
use crate::errors::AppResult;
use crate::lifecycle;
use crate::models::joke::Joke;
use crate::models::vote::{JokeScore, Rating, VoteChange};

async fn authorize_on_joke(state: &AppState, actor: &Principal, joke_id: Uuid, action: Action) -> AppResult<()> {
    let joke: Joke = lifecycle::find_live(&state.store(), joke_id).await?;
    state.policy.authorize(actor, action, Target::Joke(&JokeTarget::new(joke.id, joke.user_id)))
}

async fn cast(state: &AppState, actor: &Principal, joke_id: Uuid, rating: Rating) -> AppResult<VoteChange> {
    authorize_on_joke(state, actor, joke_id, Action::Vote).await?;
    let change = votes::cast(&state.pool, actor.user_id, joke_id, rating).await?;
    tracing::info!(user_id = %actor.user_id, %joke_id, ?change, "vote cast");
    Ok(change)
}

pub async fn like(state: &AppState, actor: &Principal, joke_id: Uuid) -> AppResult<VoteChange> {
    cast(state, actor, joke_id, Rating::Up).await
}

pub async fn dislike(state: &AppState, actor: &Principal, joke_id: Uuid) -> AppResult<VoteChange> {
    cast(state, actor, joke_id, Rating::Down).await
}

/// Withdraw the actor's vote; returns the rating that was removed.
pub async fn remove(state: &AppState, actor: &Principal, joke_id: Uuid) -> AppResult<Rating> {
    authorize_on_joke(state, actor, joke_id, Action::RemoveVote).await?;
    let removed = votes::remove(&state.pool, actor.user_id, joke_id).await?;
    tracing::info!(user_id = %actor.user_id, %joke_id, ?removed, "vote removed");
    Ok(removed)
}

/// The actor's current rating of a joke.
pub async fn current(state: &AppState, actor: &Principal, joke_id: Uuid) -> AppResult<Option<Rating>> {
    votes::rating(&state.pool, actor.user_id, joke_id).await
}

pub async fn score(state: &AppState, joke_id: Uuid) -> AppResult<JokeScore> {
    votes::score(&state.pool, joke_id).await
}
