use chrono::Utc;
use serde::Serialize;
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{
    derive_update_side_effects, Action, PolicyEvaluator, Principal, Role, RoleTier, Target, UpdateSideEffects,
    UserTarget,
};
use crate::db::{roles, sessions, trash, users};
use crate::errors::{AppError, AppResult};
use crate::lifecycle::{self, Lifecycle, TrashStore};
use crate::models::rbac::EffectivePermissions;
use crate::models::user::{NewUser, User, UserChanges};

#[derive(Debug, Clone, Serialize)]
pub struct UserUpdate {
    pub user: User,
    pub side_effects: UpdateSideEffects,
    pub sessions_revoked: u64,
}

async fn target_for(conn: &mut SqliteConnection, user_id: Uuid) -> AppResult<UserTarget> {
    let held = roles::roles_for_user(conn, user_id).await?;
    Ok(UserTarget::from_roles(user_id, &held))
}

/// Same as [`target_for`] on a connection released before returning.
async fn load_target(state: &AppState, user_id: Uuid) -> AppResult<UserTarget> {
    let mut conn = state.pool.acquire().await?;
    target_for(&mut conn, user_id).await
}

async fn tier_role(conn: &mut SqliteConnection, tier: RoleTier) -> AppResult<Role> {
    roles::find_role_by_name(conn, tier.name())
        .await?
        .ok_or_else(|| AppError::configuration(format!("role {} is not provisioned", tier)))
}

pub async fn list(state: &AppState, actor: &Principal) -> AppResult<Vec<User>> {
    state.policy.authorize(actor, Action::Browse, Target::Users)?;
    users::list_live(&state.pool).await
}

pub async fn view(state: &AppState, actor: &Principal, id: Uuid) -> AppResult<User> {
    let user: User = lifecycle::find_live(&state.store(), id).await?;
    let target = load_target(state, id).await?;
    state.policy.authorize(actor, Action::View, Target::User(&target))?;
    Ok(user)
}

/// Roles and granted permissions of a user, as visible to `actor`.
pub async fn effective_permissions(state: &AppState, actor: &Principal, id: Uuid) -> AppResult<EffectivePermissions> {
    let user = view(state, actor, id).await?;
    let mut conn = state.pool.acquire().await?;
    let held = roles::roles_for_user(&mut conn, id).await?;
    Ok(EffectivePermissions::from(&Principal::from_user(&user, held)))
}

/// Create a user holding exactly the requested fixed role.
pub async fn create(state: &AppState, actor: &Principal, new: &NewUser) -> AppResult<User> {
    state.policy.authorize(actor, Action::Create, Target::NewUser(new.role))?;

    let mut tx = state.pool.begin().await?;
    let role = tier_role(&mut tx, new.role).await?;
    let user = users::insert(&mut tx, new).await?;
    roles::assign_role(&mut tx, user.id, role.id).await?;
    tx.commit().await?;

    tracing::info!(user_id = %user.id, role = %new.role, actor = %actor.user_id, "user created");
    Ok(user)
}

/// Apply `changes` together with the side effects they imply, in one
/// transaction.
pub async fn update(state: &AppState, actor: &Principal, id: Uuid, changes: &UserChanges) -> AppResult<UserUpdate> {
    let mut tx = state.pool.begin().await?;

    let user = users::find_live(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))?;
    let target = target_for(&mut tx, id).await?;
    state.policy.authorize(actor, Action::Update, Target::UserEdit(&target, changes))?;

    let side_effects = derive_update_side_effects(&target, changes);
    let updated = users::apply_changes(&mut tx, &user, changes, side_effects.clear_verification).await?;

    if let Some(tier) = changes.role {
        let role = tier_role(&mut tx, tier).await?;
        roles::replace_roles(&mut tx, id, role.id).await?;
    }

    let sessions_revoked = if side_effects.revoke_tokens {
        sessions::revoke_all(&mut tx, id).await?
    } else {
        0
    };

    tx.commit().await?;

    tracing::info!(
        user_id = %id,
        actor = %actor.user_id,
        status = %updated.status,
        sessions_revoked,
        verification_cleared = side_effects.clear_verification,
        "user updated"
    );
    Ok(UserUpdate { user: updated, side_effects, sessions_revoked })
}

/// Soft delete a user and cut their sessions in one transaction.
/// Super-admins are never deleted through here, whoever asks.
pub async fn delete(state: &AppState, actor: &Principal, id: Uuid) -> AppResult<User> {
    let user: User = lifecycle::find_live(&state.store(), id).await?;
    let target = load_target(state, id).await?;

    if target.is_super_admin() {
        tracing::warn!(user_id = %id, actor = %actor.user_id, "refused to delete a super-admin");
        return Err(AppError::forbidden());
    }
    state.policy.authorize(actor, Action::Delete, Target::User(&target))?;

    let deleted_at = Utc::now();
    let trashed = Lifecycle::new(user)
        .soft_delete(deleted_at)
        .map_err(|_| AppError::not_found("user not found"))?;

    let mut tx = state.pool.begin().await?;
    if !trash::mark_deleted_on::<User>(&mut tx, id, deleted_at).await? {
        return Err(AppError::not_found("user not found"));
    }
    let revoked = sessions::revoke_all(&mut tx, id).await?;
    tx.commit().await?;

    tracing::info!(user_id = %id, actor = %actor.user_id, revoked, "user deleted");
    Ok(trashed)
}

pub async fn list_trashed(state: &AppState, actor: &Principal) -> AppResult<Vec<User>> {
    let filter = state.policy.user_trash_filter(actor, Action::BrowseTrash)?;
    TrashStore::<User>::list_trashed(&state.store(), filter).await
}

pub async fn restore(state: &AppState, actor: &Principal, id: Uuid) -> AppResult<User> {
    let store = state.store();
    let user: User = lifecycle::find_trashed(&store, id).await?;
    let target = load_target(state, id).await?;
    state.policy.authorize(actor, Action::Restore, Target::User(&target))?;
    lifecycle::restore(&store, user).await
}

/// Permanently remove a trashed user. Their jokes survive.
pub async fn purge(state: &AppState, actor: &Principal, id: Uuid) -> AppResult<Uuid> {
    let store = state.store();
    let user: User = lifecycle::find_trashed(&store, id).await?;
    let target = load_target(state, id).await?;
    state.policy.authorize(actor, Action::Purge, Target::User(&target))?;
    lifecycle::purge(&store, user).await
}

pub async fn restore_all(state: &AppState, actor: &Principal) -> AppResult<u64> {
    let filter = state.policy.user_trash_filter(actor, Action::Restore)?;
    lifecycle::restore_all::<User, _>(&state.store(), filter).await
}

pub async fn purge_all(state: &AppState, actor: &Principal) -> AppResult<u64> {
    let filter = state.policy.user_trash_filter(actor, Action::Purge)?;
    lifecycle::purge_all::<User, _>(&state.store(), filter).await
}
