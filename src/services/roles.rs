use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{Action, PolicyEvaluator, Principal, Role, Target};
use crate::db::roles;
use crate::errors::{AppError, AppResult};
use crate::models::rbac::{NewRole, PermissionRecord, RoleChanges};

async fn find(state: &AppState, id: Uuid) -> AppResult<Role> {
    let mut conn = state.pool.acquire().await?;
    roles::find_role(&mut conn, id)
        .await?
        .ok_or_else(|| AppError::not_found("role not found"))
}

pub async fn list(state: &AppState, actor: &Principal) -> AppResult<Vec<Role>> {
    state.policy.authorize(actor, Action::Browse, Target::Roles)?;
    roles::list_roles(&state.pool).await
}

pub async fn view(state: &AppState, actor: &Principal, id: Uuid) -> AppResult<Role> {
    let role = find(state, id).await?;
    state.policy.authorize(actor, Action::View, Target::Role(&role))?;
    Ok(role)
}

pub async fn create(state: &AppState, actor: &Principal, new: &NewRole) -> AppResult<Role> {
    state.policy.authorize(actor, Action::Create, Target::Roles)?;
    roles::create_role(&state.pool, new).await
}

pub async fn update(state: &AppState, actor: &Principal, id: Uuid, changes: &RoleChanges) -> AppResult<Role> {
    let role = find(state, id).await?;
    state.policy.authorize(actor, Action::Update, Target::Role(&role))?;
    roles::update_role(&state.pool, id, changes).await
}

/// Only the override role passes the policy. The four fixed roles are
/// never deleted.
pub async fn delete(state: &AppState, actor: &Principal, id: Uuid) -> AppResult<()> {
    let role = find(state, id).await?;
    state.policy.authorize(actor, Action::Delete, Target::Role(&role))?;
    if role.tier().is_some() {
        return Err(AppError::validation(format!("the {} role cannot be deleted", role.name)));
    }

    if !roles::delete_role(&state.pool, id).await? {
        return Err(AppError::not_found("role not found"));
    }
    tracing::info!(role = %role.name, actor = %actor.user_id, "role deleted");
    Ok(())
}

pub async fn grant_permissions(state: &AppState, actor: &Principal, id: Uuid, names: &[&str]) -> AppResult<Role> {
    let role = find(state, id).await?;
    state.policy.authorize(actor, Action::Update, Target::Role(&role))?;
    roles::grant_permissions(&state.pool, id, names).await
}

pub async fn sync_permissions(state: &AppState, actor: &Principal, id: Uuid, names: &[&str]) -> AppResult<Role> {
    let role = find(state, id).await?;
    state.policy.authorize(actor, Action::Update, Target::Role(&role))?;
    roles::sync_permissions(&state.pool, id, names).await
}

pub async fn list_permissions(state: &AppState, actor: &Principal) -> AppResult<Vec<PermissionRecord>> {
    state.policy.authorize(actor, Action::Browse, Target::Permissions)?;
    roles::list_permissions(&state.pool).await
}

pub async fn view_permission(state: &AppState, actor: &Principal, id: Uuid) -> AppResult<PermissionRecord> {
    state.policy.authorize(actor, Action::View, Target::Permissions)?;
    roles::find_permission(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("permission not found"))
}
