use uuid::Uuid;

use crate::app::AppState;
use crate::authz::Principal;
use crate::db::{roles, sessions, users};
use crate::errors::{AppError, AppResult};
use crate::models::session::Session;
use crate::models::user::{User, UserStatus};

/// Load a live user with their roles. Soft-deleted users do not exist here.
pub async fn load_principal(state: &AppState, user_id: Uuid) -> AppResult<Principal> {
    let mut conn = state.pool.acquire().await?;
    let user = users::find_live(&mut conn, user_id)
        .await?
        .ok_or_else(|| AppError::unauthorized("unknown or deleted user"))?;
    let user_roles = roles::roles_for_user(&mut conn, user.id).await?;
    Ok(Principal::from_user(&user, user_roles))
}

fn status_error(status: UserStatus) -> Option<AppError> {
    match status {
        UserStatus::Active => None,
        UserStatus::Suspended => Some(AppError::forbidden_with("Please reset your password.")),
        UserStatus::Banned => Some(AppError::forbidden_with(
            "Your account is banned. Please contact an administrator.",
        )),
    }
}

/// Status gate applied to every authenticated request.
pub fn ensure_usable(principal: &Principal) -> AppResult<()> {
    if let Some(err) = status_error(principal.status) {
        return Err(err);
    }
    if !principal.verified {
        return Err(AppError::forbidden_with("Your email address is not verified."));
    }
    Ok(())
}

/// Resolve a bearer token into a usable principal.
pub async fn authenticate(state: &AppState, token: &str) -> AppResult<Principal> {
    let session = sessions::find_active(&state.pool, token)
        .await?
        .ok_or_else(|| AppError::unauthorized("invalid or revoked token"))?;
    let principal = load_principal(state, session.user_id).await?;
    ensure_usable(&principal)?;

    tracing::debug!(user_id = %principal.user_id, roles = principal.roles.len(), "authenticated");
    Ok(principal)
}

/// Record an externally issued token for `user`. Refused for deleted or
/// inactive accounts.
pub async fn establish_session(state: &AppState, user: &User, token: &str) -> AppResult<Session> {
    let principal = load_principal(state, user.id).await?;
    if let Some(err) = status_error(principal.status) {
        return Err(err);
    }

    let session = sessions::record(&state.pool, user.id, token).await?;
    tracing::info!(user_id = %user.id, session_id = %session.id, "session established");
    Ok(session)
}

/// Log out everywhere.
pub async fn revoke_sessions(state: &AppState, user_id: Uuid) -> AppResult<u64> {
    let mut conn = state.pool.acquire().await?;
    let revoked = sessions::revoke_all(&mut conn, user_id).await?;
    tracing::info!(%user_id, revoked, "sessions revoked");
    Ok(revoked)
}
