use anyhow::Context;
use anyhow::Result;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};

use jokes_core::authz::{Principal, RoleTier};
use jokes_core::db::{jokes, roles, sessions, users};
use jokes_core::errors::AppError;
use jokes_core::models::joke::NewJoke;
use jokes_core::models::rbac::NewRole;
use jokes_core::models::user::{NewUser, UserChanges, UserStatus};
use jokes_core::services;
use jokes_core::{AppConfig, AppState};

async fn setup() -> Result<(TempDir, AppState)> {
    let dir = tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join("test.db");
    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
    migrator.run(&pool).await?;
    roles::provision(&pool).await?;

    let config = AppConfig::for_database(format!("sqlite://{}", db_path.display()));
    Ok((dir, AppState::new(pool, config)))
}

/// A pool with a single connection, so any path that holds one connection
/// while asking for another times out.
async fn setup_single_connection() -> Result<(TempDir, AppState)> {
    let dir = tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join("test.db");
    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(2))
        .connect_with(opts)
        .await?;

    let migrator = sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
    migrator.run(&pool).await?;
    roles::provision(&pool).await?;

    let mut config = AppConfig::for_database(format!("sqlite://{}", db_path.display()));
    config.max_connections = 1;
    config.acquire_timeout = Duration::from_secs(2);
    Ok((dir, AppState::new(pool, config)))
}

async fn seed_user(state: &AppState, email: &str, tier: RoleTier) -> Result<Principal> {
    let mut tx = state.pool.begin().await?;
    let role = roles::find_role_by_name(&mut tx, tier.name()).await?.context("role missing")?;
    let user = users::insert(&mut tx, &NewUser::new("Seeded", email, tier).verified()).await?;
    roles::assign_role(&mut tx, user.id, role.id).await?;
    tx.commit().await?;
    Ok(services::auth::load_principal(state, user.id).await?)
}

#[tokio::test]
async fn creation_is_capped_by_the_actors_grants() -> Result<()> {
    let (_dir, state) = setup().await?;
    let staff = seed_user(&state, "staff@example.com", RoleTier::Staff).await?;
    let admin = seed_user(&state, "admin@example.com", RoleTier::Admin).await?;
    let client = seed_user(&state, "client@example.com", RoleTier::Client).await?;

    let created = services::users::create(&state, &staff, &NewUser::new("Cli", "cli@example.com", RoleTier::Client)).await?;
    assert_eq!(created.status, UserStatus::Active);

    let err = services::users::create(&state, &staff, &NewUser::new("Stf", "stf@example.com", RoleTier::Staff))
        .await
        .unwrap_err();
    assert!(err.is_forbidden());

    services::users::create(&state, &admin, &NewUser::new("Adm", "adm@example.com", RoleTier::Admin)).await?;
    let err = services::users::create(&state, &admin, &NewUser::new("Root", "root@example.com", RoleTier::SuperAdmin))
        .await
        .unwrap_err();
    assert!(err.is_forbidden());

    let err = services::users::create(&state, &client, &NewUser::new("Other", "other@example.com", RoleTier::Client))
        .await
        .unwrap_err();
    assert!(err.is_forbidden());

    let err = services::users::create(&state, &admin, &NewUser::new("Dup", "cli@example.com", RoleTier::Client))
        .await
        .unwrap_err();
    assert!(err.is_conflict(), "got {err:?}");
    Ok(())
}

#[tokio::test]
async fn suspending_a_client_revokes_sessions_and_verification() -> Result<()> {
    let (_dir, state) = setup().await?;
    let admin = seed_user(&state, "admin@example.com", RoleTier::Admin).await?;
    let client = seed_user(&state, "client@example.com", RoleTier::Client).await?;

    let user = services::users::view(&state, &admin, client.user_id).await?;
    services::auth::establish_session(&state, &user, "token-one").await?;
    services::auth::establish_session(&state, &user, "token-two").await?;
    services::auth::authenticate(&state, "token-one").await?;

    let outcome = services::users::update(
        &state,
        &admin,
        client.user_id,
        &UserChanges::default().with_status(UserStatus::Suspended),
    )
    .await?;

    assert!(outcome.side_effects.revoke_tokens);
    assert!(outcome.side_effects.clear_verification);
    assert_eq!(outcome.sessions_revoked, 2);
    assert_eq!(outcome.user.status, UserStatus::Suspended);
    assert!(outcome.user.email_verified_at.is_none());

    let err = services::auth::authenticate(&state, "token-one").await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)), "got {err:?}");
    assert!(sessions::list_for_user(&state.pool, client.user_id)
        .await?
        .iter()
        .all(|s| !s.is_active()));

    let err = services::auth::establish_session(&state, &outcome.user, "token-three").await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(ref msg) if msg == "Please reset your password."), "got {err:?}");
    Ok(())
}

#[tokio::test]
async fn renaming_has_no_side_effects() -> Result<()> {
    let (_dir, state) = setup().await?;
    let staff = seed_user(&state, "staff@example.com", RoleTier::Staff).await?;
    let client = seed_user(&state, "client@example.com", RoleTier::Client).await?;

    let outcome = services::users::update(&state, &staff, client.user_id, &UserChanges::default().with_name("Renamed")).await?;
    assert!(outcome.side_effects.is_none());
    assert_eq!(outcome.sessions_revoked, 0);
    assert_eq!(outcome.user.name, "Renamed");
    assert!(outcome.user.email_verified_at.is_some());
    Ok(())
}

#[tokio::test]
async fn role_changes_stop_at_the_edit_ceiling() -> Result<()> {
    let (_dir, state) = setup().await?;
    let admin = seed_user(&state, "admin@example.com", RoleTier::Admin).await?;
    let client = seed_user(&state, "client@example.com", RoleTier::Client).await?;

    services::users::update(&state, &admin, client.user_id, &UserChanges::default().with_role(RoleTier::Staff)).await?;
    let promoted = services::auth::load_principal(&state, client.user_id).await?;
    assert_eq!(promoted.tier(), Some(RoleTier::Staff));
    assert_eq!(promoted.roles.len(), 1);

    let err = services::users::update(&state, &admin, client.user_id, &UserChanges::default().with_role(RoleTier::Admin))
        .await
        .unwrap_err();
    assert!(err.is_forbidden());
    Ok(())
}

#[tokio::test]
async fn clients_edit_their_profile_but_not_their_standing() -> Result<()> {
    let (_dir, state) = setup().await?;
    let client = seed_user(&state, "client@example.com", RoleTier::Client).await?;
    let other = seed_user(&state, "other@example.com", RoleTier::Client).await?;

    services::users::update(&state, &client, client.user_id, &UserChanges::default().with_name("Me")).await?;

    let err = services::users::update(
        &state,
        &client,
        client.user_id,
        &UserChanges::default().with_status(UserStatus::Banned),
    )
    .await
    .unwrap_err();
    assert!(err.is_forbidden());

    let err = services::users::update(&state, &client, other.user_id, &UserChanges::default().with_name("You"))
        .await
        .unwrap_err();
    assert!(err.is_forbidden());
    Ok(())
}

#[tokio::test]
async fn staff_delete_clients_only() -> Result<()> {
    let (_dir, state) = setup().await?;
    let staff = seed_user(&state, "staff@example.com", RoleTier::Staff).await?;
    let other_staff = seed_user(&state, "crew@example.com", RoleTier::Staff).await?;
    let client = seed_user(&state, "client@example.com", RoleTier::Client).await?;

    let err = services::users::delete(&state, &staff, other_staff.user_id).await.unwrap_err();
    assert!(err.is_forbidden());
    let err = services::users::delete(&state, &staff, staff.user_id).await.unwrap_err();
    assert!(err.is_forbidden());

    let trashed = services::users::delete(&state, &staff, client.user_id).await?;
    assert!(trashed.deleted_at.is_some());
    let err = services::users::view(&state, &staff, client.user_id).await.unwrap_err();
    assert!(err.is_not_found());
    Ok(())
}

#[tokio::test]
async fn super_admins_are_never_deleted() -> Result<()> {
    let (_dir, state) = setup().await?;
    let admin = seed_user(&state, "admin@example.com", RoleTier::Admin).await?;
    let root = seed_user(&state, "root@example.com", RoleTier::SuperAdmin).await?;
    let other_root = seed_user(&state, "root2@example.com", RoleTier::SuperAdmin).await?;

    let err = services::users::delete(&state, &admin, root.user_id).await.unwrap_err();
    assert!(err.is_forbidden());
    let err = services::users::delete(&state, &root, other_root.user_id).await.unwrap_err();
    assert!(err.is_forbidden());
    let err = services::users::delete(&state, &root, root.user_id).await.unwrap_err();
    assert!(err.is_forbidden());
    Ok(())
}

#[tokio::test]
async fn staff_trash_is_narrowed_to_clients() -> Result<()> {
    let (_dir, state) = setup().await?;
    let admin = seed_user(&state, "admin@example.com", RoleTier::Admin).await?;
    let staff = seed_user(&state, "staff@example.com", RoleTier::Staff).await?;
    let crew = seed_user(&state, "crew@example.com", RoleTier::Staff).await?;
    let client = seed_user(&state, "client@example.com", RoleTier::Client).await?;

    services::users::delete(&state, &admin, crew.user_id).await?;
    services::users::delete(&state, &admin, client.user_id).await?;

    let seen_by_staff = services::users::list_trashed(&state, &staff).await?;
    assert_eq!(seen_by_staff.len(), 1);
    assert_eq!(seen_by_staff[0].id, client.user_id);
    assert_eq!(services::users::list_trashed(&state, &admin).await?.len(), 2);

    let err = services::users::restore(&state, &staff, crew.user_id).await.unwrap_err();
    assert!(err.is_forbidden());

    assert_eq!(services::users::restore_all(&state, &staff).await?, 1);
    assert_eq!(services::users::list_trashed(&state, &admin).await?.len(), 1);
    services::users::view(&state, &staff, client.user_id).await?;

    let err = services::users::list_trashed(&state, &client).await.unwrap_err();
    assert!(err.is_forbidden());
    Ok(())
}

#[tokio::test]
async fn purged_users_leave_their_jokes() -> Result<()> {
    let (_dir, state) = setup().await?;
    let admin = seed_user(&state, "admin@example.com", RoleTier::Admin).await?;
    let client = seed_user(&state, "client@example.com", RoleTier::Client).await?;

    let joke = services::jokes::create(&state, &client, &NewJoke::new("Knock knock", "Who's there?")).await?;

    let err = services::users::purge(&state, &admin, client.user_id).await.unwrap_err();
    assert!(err.is_not_found(), "live users are not purged: {err:?}");

    services::users::delete(&state, &admin, client.user_id).await?;
    assert_eq!(services::users::purge(&state, &admin, client.user_id).await?, client.user_id);

    let left = jokes::list_by_owner(&state.pool, client.user_id).await?;
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].id, joke.joke.id);

    let err = services::users::restore(&state, &admin, client.user_id).await.unwrap_err();
    assert!(err.is_not_found());
    Ok(())
}

#[tokio::test]
async fn deleted_users_cannot_sign_in() -> Result<()> {
    let (_dir, state) = setup().await?;
    let admin = seed_user(&state, "admin@example.com", RoleTier::Admin).await?;
    let client = seed_user(&state, "client@example.com", RoleTier::Client).await?;
    let user = services::users::view(&state, &admin, client.user_id).await?;
    services::auth::establish_session(&state, &user, "before").await?;

    services::users::delete(&state, &admin, client.user_id).await?;

    let err = services::auth::establish_session(&state, &user, "after").await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)), "got {err:?}");
    let err = services::auth::authenticate(&state, "before").await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)), "got {err:?}");
    Ok(())
}

#[tokio::test]
async fn unverified_users_are_gated() -> Result<()> {
    let (_dir, state) = setup().await?;
    let admin = seed_user(&state, "admin@example.com", RoleTier::Admin).await?;
    let fresh = services::users::create(&state, &admin, &NewUser::new("Fresh", "fresh@example.com", RoleTier::Client)).await?;

    services::auth::establish_session(&state, &fresh, "fresh-token").await?;
    let err = services::auth::authenticate(&state, "fresh-token").await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(ref msg) if msg == "Your email address is not verified."), "got {err:?}");
    Ok(())
}

#[tokio::test]
async fn failed_update_leaves_status_and_sessions_alone() -> Result<()> {
    let (_dir, state) = setup().await?;
    let admin = seed_user(&state, "admin@example.com", RoleTier::Admin).await?;
    let client = seed_user(&state, "client@example.com", RoleTier::Client).await?;
    seed_user(&state, "taken@example.com", RoleTier::Client).await?;

    let user = services::users::view(&state, &admin, client.user_id).await?;
    services::auth::establish_session(&state, &user, "still-valid").await?;

    let changes = UserChanges {
        email: Some("taken@example.com".into()),
        ..UserChanges::default().with_status(UserStatus::Suspended)
    };
    let err = services::users::update(&state, &admin, client.user_id, &changes).await.unwrap_err();
    assert!(err.is_conflict(), "got {err:?}");

    let after = services::users::view(&state, &admin, client.user_id).await?;
    assert_eq!(after.status, UserStatus::Active);
    assert_eq!(after.email, "client@example.com");
    assert!(after.email_verified_at.is_some());
    services::auth::authenticate(&state, "still-valid").await?;
    Ok(())
}

#[tokio::test]
async fn trash_paths_work_on_a_single_connection() -> Result<()> {
    let (_dir, state) = setup_single_connection().await?;
    let admin = seed_user(&state, "admin@example.com", RoleTier::Admin).await?;
    let client = seed_user(&state, "client@example.com", RoleTier::Client).await?;

    let user = services::users::view(&state, &admin, client.user_id).await?;
    services::auth::establish_session(&state, &user, "session").await?;

    services::users::delete(&state, &admin, client.user_id).await?;
    assert!(sessions::list_for_user(&state.pool, client.user_id)
        .await?
        .iter()
        .all(|s| !s.is_active()));

    services::users::restore(&state, &admin, client.user_id).await?;
    services::users::delete(&state, &admin, client.user_id).await?;
    assert_eq!(services::users::purge(&state, &admin, client.user_id).await?, client.user_id);
    Ok(())
}

#[tokio::test]
async fn clients_with_a_custom_role_leave_the_narrow_trash() -> Result<()> {
    let (_dir, state) = setup().await?;
    let admin = seed_user(&state, "admin@example.com", RoleTier::Admin).await?;
    let staff = seed_user(&state, "staff@example.com", RoleTier::Staff).await?;
    let plain = seed_user(&state, "plain@example.com", RoleTier::Client).await?;
    let extended = seed_user(&state, "extended@example.com", RoleTier::Client).await?;

    let moderator = services::roles::create(&state, &admin, &NewRole::new("moderator", 300)).await?;
    let mut conn = state.pool.acquire().await?;
    roles::assign_role(&mut conn, extended.user_id, moderator.id).await?;
    drop(conn);

    services::users::delete(&state, &admin, plain.user_id).await?;
    services::users::delete(&state, &admin, extended.user_id).await?;

    let seen_by_staff = services::users::list_trashed(&state, &staff).await?;
    assert_eq!(seen_by_staff.len(), 1);
    assert_eq!(seen_by_staff[0].id, plain.user_id);

    let err = services::users::restore(&state, &staff, extended.user_id).await.unwrap_err();
    assert!(err.is_forbidden());
    let err = services::users::purge(&state, &staff, extended.user_id).await.unwrap_err();
    assert!(err.is_forbidden());

    assert_eq!(services::users::purge_all(&state, &staff).await?, 1);
    let left = services::users::list_trashed(&state, &admin).await?;
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].id, extended.user_id);
    Ok(())
}
