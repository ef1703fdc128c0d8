use anyhow::Context;
use anyhow::Result;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};

use jokes_core::authz::{Permission, Principal, RoleTier};
use jokes_core::db::roles;
use jokes_core::errors::AppError;
use jokes_core::models::rbac::{NewRole, RoleChanges};
use jokes_core::models::user::NewUser;
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

async fn seed_user(state: &AppState, email: &str, tier: RoleTier) -> Result<Principal> {
    let mut tx = state.pool.begin().await?;
    let role = roles::find_role_by_name(&mut tx, tier.name()).await?.context("role missing")?;
    let user = jokes_core::db::users::insert(&mut tx, &NewUser::new("Seeded", email, tier).verified()).await?;
    roles::assign_role(&mut tx, user.id, role.id).await?;
    tx.commit().await?;
    Ok(services::auth::load_principal(state, user.id).await?)
}

#[tokio::test]
async fn provisioning_twice_creates_nothing_new() -> Result<()> {
    let (_dir, state) = setup().await?;

    let again = roles::provision(&state.pool).await?;
    assert_eq!(again.permissions_created, 0);
    assert_eq!(again.roles_created, 0);
    assert_eq!(again.grants_created, 0);

    let all_roles = roles::list_roles(&state.pool).await?;
    assert_eq!(all_roles.len(), 4);
    let permissions = roles::list_permissions(&state.pool).await?;
    assert_eq!(permissions.len(), Permission::ALL.len());

    let client = all_roles.iter().find(|r| r.name == "client").context("client role")?;
    assert_eq!(client.permissions.len(), RoleTier::Client.default_permissions().len());
    let super_admin = all_roles.iter().find(|r| r.name == "super-admin").context("super-admin role")?;
    assert!(super_admin.permissions.is_empty());
    Ok(())
}

#[tokio::test]
async fn provisioning_keeps_edited_grants() -> Result<()> {
    let (_dir, state) = setup().await?;
    let admin = seed_user(&state, "admin@example.com", RoleTier::Admin).await?;

    let mut conn = state.pool.acquire().await?;
    let client = roles::find_role_by_name(&mut conn, "client").await?.context("client role")?;
    drop(conn);
    services::roles::sync_permissions(&state, &admin, client.id, &["vote"]).await?;

    roles::provision(&state.pool).await?;

    let mut conn = state.pool.acquire().await?;
    let client = roles::find_role_by_name(&mut conn, "client").await?.context("client role")?;
    assert_eq!(client.permissions.len(), 1);
    assert!(client.has_permission(Permission::Vote));
    Ok(())
}

#[tokio::test]
async fn role_names_are_unique_and_grants_must_be_provisioned() -> Result<()> {
    let (_dir, state) = setup().await?;
    let admin = seed_user(&state, "admin@example.com", RoleTier::Admin).await?;

    let moderator = services::roles::create(&state, &admin, &NewRole::new("moderator", 300)).await?;
    assert!(moderator.permissions.is_empty());

    let err = services::roles::create(&state, &admin, &NewRole::new("moderator", 301)).await.unwrap_err();
    assert!(matches!(err, AppError::DuplicateName(_)), "got {err:?}");

    let err = services::roles::grant_permissions(&state, &admin, moderator.id, &["vote", "teleport"])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::UnknownPermission(ref name) if name == "teleport"), "got {err:?}");
    let unchanged = services::roles::view(&state, &admin, moderator.id).await?;
    assert!(unchanged.permissions.is_empty());

    let granted = services::roles::grant_permissions(&state, &admin, moderator.id, &["vote", "can edit any joke"]).await?;
    assert!(granted.has_permission(Permission::Vote));
    assert!(granted.has_permission(Permission::EditAnyJoke));
    Ok(())
}

#[tokio::test]
async fn fixed_roles_cannot_be_renamed_or_deleted() -> Result<()> {
    let (_dir, state) = setup().await?;
    let admin = seed_user(&state, "admin@example.com", RoleTier::Admin).await?;
    let root = seed_user(&state, "root@example.com", RoleTier::SuperAdmin).await?;

    let mut conn = state.pool.acquire().await?;
    let staff = roles::find_role_by_name(&mut conn, "staff").await?.context("staff role")?;
    drop(conn);

    let rename = RoleChanges { name: Some("crew".into()), level: None };
    let err = services::roles::update(&state, &admin, staff.id, &rename).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)), "got {err:?}");

    let err = services::roles::delete(&state, &admin, staff.id).await.unwrap_err();
    assert!(err.is_forbidden());
    let err = services::roles::delete(&state, &root, staff.id).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)), "got {err:?}");

    let custom = services::roles::create(&state, &admin, &NewRole::new("guest", 50)).await?;
    services::roles::delete(&state, &root, custom.id).await?;
    let err = services::roles::view(&state, &admin, custom.id).await.unwrap_err();
    assert!(err.is_not_found());
    Ok(())
}

#[tokio::test]
async fn clients_cannot_see_roles() -> Result<()> {
    let (_dir, state) = setup().await?;
    let client = seed_user(&state, "client@example.com", RoleTier::Client).await?;

    let err = services::roles::list(&state, &client).await.unwrap_err();
    assert!(err.is_forbidden());
    let err = services::roles::list_permissions(&state, &client).await.unwrap_err();
    assert!(err.is_forbidden());
    Ok(())
}
