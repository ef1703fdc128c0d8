use std::collections::BTreeMap;

use chrono::Utc;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::row_parsers::{permission_from_row, role_from_row};
use super::timestamp;
use crate::authz::permissions::Permission;
use crate::authz::registry::PermissionRegistry;
use crate::authz::roles::{Role, RoleBook};
use crate::errors::{AppError, AppResult};
use crate::models::rbac::{NewRole, PermissionRecord, RoleChanges};

const ROLE_WITH_PERMISSIONS: &str = "SELECT r.id, r.name, r.level, p.name AS permission \
     FROM roles r \
     LEFT JOIN role_permissions rp ON rp.role_id = r.id \
     LEFT JOIN permissions p ON p.id = rp.permission_id";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProvisionReport {
    pub permissions_created: u64,
    pub roles_created: u64,
    pub grants_created: u64,
}

/// Group `ROLE_WITH_PERMISSIONS` rows into roles, keeping row order.
fn fold_roles(rows: &[SqliteRow]) -> AppResult<Vec<Role>> {
    let mut roles: Vec<Role> = Vec::new();
    for row in rows {
        let role = role_from_row(row)?;
        if roles.last().map(|r| r.id) != Some(role.id) {
            roles.push(role);
        }

        let name: Option<String> = row.try_get("permission")?;
        if let (Some(name), Some(current)) = (name, roles.last_mut()) {
            match Permission::from_name(&name) {
                Some(permission) => {
                    current.permissions.insert(permission);
                }
                None => tracing::warn!(role = %current.name, permission = %name, "ignoring unknown stored permission"),
            }
        }
    }
    Ok(roles)
}

/// Provisioned permissions keyed to their row ids.
async fn permission_ids(conn: &mut SqliteConnection) -> AppResult<BTreeMap<Permission, String>> {
    let rows = sqlx::query("SELECT id, name FROM permissions").fetch_all(&mut *conn).await?;
    let mut ids = BTreeMap::new();
    for row in &rows {
        let name: String = row.try_get("name")?;
        if let Some(permission) = Permission::from_name(&name) {
            ids.insert(permission, row.try_get::<String, _>("id")?);
        }
    }
    Ok(ids)
}

pub async fn registry(conn: &mut SqliteConnection) -> AppResult<PermissionRegistry> {
    let ids = permission_ids(conn).await?;
    let mut registry = PermissionRegistry::new();
    for permission in ids.into_keys() {
        registry.provision(permission);
    }
    Ok(registry)
}

async fn insert_permission(conn: &mut SqliteConnection, permission: Permission) -> AppResult<bool> {
    let existing = permission_ids(conn).await?;
    if existing.contains_key(&permission) {
        return Ok(false);
    }
    let result = sqlx::query("INSERT INTO permissions (id, name, created_at) VALUES (?, ?, ?) ON CONFLICT(name) DO NOTHING")
        .bind(Uuid::new_v4().to_string())
        .bind(permission.name())
        .bind(timestamp(Utc::now()))
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Provision one catalog permission by name. Idempotent.
pub async fn provision_permission(pool: &SqlitePool, name: &str) -> AppResult<Permission> {
    let permission: Permission = name.parse()?;
    let mut conn = pool.acquire().await?;
    if insert_permission(&mut conn, permission).await? {
        tracing::info!(%permission, "permission provisioned");
    }
    Ok(permission)
}

/// Seed the permission catalog and the fixed roles. Safe to run repeatedly:
/// existing permissions and roles are left alone, and default grants are
/// only written for roles this call creates.
pub async fn provision(pool: &SqlitePool) -> AppResult<ProvisionReport> {
    let mut report = ProvisionReport::default();
    let mut tx = pool.begin().await?;

    for permission in Permission::ALL {
        if insert_permission(&mut tx, *permission).await? {
            report.permissions_created += 1;
        }
    }

    let ids = permission_ids(&mut tx).await?;
    let book = RoleBook::with_defaults(&PermissionRegistry::full())?;
    let now = timestamp(Utc::now());

    for role in book.iter() {
        let created = sqlx::query(
            "INSERT INTO roles (id, name, level, created_at, updated_at) VALUES (?, ?, ?, ?, ?) ON CONFLICT(name) DO NOTHING",
        )
        .bind(role.id.to_string())
        .bind(&role.name)
        .bind(role.level)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
        if created.rows_affected() == 0 {
            continue;
        }
        report.roles_created += 1;

        for permission in &role.permissions {
            let Some(permission_id) = ids.get(permission) else {
                continue;
            };
            report.grants_created += sqlx::query("INSERT OR IGNORE INTO role_permissions (role_id, permission_id) VALUES (?, ?)")
                .bind(role.id.to_string())
                .bind(permission_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
    }

    tx.commit().await?;
    tracing::info!(
        permissions = report.permissions_created,
        roles = report.roles_created,
        grants = report.grants_created,
        "provisioning complete"
    );
    Ok(report)
}

pub async fn list_permissions(pool: &SqlitePool) -> AppResult<Vec<PermissionRecord>> {
    let rows = sqlx::query("SELECT id, name, created_at FROM permissions ORDER BY name")
        .fetch_all(pool)
        .await?;
    rows.iter().map(permission_from_row).collect()
}

pub async fn find_permission(pool: &SqlitePool, id: Uuid) -> AppResult<Option<PermissionRecord>> {
    let row = sqlx::query("SELECT id, name, created_at FROM permissions WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(permission_from_row).transpose()
}

pub async fn list_roles(pool: &SqlitePool) -> AppResult<Vec<Role>> {
    let sql = format!("{} ORDER BY r.level, r.name, r.id", ROLE_WITH_PERMISSIONS);
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    fold_roles(&rows)
}

pub async fn find_role(conn: &mut SqliteConnection, id: Uuid) -> AppResult<Option<Role>> {
    let sql = format!("{} WHERE r.id = ?", ROLE_WITH_PERMISSIONS);
    let rows = sqlx::query(&sql).bind(id.to_string()).fetch_all(&mut *conn).await?;
    Ok(fold_roles(&rows)?.into_iter().next())
}

pub async fn find_role_by_name(conn: &mut SqliteConnection, name: &str) -> AppResult<Option<Role>> {
    let sql = format!("{} WHERE r.name = ?", ROLE_WITH_PERMISSIONS);
    let rows = sqlx::query(&sql).bind(name.trim()).fetch_all(&mut *conn).await?;
    Ok(fold_roles(&rows)?.into_iter().next())
}

pub async fn create_role(pool: &SqlitePool, new: &NewRole) -> AppResult<Role> {
    new.validate()?;
    let role = Role::new(new.name.trim(), new.level);
    let now = timestamp(Utc::now());

    sqlx::query("INSERT INTO roles (id, name, level, created_at, updated_at) VALUES (?, ?, ?, ?, ?)")
        .bind(role.id.to_string())
        .bind(&role.name)
        .bind(role.level)
        .bind(&now)
        .bind(&now)
        .execute(pool)
        .await
        .map_err(|err| {
            if AppError::is_unique_violation(&err) {
                AppError::duplicate_name(&role.name)
            } else {
                err.into()
            }
        })?;

    tracing::info!(role = %role.name, level = role.level, "role created");
    Ok(role)
}

pub async fn update_role(pool: &SqlitePool, id: Uuid, changes: &RoleChanges) -> AppResult<Role> {
    let mut conn = pool.acquire().await?;
    let mut role = find_role(&mut conn, id)
        .await?
        .ok_or_else(|| AppError::not_found("role not found"))?;

    if let Some(name) = &changes.name {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("role name must not be empty"));
        }
        if role.tier().is_some() && name != role.name {
            return Err(AppError::validation(format!("the {} role cannot be renamed", role.name)));
        }
        role.name = name.to_string();
    }
    if let Some(level) = changes.level {
        role.level = level;
    }

    sqlx::query("UPDATE roles SET name = ?, level = ?, updated_at = ? WHERE id = ?")
        .bind(&role.name)
        .bind(role.level)
        .bind(timestamp(Utc::now()))
        .bind(id.to_string())
        .execute(&mut *conn)
        .await
        .map_err(|err| {
            if AppError::is_unique_violation(&err) {
                AppError::duplicate_name(&role.name)
            } else {
                err.into()
            }
        })?;

    Ok(role)
}

pub async fn delete_role(pool: &SqlitePool, id: Uuid) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM roles WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() == 1)
}

async fn write_permissions(conn: &mut SqliteConnection, role: &Role) -> AppResult<()> {
    let ids = permission_ids(conn).await?;

    sqlx::query("DELETE FROM role_permissions WHERE role_id = ?")
        .bind(role.id.to_string())
        .execute(&mut *conn)
        .await?;

    for permission in &role.permissions {
        let permission_id = ids
            .get(permission)
            .ok_or_else(|| AppError::unknown_permission(permission.name()))?;
        sqlx::query("INSERT INTO role_permissions (role_id, permission_id) VALUES (?, ?)")
            .bind(role.id.to_string())
            .bind(permission_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Add provisioned permissions to a role. Any unknown name fails the whole
/// call and the role keeps its previous grants.
pub async fn grant_permissions(pool: &SqlitePool, role_id: Uuid, names: &[&str]) -> AppResult<Role> {
    let mut tx = pool.begin().await?;
    let registry = registry(&mut tx).await?;
    let mut role = find_role(&mut tx, role_id)
        .await?
        .ok_or_else(|| AppError::not_found("role not found"))?;

    role.grant_permissions(&registry, names.iter().copied())?;
    write_permissions(&mut tx, &role).await?;
    tx.commit().await?;

    tracing::info!(role = %role.name, granted = names.len(), "permissions granted");
    Ok(role)
}

/// Replace a role's permissions. Same failure behaviour as
/// [`grant_permissions`].
pub async fn sync_permissions(pool: &SqlitePool, role_id: Uuid, names: &[&str]) -> AppResult<Role> {
    let mut tx = pool.begin().await?;
    let registry = registry(&mut tx).await?;
    let mut role = find_role(&mut tx, role_id)
        .await?
        .ok_or_else(|| AppError::not_found("role not found"))?;

    role.sync_permissions(&registry, names.iter().copied())?;
    write_permissions(&mut tx, &role).await?;
    tx.commit().await?;

    tracing::info!(role = %role.name, permissions = role.permissions.len(), "permissions synced");
    Ok(role)
}

pub async fn roles_for_user(conn: &mut SqliteConnection, user_id: Uuid) -> AppResult<Vec<Role>> {
    let sql = format!(
        "{} JOIN user_roles ur ON ur.role_id = r.id WHERE ur.user_id = ? ORDER BY r.level, r.name, r.id",
        ROLE_WITH_PERMISSIONS
    );
    let rows = sqlx::query(&sql).bind(user_id.to_string()).fetch_all(&mut *conn).await?;
    fold_roles(&rows)
}

/// Give a user one more role. Returns false if they already held it.
pub async fn assign_role(conn: &mut SqliteConnection, user_id: Uuid, role_id: Uuid) -> AppResult<bool> {
    let result = sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role_id, created_at) VALUES (?, ?, ?)")
        .bind(user_id.to_string())
        .bind(role_id.to_string())
        .bind(timestamp(Utc::now()))
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Make `role_id` the user's only role.
pub async fn replace_roles(conn: &mut SqliteConnection, user_id: Uuid, role_id: Uuid) -> AppResult<()> {
    sqlx::query("DELETE FROM user_roles WHERE user_id = ?")
        .bind(user_id.to_string())
        .execute(&mut *conn)
        .await?;
    assign_role(conn, user_id, role_id).await?;
    Ok(())
}
