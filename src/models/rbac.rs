use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::authz::permissions::Permission;
use crate::authz::principal::Principal;
use crate::errors::{AppError, AppResult};

// =============================================================================
// ROLE
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct NewRole {
    pub name: String,
    pub level: i32,
}

impl NewRole {
    pub fn new(name: impl Into<String>, level: i32) -> Self {
        Self { name: name.into(), level }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::validation("role name must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleChanges {
    pub name: Option<String>,
    pub level: Option<i32>,
}

// =============================================================================
// PERMISSION
// =============================================================================

/// A provisioned row of the `permissions` table.
#[derive(Debug, Clone, Serialize)]
pub struct PermissionRecord {
    pub id: Uuid,
    pub permission: Permission,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// USER-ROLE ASSIGNMENT
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRole {
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// EFFECTIVE PERMISSIONS (computed)
// =============================================================================

#[derive(Debug, Serialize)]
pub struct EffectivePermissions {
    pub user_id: Uuid,
    pub roles: Vec<String>,
    /// Holds the override role; `permissions` then lists only explicit grants.
    pub is_super_admin: bool,
    pub permissions: Vec<EffectivePermission>,
}

#[derive(Debug, Serialize)]
pub struct EffectivePermission {
    pub name: Permission,
    /// Name of the role granting it
    pub role_name: String,
}

impl From<&Principal> for EffectivePermissions {
    fn from(principal: &Principal) -> Self {
        let permissions = principal
            .roles
            .iter()
            .flat_map(|role| {
                role.permissions.iter().map(move |p| EffectivePermission {
                    name: *p,
                    role_name: role.name.clone(),
                })
            })
            .collect();

        EffectivePermissions {
            user_id: principal.user_id,
            roles: principal.roles.iter().map(|r| r.name.clone()).collect(),
            is_super_admin: principal.is_super_admin(),
            permissions,
        }
    }
}
