use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::permissions::Permission;
use super::roles::{Role, RoleTier};
use crate::models::user::{User, UserStatus};

/// Principal represents the authenticated user together with their roles.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: Uuid,
    pub status: UserStatus,
    pub verified: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub roles: Vec<Role>,
}

impl Principal {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            status: UserStatus::Active,
            verified: true,
            deleted_at: None,
            roles: Vec::new(),
        }
    }

    pub fn from_user(user: &User, roles: Vec<Role>) -> Self {
        Self {
            user_id: user.id,
            status: user.status,
            verified: user.email_verified_at.is_some(),
            deleted_at: user.deleted_at,
            roles,
        }
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.roles = roles.into_iter().collect();
        self
    }

    pub fn with_status(mut self, status: UserStatus) -> Self {
        self.status = status;
        self
    }

    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|r| r.name == name)
    }

    pub fn has_any_role(&self, names: &[&str]) -> bool {
        names.iter().any(|name| self.has_role(name))
    }

    pub fn has_tier(&self, tier: RoleTier) -> bool {
        self.roles.iter().any(|r| r.tier() == Some(tier))
    }

    /// Holds the override role.
    pub fn is_super_admin(&self) -> bool {
        self.roles.iter().any(Role::is_override)
    }

    /// Highest fixed tier held.
    pub fn tier(&self) -> Option<RoleTier> {
        self.roles.iter().filter_map(Role::tier).max()
    }

    /// Holds at least one role and every role held is the client tier.
    pub fn is_client_only(&self) -> bool {
        !self.roles.is_empty() && self.roles.iter().all(|r| r.tier() == Some(RoleTier::Client))
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.is_super_admin() || self.roles.iter().any(|r| r.has_permission(permission))
    }

    pub fn has_any_permission(&self, permissions: &[Permission]) -> bool {
        permissions.iter().any(|p| self.has_permission(*p))
    }

    pub fn has_all_permissions(&self, permissions: &[Permission]) -> bool {
        permissions.iter().all(|p| self.has_permission(*p))
    }

    /// Union of explicit grants. The override role adds nothing here since
    /// its authority is implicit.
    pub fn granted_permissions(&self) -> BTreeSet<Permission> {
        self.roles
            .iter()
            .flat_map(|r| r.permissions.iter().copied())
            .collect()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
