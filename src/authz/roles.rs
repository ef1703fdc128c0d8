use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::permissions::Permission;
use super::registry::PermissionRegistry;
use crate::errors::{AppError, AppResult};

/// The four fixed roles, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoleTier {
    Client,
    Staff,
    Admin,
    /// The override role. Holds every permission implicitly.
    SuperAdmin,
}

impl RoleTier {
    pub const ALL: [RoleTier; 4] = [RoleTier::Client, RoleTier::Staff, RoleTier::Admin, RoleTier::SuperAdmin];

    pub fn name(self) -> &'static str {
        match self {
            RoleTier::Client => "client",
            RoleTier::Staff => "staff",
            RoleTier::Admin => "admin",
            RoleTier::SuperAdmin => "super-admin",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "client" => Some(RoleTier::Client),
            "staff" => Some(RoleTier::Staff),
            "admin" => Some(RoleTier::Admin),
            "super-admin" => Some(RoleTier::SuperAdmin),
            _ => None,
        }
    }

    pub fn default_level(self) -> i32 {
        match self {
            RoleTier::Client => 100,
            RoleTier::Staff => 500,
            RoleTier::Admin => 750,
            RoleTier::SuperAdmin => 999,
        }
    }

    /// Grants provisioned for this tier. Higher tiers repeat the lower
    /// grants they need; nothing is inherited.
    pub fn default_permissions(self) -> &'static [Permission] {
        use Permission::*;

        match self {
            RoleTier::Client => &[
                CreateJoke, ReadAnyJoke, BrowseAllJokes, SearchJoke, EditOwnJoke, DeleteOwnJoke,
                ReadAnyCategory, BrowseAllCategories, SearchAnyCategory,
                Vote, RemoveOwnVote,
                ReadOwnProfile, EditOwnProfile, DeleteOwnProfile,
            ],
            RoleTier::Staff => &[
                CreateJoke, ReadAnyJoke, BrowseAllJokes, SearchJoke, EditOwnJoke, DeleteOwnJoke,
                EditAnyJoke, DeleteAnyJoke,
                CreateCategory, ReadAnyCategory, BrowseAllCategories, SearchAnyCategory,
                EditAnyCategory, DeleteAnyCategory,
                Vote, RemoveOwnVote,
                BrowseAllUsers, ReadAnyUser, SearchAnyUser,
                CreateClientUsers, EditClientUsers, DeleteClientUsers,
                BrowseTrashedClientUsers, RestoreTrashedClientUsers, RemoveTrashedClientUsers,
                ReadOwnProfile, EditOwnProfile, DeleteOwnProfile,
            ],
            RoleTier::Admin => &[
                CreateJoke, ReadAnyJoke, BrowseAllJokes, SearchJoke, EditOwnJoke, DeleteOwnJoke,
                EditAnyJoke, DeleteAnyJoke,
                BrowseTrashedJokes, RestoreTrashedJokes, RemoveTrashedJokes,
                CreateCategory, ReadAnyCategory, BrowseAllCategories, SearchAnyCategory,
                EditAnyCategory, DeleteAnyCategory,
                BrowseTrashedCategories, RestoreTrashedCategories, RemoveTrashedCategories,
                Vote, RemoveOwnVote,
                BrowseAllUsers, ReadAnyUser, SearchAnyUser,
                CreateUser, EditClientOrStaffUsers, DeleteClientAndStaffUsers,
                BrowseTrashedUsers, RestoreTrashedUsers, RemoveTrashedUsers,
                ReadOwnProfile, EditOwnProfile, DeleteOwnProfile,
                BrowseAllRoles, SearchAnyRole, ReadAnyRole, CreateRole, EditAnyRole,
                BrowseAllPermissions, ReadAnyPermission,
            ],
            RoleTier::SuperAdmin => &[],
        }
    }
}

impl fmt::Display for RoleTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RoleTier {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoleTier::from_name(s).ok_or_else(|| AppError::validation(format!("unknown role: {s}")))
    }
}

/// A named bundle of permissions plus a rank level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub level: i32,
    pub permissions: BTreeSet<Permission>,
}

impl Role {
    pub fn new(name: impl Into<String>, level: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            level,
            permissions: BTreeSet::new(),
        }
    }

    /// Fixed tier this role stands for, if any.
    pub fn tier(&self) -> Option<RoleTier> {
        RoleTier::from_name(&self.name)
    }

    pub fn is_override(&self) -> bool {
        self.tier() == Some(RoleTier::SuperAdmin)
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    /// Add permissions. Unknown names leave the role untouched.
    pub fn grant_permissions<'a>(
        &mut self,
        registry: &PermissionRegistry,
        names: impl IntoIterator<Item = &'a str>,
    ) -> AppResult<()> {
        let resolved = registry.resolve_all(names)?;
        self.permissions.extend(resolved);
        Ok(())
    }

    /// Replace permissions. Unknown names leave the role untouched.
    pub fn sync_permissions<'a>(
        &mut self,
        registry: &PermissionRegistry,
        names: impl IntoIterator<Item = &'a str>,
    ) -> AppResult<()> {
        self.permissions = registry.resolve_all(names)?;
        Ok(())
    }
}

/// In-memory role set keyed by unique name. Provisioning builds the fixed
/// tiers here before they are written to the store.
#[derive(Debug, Clone, Default)]
pub struct RoleBook {
    roles: BTreeMap<String, Role>,
}

impl RoleBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// The four fixed roles with their default grants.
    pub fn with_defaults(registry: &PermissionRegistry) -> AppResult<Self> {
        let mut book = Self::new();
        for tier in RoleTier::ALL {
            let names: Vec<&str> = tier.default_permissions().iter().map(|p| p.name()).collect();
            let role = book.create_role(tier.name(), tier.default_level())?;
            role.sync_permissions(registry, names)?;
        }
        Ok(book)
    }

    pub fn create_role(&mut self, name: &str, level: i32) -> AppResult<&mut Role> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("role name must not be empty"));
        }
        if self.roles.contains_key(name) {
            return Err(AppError::duplicate_name(name));
        }
        Ok(self.roles.entry(name.to_string()).or_insert_with(|| Role::new(name, level)))
    }

    pub fn get(&self, name: &str) -> Option<&Role> {
        self.roles.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Role> {
        self.roles.get_mut(name)
    }

    pub fn tier(&self, tier: RoleTier) -> Option<&Role> {
        self.get(tier.name())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.roles.values()
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}
