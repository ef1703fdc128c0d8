use std::collections::BTreeSet;

use super::permissions::Permission;
use crate::errors::{AppError, AppResult};

/// The set of permissions provisioned for this deployment.
///
/// Provisioning is idempotent so setup can be replayed. Nothing is ever
/// removed at runtime.
#[derive(Debug, Clone, Default)]
pub struct PermissionRegistry {
    provisioned: BTreeSet<Permission>,
}

impl PermissionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the whole catalog.
    pub fn full() -> Self {
        let mut registry = Self::new();
        for permission in Permission::ALL {
            registry.provision(*permission);
        }
        registry
    }

    /// Returns `true` when the permission was not provisioned before.
    pub fn provision(&mut self, permission: Permission) -> bool {
        self.provisioned.insert(permission)
    }

    pub fn provision_name(&mut self, name: &str) -> AppResult<Permission> {
        let permission = Permission::from_name(name).ok_or_else(|| AppError::unknown_permission(name))?;
        self.provision(permission);
        Ok(permission)
    }

    pub fn exists(&self, name: &str) -> bool {
        Permission::from_name(name)
            .map(|p| self.provisioned.contains(&p))
            .unwrap_or(false)
    }

    pub fn contains(&self, permission: Permission) -> bool {
        self.provisioned.contains(&permission)
    }

    /// Resolve a provisioned permission by name.
    pub fn resolve(&self, name: &str) -> AppResult<Permission> {
        match Permission::from_name(name) {
            Some(p) if self.provisioned.contains(&p) => Ok(p),
            _ => Err(AppError::unknown_permission(name)),
        }
    }

    /// Resolve every name or fail on the first unknown one.
    pub fn resolve_all<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> AppResult<BTreeSet<Permission>> {
        names.into_iter().map(|name| self.resolve(name)).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        self.provisioned.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.provisioned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.provisioned.is_empty()
    }
}
