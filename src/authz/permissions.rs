//! Permission catalog.
//!
//! Every grantable capability is a variant of [`Permission`]. The external
//! names are the ones stored in the `permissions` table; older data may use a
//! `can ` prefix (`can create a joke`), which [`Permission::from_name`] accepts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::AppError;

const LEGACY_PREFIX: &str = "can ";

macro_rules! permission_catalog {
    ($($variant:ident => $name:literal,)+) => {
        /// A named, atomic grantable capability.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Permission {
            $($variant,)+
        }

        impl Permission {
            /// Every permission in catalog order.
            pub const ALL: &'static [Permission] = &[$(Permission::$variant,)+];

            /// Canonical external name.
            pub fn name(self) -> &'static str {
                match self {
                    $(Permission::$variant => $name,)+
                }
            }

            fn from_canonical(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(Permission::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

permission_catalog! {
    // Jokes
    CreateJoke => "create a joke",
    ReadAnyJoke => "read any joke",
    BrowseAllJokes => "browse all jokes",
    SearchJoke => "search a joke",
    EditOwnJoke => "edit own joke",
    EditAnyJoke => "edit any joke",
    DeleteOwnJoke => "delete own joke",
    DeleteAnyJoke => "delete any joke",
    BrowseTrashedJokes => "browse soft-deleted jokes",
    RestoreTrashedJokes => "restore soft-deleted jokes",
    RemoveTrashedJokes => "remove soft-deleted jokes",

    // Categories
    CreateCategory => "create a category",
    ReadAnyCategory => "read any category",
    BrowseAllCategories => "browse all categories",
    SearchAnyCategory => "search any category",
    EditAnyCategory => "edit any category",
    DeleteAnyCategory => "delete any category",
    BrowseTrashedCategories => "browse soft-deleted categories",
    RestoreTrashedCategories => "restore soft-deleted categories",
    RemoveTrashedCategories => "remove soft-deleted categories",

    // Votes
    Vote => "vote",
    RemoveOwnVote => "remove own vote",

    // Users
    BrowseAllUsers => "browse all users",
    ReadAnyUser => "read any user",
    SearchAnyUser => "search any user",
    CreateUser => "create a user",
    CreateClientAndStaffUsers => "create client and staff users only",
    CreateClientUsers => "create client users only",
    EditAdminStaffClientUsers => "edit admin, client or staff users only",
    EditClientOrStaffUsers => "edit client or staff users only",
    EditClientUsers => "edit client users only",
    DeleteClientAndStaffUsers => "delete client and staff users only",
    DeleteClientUsers => "delete client users only",
    ReadOwnProfile => "read own user profile",
    EditOwnProfile => "edit own user profile",
    DeleteOwnProfile => "delete own user profile",
    BrowseTrashedUsers => "browse soft-deleted users",
    BrowseTrashedClientUsers => "browse soft-deleted client users",
    RestoreTrashedUsers => "restore soft-deleted users",
    RestoreTrashedClientUsers => "restore soft-deleted client users",
    RemoveTrashedUsers => "remove soft-deleted users",
    RemoveTrashedClientUsers => "remove soft-deleted client users",

    // Roles and permissions
    BrowseAllRoles => "browse all roles",
    SearchAnyRole => "search any role",
    ReadAnyRole => "read any role",
    CreateRole => "create a role",
    EditAnyRole => "edit any role",
    BrowseAllPermissions => "browse all permissions",
    ReadAnyPermission => "read any permission",
}

impl Permission {
    /// Resolve an external name, accepting the legacy `can ` prefix.
    pub fn from_name(name: &str) -> Option<Self> {
        let trimmed = name.trim();
        Self::from_canonical(trimmed).or_else(|| {
            trimmed
                .strip_prefix(LEGACY_PREFIX)
                .and_then(Self::from_canonical)
        })
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Permission {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::from_name(s).ok_or_else(|| AppError::unknown_permission(s))
    }
}

impl Serialize for Permission {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Permission {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Permission::from_name(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown permission: {raw}")))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn names_are_unique_and_round_trip() {
        let names: HashSet<&str> = Permission::ALL.iter().map(|p| p.name()).collect();
        assert_eq!(names.len(), Permission::ALL.len());

        for permission in Permission::ALL {
            assert_eq!(Permission::from_name(permission.name()), Some(*permission));
        }
    }

    #[test]
    fn legacy_prefix_resolves_to_the_same_permission() {
        assert_eq!(Permission::from_name("can create a joke"), Some(Permission::CreateJoke));
        assert_eq!(Permission::from_name("  edit own joke "), Some(Permission::EditOwnJoke));
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert_eq!(Permission::from_name("fly to the moon"), None);
        let err = "can fly".parse::<Permission>().unwrap_err();
        assert!(matches!(err, AppError::UnknownPermission(_)));
    }

    #[test]
    fn serializes_as_external_name() {
        let json = serde_json::to_string(&Permission::RemoveTrashedJokes).unwrap();
        assert_eq!(json, "\"remove soft-deleted jokes\"");
        let back: Permission = serde_json::from_str("\"can vote\"").unwrap();
        assert_eq!(back, Permission::Vote);
    }
}
