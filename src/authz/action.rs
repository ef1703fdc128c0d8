use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use super::principal::Principal;
use super::roles::{Role, RoleTier};
use crate::models::category::Category;
use crate::models::joke::Joke;
use crate::models::user::UserChanges;

/// The verb of an authorization request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Browse,
    View,
    Create,
    Update,
    Delete,
    BrowseTrash,
    Restore,
    Purge,
    /// Like or dislike.
    Vote,
    RemoveVote,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Browse => "browse",
            Action::View => "view",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::BrowseTrash => "browse_trash",
            Action::Restore => "restore",
            Action::Purge => "purge",
            Action::Vote => "vote",
            Action::RemoveVote => "remove_vote",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Joke,
    Category,
    User,
    Role,
    Permission,
}

impl ResourceKind {
    pub fn entity_type(self) -> &'static str {
        match self {
            ResourceKind::Joke => "joke",
            ResourceKind::Category => "category",
            ResourceKind::User => "user",
            ResourceKind::Role => "role",
            ResourceKind::Permission => "permission",
        }
    }
}

/// What a joke decision needs to know about the joke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JokeTarget {
    pub id: Uuid,
    pub owner_id: Uuid,
    /// Titles of the live categories the joke is attached to.
    pub categories: Vec<String>,
}

impl JokeTarget {
    pub fn new(id: Uuid, owner_id: Uuid) -> Self {
        Self { id, owner_id, categories: Vec::new() }
    }

    pub fn from_joke(joke: &Joke, categories: &[Category]) -> Self {
        Self {
            id: joke.id,
            owner_id: joke.user_id,
            categories: categories.iter().map(|c| c.title.clone()).collect(),
        }
    }

    pub fn with_categories<I, S>(mut self, titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = titles.into_iter().map(Into::into).collect();
        self
    }

    /// Attached to at least one category other than the placeholder.
    pub fn is_categorized(&self, placeholder: &str) -> bool {
        self.categories.iter().any(|title| title != placeholder)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryTarget {
    pub id: Uuid,
}

/// What a user decision needs to know about the target user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserTarget {
    pub id: Uuid,
    pub tiers: BTreeSet<RoleTier>,
    /// Holds at least one role outside the fixed tiers.
    pub custom_roles: bool,
}

impl UserTarget {
    pub fn new(id: Uuid, tiers: impl IntoIterator<Item = RoleTier>) -> Self {
        Self { id, tiers: tiers.into_iter().collect(), custom_roles: false }
    }

    pub fn from_roles(id: Uuid, roles: &[Role]) -> Self {
        Self {
            id,
            tiers: roles.iter().filter_map(Role::tier).collect(),
            custom_roles: roles.iter().any(|role| role.tier().is_none()),
        }
    }

    /// Highest fixed tier. `None` for users holding no fixed role.
    pub fn tier(&self) -> Option<RoleTier> {
        self.tiers.iter().next_back().copied()
    }

    pub fn has_tier(&self, tier: RoleTier) -> bool {
        self.tiers.contains(&tier)
    }

    /// Every held role is the client role.
    pub fn is_client_only(&self) -> bool {
        !self.custom_roles && self.tiers.len() == 1 && self.has_tier(RoleTier::Client)
    }

    pub fn is_super_admin(&self) -> bool {
        self.has_tier(RoleTier::SuperAdmin)
    }
}

impl From<&Principal> for UserTarget {
    fn from(principal: &Principal) -> Self {
        Self::from_roles(principal.user_id, &principal.roles)
    }
}

/// The resource (or resource class) an action is aimed at.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    Jokes,
    Joke(&'a JokeTarget),
    Categories,
    Category(&'a CategoryTarget),
    Users,
    /// A user about to be created with the given role.
    NewUser(RoleTier),
    User(&'a UserTarget),
    /// A user together with the change-set being applied.
    UserEdit(&'a UserTarget, &'a UserChanges),
    Roles,
    Role(&'a Role),
    Permissions,
}

impl Target<'_> {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Target::Jokes | Target::Joke(_) => ResourceKind::Joke,
            Target::Categories | Target::Category(_) => ResourceKind::Category,
            Target::Users | Target::NewUser(_) | Target::User(_) | Target::UserEdit(..) => ResourceKind::User,
            Target::Roles | Target::Role(_) => ResourceKind::Role,
            Target::Permissions => ResourceKind::Permission,
        }
    }

    pub fn id(&self) -> Option<Uuid> {
        match self {
            Target::Joke(j) => Some(j.id),
            Target::Category(c) => Some(c.id),
            Target::User(u) | Target::UserEdit(u, _) => Some(u.id),
            Target::Role(r) => Some(r.id),
            _ => None,
        }
    }
}
