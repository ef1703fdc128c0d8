use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::authz::roles::RoleTier;
use crate::errors::AppError;
use crate::lifecycle::SoftDeletable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Suspended,
    Banned,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Suspended => "suspended",
            UserStatus::Banned => "banned",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, UserStatus::Active)
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(UserStatus::Active),
            "suspended" => Ok(UserStatus::Suspended),
            "banned" => Ok(UserStatus::Banned),
            other => Err(AppError::validation(format!(
                "status can either be active, suspended or banned, got {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub status: UserStatus,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_verified(&self) -> bool {
        self.email_verified_at.is_some()
    }
}

impl SoftDeletable for User {
    fn entity_type() -> &'static str { "user" }
    fn id(&self) -> Uuid { self.id }
    fn deleted_at(&self) -> Option<DateTime<Utc>> { self.deleted_at }
    fn set_deleted_at(&mut self, at: Option<DateTime<Utc>>) { self.deleted_at = at; }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: RoleTier,
    #[serde(default)]
    pub status: Option<UserStatus>,
    #[serde(default)]
    pub email_verified_at: Option<DateTime<Utc>>,
}

impl NewUser {
    pub fn new(name: impl Into<String>, email: impl Into<String>, role: RoleTier) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            role,
            status: None,
            email_verified_at: None,
        }
    }

    pub fn verified(mut self) -> Self {
        self.email_verified_at = Some(Utc::now());
        self
    }
}

/// Change-set for a user update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<RoleTier>,
    pub status: Option<UserStatus>,
}

impl UserChanges {
    pub fn with_status(mut self, status: UserStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_role(mut self, role: RoleTier) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Touches fields a user may not change on their own account.
    pub fn touches_privileged_fields(&self) -> bool {
        self.role.is_some() || self.status.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.role.is_none() && self.status.is_none()
    }
}
