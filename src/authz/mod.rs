//! Authorization module - Policy Engine
//!
//! Role-based permissions with:
//! - a closed permission catalog, resolved from its external names
//! - four fixed role tiers plus custom roles
//! - a single `evaluate` entry point running the super-admin override
//!   before the per-resource policies

pub mod action;
pub mod evaluator;
pub mod permissions;
pub mod policy;
pub mod principal;
pub mod registry;
pub mod roles;
pub mod side_effects;

pub use action::{Action, CategoryTarget, JokeTarget, ResourceKind, Target, UserTarget};
pub use evaluator::{Decision, DefaultPolicyEvaluator, Denial, PolicyEvaluator};
pub use permissions::Permission;
pub use principal::Principal;
pub use registry::PermissionRegistry;
pub use roles::{Role, RoleBook, RoleTier};
pub use side_effects::{derive_update_side_effects, UpdateSideEffects};
