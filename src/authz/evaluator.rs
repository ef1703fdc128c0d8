use serde::Serialize;

use super::action::{Action, Target};
use super::policy;
use super::principal::Principal;
use crate::errors::{AppError, AppResult};
use crate::lifecycle::TrashFilter;

pub const DEFAULT_PLACEHOLDER_CATEGORY: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Denial {
    Forbidden,
    /// The target is hidden from this actor.
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "decision", content = "reason")]
pub enum Decision {
    Allow,
    Deny(Denial),
}

impl Decision {
    pub fn allow_if(allowed: bool) -> Self {
        if allowed {
            Decision::Allow
        } else {
            Decision::Deny(Denial::Forbidden)
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn into_result(self, target: &Target<'_>) -> AppResult<()> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(Denial::Forbidden) => Err(AppError::forbidden()),
            Decision::Deny(Denial::NotFound) => Err(AppError::not_found(format!(
                "{} not found",
                target.kind().entity_type()
            ))),
        }
    }
}

/// Policy evaluator trait for pluggable authorization logic
pub trait PolicyEvaluator: Send + Sync {
    fn evaluate(&self, actor: &Principal, action: Action, target: Target<'_>) -> Decision;

    /// [`evaluate`](Self::evaluate) folded into the crate's error type.
    fn authorize(&self, actor: &Principal, action: Action, target: Target<'_>) -> AppResult<()> {
        self.evaluate(actor, action, target).into_result(&target)
    }
}

/// Default evaluator: the override role first, then the policy of the
/// target's resource kind.
#[derive(Debug, Clone)]
pub struct DefaultPolicyEvaluator {
    placeholder_category: String,
}

impl Default for DefaultPolicyEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_PLACEHOLDER_CATEGORY)
    }
}

impl DefaultPolicyEvaluator {
    pub fn new(placeholder_category: impl Into<String>) -> Self {
        Self { placeholder_category: placeholder_category.into() }
    }

    pub fn placeholder_category(&self) -> &str {
        &self.placeholder_category
    }

    /// Authorize a user-trash action and return the filter the actor's
    /// grants confine it to.
    pub fn user_trash_filter(&self, actor: &Principal, action: Action) -> AppResult<TrashFilter> {
        self.authorize(actor, action, Target::Users)?;
        Ok(policy::users::trash_filter(actor, action))
    }
}

impl PolicyEvaluator for DefaultPolicyEvaluator {
    fn evaluate(&self, actor: &Principal, action: Action, target: Target<'_>) -> Decision {
        let kind = target.kind();

        if actor.is_super_admin() {
            tracing::debug!(
                user_id = %actor.user_id,
                %action,
                target = kind.entity_type(),
                target_id = ?target.id(),
                "super_admin bypass"
            );
            return Decision::Allow;
        }

        let decision = match target {
            Target::Jokes | Target::Joke(_) => {
                policy::jokes::check(actor, action, target, &self.placeholder_category)
            }
            Target::Categories | Target::Category(_) => policy::categories::check(actor, action, target),
            Target::Users | Target::NewUser(_) | Target::User(_) | Target::UserEdit(..) => {
                policy::users::check(actor, action, target)
            }
            Target::Roles | Target::Role(_) | Target::Permissions => policy::roles::check(actor, action, target),
        };

        tracing::debug!(
            user_id = %actor.user_id,
            %action,
            target = kind.entity_type(),
            target_id = ?target.id(),
            ?decision,
            "policy decision"
        );
        if !decision.is_allowed() && !matches!(action, Action::Browse | Action::View | Action::BrowseTrash) {
            tracing::warn!(
                user_id = %actor.user_id,
                %action,
                target = kind.entity_type(),
                target_id = ?target.id(),
                "mutation denied"
            );
        }
        decision
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::authz::action::{JokeTarget, UserTarget};
    use crate::authz::registry::PermissionRegistry;
    use crate::authz::roles::{Role, RoleBook, RoleTier};

    fn actor(tiers: &[RoleTier]) -> Principal {
        let book = RoleBook::with_defaults(&PermissionRegistry::full()).unwrap();
        Principal::new(Uuid::new_v4()).with_roles(tiers.iter().map(|t| book.tier(*t).unwrap().clone()))
    }

    #[test]
    fn super_admin_is_allowed_everything() {
        let evaluator = DefaultPolicyEvaluator::default();
        let admin = actor(&[RoleTier::SuperAdmin]);
        let joke = JokeTarget::new(Uuid::new_v4(), Uuid::new_v4());
        let role = Role::new("editor", 300);
        let other = UserTarget::new(Uuid::new_v4(), [RoleTier::SuperAdmin]);

        let targets = [
            Target::Jokes,
            Target::Joke(&joke),
            Target::Categories,
            Target::Users,
            Target::NewUser(RoleTier::SuperAdmin),
            Target::User(&other),
            Target::Roles,
            Target::Role(&role),
            Target::Permissions,
        ];
        let actions = [
            Action::Browse,
            Action::View,
            Action::Create,
            Action::Update,
            Action::Delete,
            Action::BrowseTrash,
            Action::Restore,
            Action::Purge,
            Action::Vote,
            Action::RemoveVote,
        ];
        for target in targets {
            for action in actions {
                assert_eq!(evaluator.evaluate(&admin, action, target), Decision::Allow);
            }
        }
    }

    #[test]
    fn authorize_maps_denials_to_errors() {
        let evaluator = DefaultPolicyEvaluator::default();
        let nobody = Principal::new(Uuid::new_v4());

        let err = evaluator.authorize(&nobody, Action::Create, Target::Jokes).unwrap_err();
        assert!(err.is_forbidden());
        assert_eq!(err.to_string(), crate::errors::FORBIDDEN_MESSAGE);

        let hidden = JokeTarget::new(Uuid::new_v4(), Uuid::new_v4());
        let client = actor(&[RoleTier::Client]);
        let err = evaluator.authorize(&client, Action::View, Target::Joke(&hidden)).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn unknown_combinations_deny() {
        let evaluator = DefaultPolicyEvaluator::default();
        let admin = actor(&[RoleTier::Admin]);
        assert!(!evaluator.evaluate(&admin, Action::Vote, Target::Users).is_allowed());
        assert!(!evaluator.evaluate(&admin, Action::Purge, Target::Permissions).is_allowed());
    }

    #[test]
    fn user_trash_filter_follows_grants() {
        let evaluator = DefaultPolicyEvaluator::default();
        let staff = actor(&[RoleTier::Staff]);
        let admin = actor(&[RoleTier::Admin]);
        let client = actor(&[RoleTier::Client]);

        assert_eq!(
            evaluator.user_trash_filter(&staff, Action::BrowseTrash).unwrap(),
            TrashFilter::ClientUsersOnly
        );
        assert_eq!(evaluator.user_trash_filter(&admin, Action::Purge).unwrap(), TrashFilter::All);
        assert!(evaluator.user_trash_filter(&client, Action::Restore).unwrap_err().is_forbidden());
    }
}
