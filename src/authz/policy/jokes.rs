use crate::authz::action::{Action, Target};
use crate::authz::evaluator::{Decision, Denial};
use crate::authz::permissions::Permission;
use crate::authz::principal::Principal;

pub fn check(actor: &Principal, action: Action, target: Target<'_>, placeholder: &str) -> Decision {
    match (action, target) {
        (Action::Browse, Target::Jokes) => Decision::allow_if(
            actor.has_all_permissions(&[Permission::BrowseAllJokes, Permission::SearchJoke]),
        ),
        (Action::Create, Target::Jokes) => Decision::allow_if(actor.has_permission(Permission::CreateJoke)),
        (Action::View, Target::Joke(joke)) => {
            if !actor.has_permission(Permission::ReadAnyJoke) {
                Decision::Deny(Denial::Forbidden)
            } else if actor.is_client_only() && !joke.is_categorized(placeholder) {
                Decision::Deny(Denial::NotFound)
            } else {
                Decision::Allow
            }
        }
        (Action::Update, Target::Joke(joke)) => {
            let owns = joke.owner_id == actor.user_id;
            Decision::allow_if(
                (owns && actor.has_permission(Permission::EditOwnJoke))
                    || actor.has_permission(Permission::EditAnyJoke),
            )
        }
        (Action::Delete, Target::Joke(joke)) => {
            let owns = joke.owner_id == actor.user_id;
            Decision::allow_if(
                (owns && actor.has_permission(Permission::DeleteOwnJoke))
                    || actor.has_permission(Permission::DeleteAnyJoke),
            )
        }
        (Action::BrowseTrash, Target::Jokes) => {
            Decision::allow_if(actor.has_permission(Permission::BrowseTrashedJokes))
        }
        (Action::Restore, Target::Jokes | Target::Joke(_)) => {
            Decision::allow_if(actor.has_permission(Permission::RestoreTrashedJokes))
        }
        (Action::Purge, Target::Jokes | Target::Joke(_)) => {
            Decision::allow_if(actor.has_permission(Permission::RemoveTrashedJokes))
        }
        (Action::Vote, Target::Joke(_)) => Decision::allow_if(actor.has_permission(Permission::Vote)),
        (Action::RemoveVote, Target::Joke(_)) => {
            Decision::allow_if(actor.has_permission(Permission::RemoveOwnVote))
        }
        _ => Decision::Deny(Denial::Forbidden),
    }
}
