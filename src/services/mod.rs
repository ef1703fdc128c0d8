//! Authorized operations. Each call evaluates the policy for the acting
//! principal before touching the store; a denial leaves no trace.

pub mod auth;
pub mod categories;
pub mod jokes;
pub mod roles;
pub mod users;
pub mod votes;
