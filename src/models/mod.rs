pub mod category;
pub mod joke;
pub mod rbac;
pub mod session;
pub mod user;
pub mod vote;
