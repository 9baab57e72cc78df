//! Access control for the quiz platform.
//!
//! Rules are `(subject, object, action, attribute, effect, entity)` tuples
//! kept in a [`store::PolicyStore`]; grouping edges make a subject inherit a
//! role's rules. [`Enforcer`] answers allow/deny questions and builds the
//! per-subject permission tree served to clients.

pub mod engine;
pub mod errors;
pub mod matcher;
pub mod roles;
pub mod seed;
pub mod store;
pub mod tree;
pub mod types;
pub mod web;

pub use engine::{Enforcer, EnforcerOptions};
pub use errors::AuthzError;
pub use roles::RoleResolution;
