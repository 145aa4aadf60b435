//! Shipyard Application - Use cases and ports
//!
//! This crate wires the domain model to storage through ports:
//! - `ports`: traits implemented by infrastructure adapters
//! - `variable_resolver`: reference substitution and resolution sessions
//! - `use_cases`: resolution and the role-gated mutations
//! - `access`: actors and roles checked by mutations

pub mod access;
pub mod error;
pub mod ports;
pub mod use_cases;
pub mod variable_resolver;

pub use access::{AccessError, Actor, Role, UnknownRole};
pub use error::{ApplicationError, ApplicationResult};
pub use variable_resolver::{ResolutionSession, substitute};
