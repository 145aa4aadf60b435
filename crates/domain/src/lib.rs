//! Shipyard Domain - Core business types
//!
//! This crate defines the domain model for deploy environment variables:
//! stages, deploy groups, scoped variables, variable groups and the priority
//! merge that turns them into a stage's environment.
//! All types here are pure Rust with no I/O dependencies.

pub mod deploy;
pub mod environment;
pub mod error;
pub mod id;

pub use deploy::{DeployGroup, Environment, Stage};
pub use error::{DomainError, DomainResult, FieldError, ValidationErrors};
pub use id::{DeployGroupId, EnvironmentId, StageId, VariableGroupId, VariableId};
