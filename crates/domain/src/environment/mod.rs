//! Environment variables, their scopes and the priority merge.

mod batch;
mod group;
mod resolution;
mod scope;
mod variable;

pub use batch::{
    GROUP_RECORD, SCOPE_FIELD, VariableAttributes, VariableBatch, VariableInstruction,
};
pub use group::VariableGroup;
pub use resolution::{
    ResolutionContext, ResolutionTarget, ResolvedEnv, ResolvedVariable, Source, Tier,
};
pub use scope::{EnvironmentLookup, KnownScopes, Scope};
pub use variable::{EnvironmentVariable, Owner, VariableDraft};
