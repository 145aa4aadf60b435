//! Application use cases (business logic orchestration).

mod resolve_env;
mod stage_variables;
mod variable_groups;

#[cfg(test)]
mod mock;

pub use resolve_env::{ResolveStageEnv, StageEnvironments};
pub use stage_variables::{AssignVariableGroups, UpdateStageVariables};
pub use variable_groups::{
    CreateVariableGroup, DestroyVariableGroup, ListVariableGroups, ShowVariableGroup,
    UpdateVariableGroup,
};
