//! Variable groups: reusable bundles of variables shared between stages.

use serde::{Deserialize, Serialize};

use super::variable::EnvironmentVariable;
use crate::id::{StageId, VariableGroupId};

/// A named bundle of variables that can be attached to many stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableGroup {
    /// Group id.
    pub id: VariableGroupId,
    /// Display name. Not required to be unique.
    pub name: String,
    /// Variables owned by the group, in creation order.
    #[serde(default)]
    pub variables: Vec<EnvironmentVariable>,
    /// Stages the group is attached to.
    #[serde(default)]
    pub stage_ids: Vec<StageId>,
}

impl VariableGroup {
    /// Returns the number of variables in the group.
    #[must_use]
    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    /// Returns the names of the group's variables, sorted and de-duplicated.
    #[must_use]
    pub fn variable_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.variables.iter().map(|v| v.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}
