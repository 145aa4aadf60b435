//! Deploy targets: environments, deploy groups and stages.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::id::{DeployGroupId, EnvironmentId, StageId, VariableGroupId};

/// A grouping of deploy groups, e.g. "staging" or "production".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Environment id.
    pub id: EnvironmentId,
    /// Display name.
    pub name: String,
    /// Whether deploys to this environment are production deploys.
    #[serde(default)]
    pub production: bool,
}

impl Environment {
    /// Creates a non-production environment.
    pub fn new(id: EnvironmentId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            production: false,
        }
    }
}

/// A named deployment target. Belongs to exactly one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployGroup {
    /// Deploy group id.
    pub id: DeployGroupId,
    /// Display name, also used to name env files.
    pub name: String,
    /// Owning environment.
    pub environment_id: EnvironmentId,
}

impl DeployGroup {
    /// Creates a deploy group inside an environment.
    pub fn new(id: DeployGroupId, name: impl Into<String>, environment_id: EnvironmentId) -> Self {
        Self {
            id,
            name: name.into(),
            environment_id,
        }
    }
}

/// A deployable configuration of a project.
///
/// Only the attributes needed for variable resolution are modelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    /// Stage id.
    pub id: StageId,
    /// Display name.
    pub name: String,
    /// Deploy groups this stage deploys to.
    #[serde(default)]
    pub deploy_group_ids: BTreeSet<DeployGroupId>,
    /// Variable groups attached to this stage.
    #[serde(default)]
    pub variable_group_ids: BTreeSet<VariableGroupId>,
}

impl Stage {
    /// Creates a stage without deploy groups or variable groups.
    pub fn new(id: StageId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            deploy_group_ids: BTreeSet::new(),
            variable_group_ids: BTreeSet::new(),
        }
    }

    /// Adds a deploy group.
    #[must_use]
    pub fn with_deploy_group(mut self, id: DeployGroupId) -> Self {
        self.deploy_group_ids.insert(id);
        self
    }

    /// Attaches a variable group.
    #[must_use]
    pub fn with_variable_group(mut self, id: VariableGroupId) -> Self {
        self.variable_group_ids.insert(id);
        self
    }
}
