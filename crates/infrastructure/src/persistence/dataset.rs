//! Serializable snapshot of everything the stores hold.
//!
//! Both stores keep one `Dataset` and implement the ports on top of it.
//! Mutations run against a clone that replaces the original only when the
//! whole change succeeded. Batches are applied to the records held by the
//! dataset being changed, never to an earlier read.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shipyard_application::ports::StoreError;
use shipyard_domain::environment::{
    EnvironmentVariable, KnownScopes, Owner, VariableBatch, VariableDraft, VariableGroup,
};
use shipyard_domain::{
    DeployGroup, DeployGroupId, Environment, Stage, StageId, VariableGroupId, VariableId,
};

/// A variable group as stored; variables and stages are linked by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredGroup {
    /// Group id.
    pub id: VariableGroupId,
    /// Display name.
    pub name: String,
}

/// Last ids handed out, so deleted ids are never reused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequences {
    /// Last variable id.
    #[serde(default)]
    pub variable: u64,
    /// Last variable group id.
    #[serde(default)]
    pub variable_group: u64,
}

/// All stages, deploy groups, environments, variable groups and variables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    /// Environments, ordered by id.
    #[serde(default)]
    pub environments: Vec<Environment>,
    /// Deploy groups, ordered by id.
    #[serde(default)]
    pub deploy_groups: Vec<DeployGroup>,
    /// Stages, ordered by id.
    #[serde(default)]
    pub stages: Vec<Stage>,
    /// Variable groups, ordered by id.
    #[serde(default)]
    pub variable_groups: Vec<StoredGroup>,
    /// Variable records in creation order.
    #[serde(default)]
    pub variables: Vec<EnvironmentVariable>,
    /// Id sequences.
    #[serde(default)]
    pub sequences: Sequences,
    /// Number of commits so far.
    #[serde(default)]
    pub revision: u64,
    /// When the dataset was last committed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Dataset {
    /// Creates an empty dataset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an environment, builder style.
    #[must_use]
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environments.push(environment);
        self.environments.sort_by_key(|e| e.id);
        self
    }

    /// Adds a deploy group, builder style.
    #[must_use]
    pub fn with_deploy_group(mut self, deploy_group: DeployGroup) -> Self {
        self.deploy_groups.push(deploy_group);
        self.deploy_groups.sort_by_key(|g| g.id);
        self
    }

    /// Adds a stage, builder style.
    #[must_use]
    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self.stages.sort_by_key(|s| s.id);
        self
    }

    /// Checks that every reference between records points at an existing
    /// record and that variable ids are unique.
    ///
    /// # Errors
    /// Returns `StoreError::Invalid` describing the first broken reference.
    pub fn check(&self) -> Result<(), StoreError> {
        let environments: BTreeSet<_> = self.environments.iter().map(|e| e.id).collect();
        let deploy_groups: BTreeSet<_> = self.deploy_groups.iter().map(|g| g.id).collect();
        let stages: BTreeSet<_> = self.stages.iter().map(|s| s.id).collect();
        let groups: BTreeSet<_> = self.variable_groups.iter().map(|g| g.id).collect();

        for group in &self.deploy_groups {
            if !environments.contains(&group.environment_id) {
                return Err(invalid(format!(
                    "deploy group {} references unknown environment {}",
                    group.id, group.environment_id
                )));
            }
        }

        for stage in &self.stages {
            if let Some(id) = stage
                .deploy_group_ids
                .iter()
                .find(|id| !deploy_groups.contains(*id))
            {
                return Err(invalid(format!(
                    "stage {} references unknown deploy group {id}",
                    stage.id
                )));
            }
            if let Some(id) = stage
                .variable_group_ids
                .iter()
                .find(|id| !groups.contains(*id))
            {
                return Err(invalid(format!(
                    "stage {} references unknown variable group {id}",
                    stage.id
                )));
            }
        }

        let known = self.known_scopes();
        let mut ids = BTreeSet::new();
        for variable in &self.variables {
            let owner_exists = match variable.owner {
                Owner::Stage(id) => stages.contains(&id),
                Owner::Group(id) => groups.contains(&id),
            };
            if !owner_exists {
                return Err(invalid(format!("variable {} has no owner", variable.id)));
            }
            if !known.contains(&variable.scope) {
                return Err(invalid(format!(
                    "variable {} is scoped to unknown {}",
                    variable.id, variable.scope
                )));
            }
            if !ids.insert(variable.id) {
                return Err(invalid(format!("variable id {} is used twice", variable.id)));
            }
        }

        Ok(())
    }

    /// Moves the sequences past every stored id, for hand-edited files.
    pub fn sync_sequences(&mut self) {
        let last_variable = self.variables.iter().map(|v| v.id.get()).max().unwrap_or(0);
        let last_group = self.variable_groups.iter().map(|g| g.id.get()).max().unwrap_or(0);
        self.sequences.variable = self.sequences.variable.max(last_variable);
        self.sequences.variable_group = self.sequences.variable_group.max(last_group);
    }

    /// Returns a stage.
    #[must_use]
    pub fn stage(&self, id: StageId) -> Option<&Stage> {
        self.stages.iter().find(|s| s.id == id)
    }

    /// Returns a deploy group.
    #[must_use]
    pub fn deploy_group(&self, id: DeployGroupId) -> Option<&DeployGroup> {
        self.deploy_groups.iter().find(|g| g.id == id)
    }

    /// Returns the environment owning a deploy group.
    #[must_use]
    pub fn owning_environment(&self, id: DeployGroupId) -> Option<&Environment> {
        let group = self.deploy_group(id)?;
        self.environments.iter().find(|e| e.id == group.environment_id)
    }

    /// Returns the deploy groups of a stage, ordered by id.
    #[must_use]
    pub fn deploy_groups_of(&self, stage: StageId) -> Vec<DeployGroup> {
        let Some(stage) = self.stage(stage) else {
            return Vec::new();
        };
        self.deploy_groups
            .iter()
            .filter(|g| stage.deploy_group_ids.contains(&g.id))
            .cloned()
            .collect()
    }

    /// Returns every valid scope target.
    #[must_use]
    pub fn known_scopes(&self) -> KnownScopes {
        KnownScopes::new(&self.environments, &self.deploy_groups)
    }

    /// Returns the records of one owner in creation order.
    #[must_use]
    pub fn owned(&self, owner: Owner) -> Vec<EnvironmentVariable> {
        self.variables
            .iter()
            .filter(|v| v.owner == owner)
            .cloned()
            .collect()
    }

    /// Returns the records of every variable group of a stage, by group id
    /// and then creation order.
    #[must_use]
    pub fn via_groups(&self, stage: StageId) -> Vec<EnvironmentVariable> {
        let Some(stage) = self.stage(stage) else {
            return Vec::new();
        };
        stage
            .variable_group_ids
            .iter()
            .flat_map(|id| self.owned(Owner::Group(*id)))
            .collect()
    }

    /// Returns a variable group with its variables and stages.
    #[must_use]
    pub fn group(&self, id: VariableGroupId) -> Option<VariableGroup> {
        let stored = self.variable_groups.iter().find(|g| g.id == id)?;
        Some(VariableGroup {
            id,
            name: stored.name.clone(),
            variables: self.owned(Owner::Group(id)),
            stage_ids: self
                .stages
                .iter()
                .filter(|s| s.variable_group_ids.contains(&id))
                .map(|s| s.id)
                .collect(),
        })
    }

    /// Returns all variable groups, ordered by id.
    #[must_use]
    pub fn groups(&self) -> Vec<VariableGroup> {
        self.variable_groups
            .iter()
            .filter_map(|g| self.group(g.id))
            .collect()
    }

    /// Applies a batch to the records a stage owns directly.
    ///
    /// # Errors
    /// Returns `StoreError::NotFound` for an unknown stage and
    /// `StoreError::Rejected` for an invalid batch.
    pub fn apply_stage_batch(
        &mut self,
        stage: StageId,
        batch: &VariableBatch,
    ) -> Result<Vec<EnvironmentVariable>, StoreError> {
        self.require_stage(stage)?;
        let owner = Owner::Stage(stage);
        let drafts = batch.apply(&self.owned(owner), &self.known_scopes())?;
        self.replace_owned(owner, drafts)
    }

    /// Creates a variable group from the create entries of a batch.
    ///
    /// # Errors
    /// Returns `StoreError::Rejected` for a blank name or an invalid batch.
    pub fn create_group(
        &mut self,
        name: &str,
        batch: &VariableBatch,
    ) -> Result<VariableGroup, StoreError> {
        let drafts = batch.apply_to_group(name, &[], &self.known_scopes())?;
        self.insert_group(name.trim(), drafts)
    }

    /// Applies a batch to a variable group and renames it when `name` is
    /// given.
    ///
    /// # Errors
    /// Returns `StoreError::NotFound` for an unknown group and
    /// `StoreError::Rejected` for a blank name or an invalid batch.
    pub fn apply_group_batch(
        &mut self,
        id: VariableGroupId,
        name: Option<&str>,
        batch: &VariableBatch,
    ) -> Result<VariableGroup, StoreError> {
        let current = self.group(id).ok_or_else(|| not_found_group(id))?;
        let name = name.unwrap_or(&current.name);
        let drafts = batch.apply_to_group(name, &current.variables, &self.known_scopes())?;
        self.update_group(id, name.trim(), drafts)
    }

    /// Replaces the whole record list of `owner` with `drafts`, in order.
    fn replace_owned(
        &mut self,
        owner: Owner,
        drafts: Vec<VariableDraft>,
    ) -> Result<Vec<EnvironmentVariable>, StoreError> {
        let existing: BTreeSet<VariableId> = self
            .variables
            .iter()
            .filter(|v| v.owner == owner)
            .map(|v| v.id)
            .collect();
        let known = self.known_scopes();

        for draft in &drafts {
            if let Some(id) = draft.id.filter(|id| !existing.contains(id)) {
                return Err(StoreError::Conflict(format!(
                    "variable {id} does not belong to {}",
                    describe(owner)
                )));
            }
            if !known.contains(&draft.scope) {
                return Err(StoreError::Conflict(format!("scope {} does not exist", draft.scope)));
            }
        }

        self.variables.retain(|v| v.owner != owner);
        for draft in drafts {
            let id = match draft.id {
                Some(id) => id,
                None => self.next_variable_id()?,
            };
            self.variables.push(draft.persist(id, owner));
        }
        Ok(self.owned(owner))
    }

    fn insert_group(
        &mut self,
        name: &str,
        drafts: Vec<VariableDraft>,
    ) -> Result<VariableGroup, StoreError> {
        if let Some(id) = drafts.iter().find_map(|d| d.id) {
            return Err(StoreError::Conflict(format!(
                "variable {id} does not belong to a new group"
            )));
        }

        self.sequences.variable_group += 1;
        let id = VariableGroupId::new(self.sequences.variable_group)
            .ok_or_else(|| invalid("variable group sequence overflowed"))?;
        self.variable_groups.push(StoredGroup {
            id,
            name: name.to_string(),
        });
        self.replace_owned(Owner::Group(id), drafts)?;
        self.group(id).ok_or_else(|| not_found_group(id))
    }

    fn update_group(
        &mut self,
        id: VariableGroupId,
        name: &str,
        drafts: Vec<VariableDraft>,
    ) -> Result<VariableGroup, StoreError> {
        let stored = self
            .variable_groups
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or_else(|| not_found_group(id))?;
        stored.name = name.to_string();
        self.replace_owned(Owner::Group(id), drafts)?;
        self.group(id).ok_or_else(|| not_found_group(id))
    }

    /// Removes a variable group, its records and its stage attachments.
    ///
    /// # Errors
    /// Returns `StoreError::NotFound` for an unknown group.
    pub fn remove_group(&mut self, id: VariableGroupId) -> Result<(), StoreError> {
        let before = self.variable_groups.len();
        self.variable_groups.retain(|g| g.id != id);
        if self.variable_groups.len() == before {
            return Err(not_found_group(id));
        }

        self.variables.retain(|v| v.owner != Owner::Group(id));
        for stage in &mut self.stages {
            stage.variable_group_ids.remove(&id);
        }
        Ok(())
    }

    /// Replaces the set of variable groups attached to a stage.
    ///
    /// # Errors
    /// Returns `StoreError::NotFound` for an unknown stage or group.
    pub fn assign_groups(
        &mut self,
        stage: StageId,
        groups: BTreeSet<VariableGroupId>,
    ) -> Result<Stage, StoreError> {
        if let Some(id) = groups
            .iter()
            .find(|id| !self.variable_groups.iter().any(|g| g.id == **id))
        {
            return Err(not_found_group(*id));
        }

        let entry = self
            .stages
            .iter_mut()
            .find(|s| s.id == stage)
            .ok_or_else(|| StoreError::NotFound(format!("stage {stage}")))?;
        entry.variable_group_ids = groups;
        Ok(entry.clone())
    }

    fn require_stage(&self, stage: StageId) -> Result<&Stage, StoreError> {
        self.stage(stage)
            .ok_or_else(|| StoreError::NotFound(format!("stage {stage}")))
    }

    fn next_variable_id(&mut self) -> Result<VariableId, StoreError> {
        self.sequences.variable += 1;
        VariableId::new(self.sequences.variable)
            .ok_or_else(|| invalid("variable sequence overflowed"))
    }
}

fn describe(owner: Owner) -> String {
    match owner {
        Owner::Stage(id) => format!("stage {id}"),
        Owner::Group(id) => format!("variable group {id}"),
    }
}

fn not_found_group(id: VariableGroupId) -> StoreError {
    StoreError::NotFound(format!("variable group {id}"))
}

fn invalid(message: impl Into<String>) -> StoreError {
    StoreError::Invalid(message.into())
}
