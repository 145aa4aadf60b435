//! Stage variable use cases

use std::collections::BTreeSet;

use shipyard_domain::environment::{EnvironmentVariable, VariableBatch};
use shipyard_domain::{Stage, StageId, VariableGroupId};
use tracing::{info, warn};

use crate::access::{Actor, Role};
use crate::error::{ApplicationError, ApplicationResult};
use crate::ports::{StoreError, VariableRepository};

/// Applies a batch to the variables a stage owns directly.
pub struct UpdateStageVariables<R> {
    repository: R,
}

impl<R: VariableRepository> UpdateStageVariables<R> {
    /// Creates a new `UpdateStageVariables` use case.
    pub const fn new(repository: R) -> Self {
        Self { repository }
    }

    /// Executes the use case and returns the stage's new variables.
    ///
    /// # Errors
    /// Returns `ApplicationError::NotFound` for an unknown stage and
    /// `ApplicationError::Validation` when any batch entry is invalid, in
    /// which case nothing is stored.
    pub async fn execute(
        &self,
        actor: &Actor,
        stage: StageId,
        batch: &VariableBatch,
    ) -> ApplicationResult<Vec<EnvironmentVariable>> {
        actor.require(Role::Admin)?;
        require_stage(&self.repository, stage).await?;

        let variables = self
            .repository
            .apply_stage_batch(stage, batch)
            .await
            .inspect_err(|e| {
                if let StoreError::Rejected(errors) = e {
                    warn!(
                        stage = %stage,
                        errors = errors.errors().len(),
                        "rejected stage variable batch"
                    );
                }
            })?;

        info!(
            actor = %actor.name,
            stage = %stage,
            variables = variables.len(),
            "updated stage variables"
        );
        Ok(variables)
    }
}

/// Replaces the set of variable groups attached to a stage.
pub struct AssignVariableGroups<R> {
    repository: R,
}

impl<R: VariableRepository> AssignVariableGroups<R> {
    /// Creates a new `AssignVariableGroups` use case.
    pub const fn new(repository: R) -> Self {
        Self { repository }
    }

    /// Executes the use case and returns the updated stage.
    ///
    /// # Errors
    /// Returns `ApplicationError::NotFound` for an unknown stage or group.
    pub async fn execute(
        &self,
        actor: &Actor,
        stage: StageId,
        groups: BTreeSet<VariableGroupId>,
    ) -> ApplicationResult<Stage> {
        actor.require(Role::Admin)?;
        require_stage(&self.repository, stage).await?;

        for id in &groups {
            if self.repository.load_group(*id).await?.is_none() {
                return Err(ApplicationError::NotFound(format!("variable group {id}")));
            }
        }

        let updated = self.repository.assign_groups(stage, groups).await?;
        info!(
            actor = %actor.name,
            stage = %stage,
            groups = updated.variable_group_ids.len(),
            "assigned variable groups"
        );
        Ok(updated)
    }
}

async fn require_stage<R: VariableRepository>(
    repository: &R,
    stage: StageId,
) -> ApplicationResult<Stage> {
    repository
        .fetch_stage(stage)
        .await?
        .ok_or_else(|| ApplicationError::NotFound(format!("stage {stage}")))
}
