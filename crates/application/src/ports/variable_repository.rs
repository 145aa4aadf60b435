//! Variable repository port
//!
//! Write side of variable persistence, consumed by the mutation use cases.

use std::collections::BTreeSet;

use async_trait::async_trait;

use shipyard_domain::environment::{EnvironmentVariable, VariableBatch, VariableGroup};
use shipyard_domain::{Stage, StageId, VariableGroupId};

use super::variable_store::{StoreError, VariableStore};

/// Repository trait for variable groups and stage-owned variables.
///
/// Batches are applied to an owner's records as they are at commit time,
/// under the same lock as the write. Either the whole batch becomes visible
/// or none of it does; records the batch does not mention are kept.
#[async_trait]
pub trait VariableRepository: VariableStore {
    /// Lists all variable groups, ordered by id.
    async fn list_groups(&self) -> Result<Vec<VariableGroup>, StoreError>;

    /// Loads a variable group with its variables and attached stages.
    async fn load_group(&self, id: VariableGroupId) -> Result<Option<VariableGroup>, StoreError>;

    /// Creates a group whose variables are the create entries of `batch`.
    ///
    /// # Errors
    /// Returns `StoreError::Rejected` for a blank name or an invalid batch.
    async fn create_group(
        &self,
        name: &str,
        batch: &VariableBatch,
    ) -> Result<VariableGroup, StoreError>;

    /// Applies `batch` to a group's variables and renames it when `name` is
    /// given. The stored name is trimmed.
    ///
    /// # Errors
    /// Returns `StoreError::NotFound` for an unknown group and
    /// `StoreError::Rejected` for a blank name or an invalid batch.
    async fn update_group(
        &self,
        id: VariableGroupId,
        name: Option<&str>,
        batch: &VariableBatch,
    ) -> Result<VariableGroup, StoreError>;

    /// Deletes a group, its variables and its stage attachments.
    ///
    /// # Errors
    /// Returns `StoreError::NotFound` for an unknown group.
    async fn delete_group(&self, id: VariableGroupId) -> Result<(), StoreError>;

    /// Applies `batch` to the variables owned directly by a stage and returns
    /// the stage's new records.
    ///
    /// # Errors
    /// Returns `StoreError::NotFound` for an unknown stage and
    /// `StoreError::Rejected` for an invalid batch.
    async fn apply_stage_batch(
        &self,
        stage: StageId,
        batch: &VariableBatch,
    ) -> Result<Vec<EnvironmentVariable>, StoreError>;

    /// Replaces the set of variable groups attached to a stage.
    ///
    /// # Errors
    /// Returns `StoreError::NotFound` for an unknown stage or group.
    async fn assign_groups(
        &self,
        stage: StageId,
        groups: BTreeSet<VariableGroupId>,
    ) -> Result<Stage, StoreError>;

    /// Counts all variable records, stage-owned and group-owned.
    async fn count_variables(&self) -> Result<usize, StoreError>;
}

#[async_trait]
impl<R: VariableRepository + ?Sized> VariableRepository for std::sync::Arc<R> {
    async fn list_groups(&self) -> Result<Vec<VariableGroup>, StoreError> {
        (**self).list_groups().await
    }

    async fn load_group(&self, id: VariableGroupId) -> Result<Option<VariableGroup>, StoreError> {
        (**self).load_group(id).await
    }

    async fn create_group(
        &self,
        name: &str,
        batch: &VariableBatch,
    ) -> Result<VariableGroup, StoreError> {
        (**self).create_group(name, batch).await
    }

    async fn update_group(
        &self,
        id: VariableGroupId,
        name: Option<&str>,
        batch: &VariableBatch,
    ) -> Result<VariableGroup, StoreError> {
        (**self).update_group(id, name, batch).await
    }

    async fn delete_group(&self, id: VariableGroupId) -> Result<(), StoreError> {
        (**self).delete_group(id).await
    }

    async fn apply_stage_batch(
        &self,
        stage: StageId,
        batch: &VariableBatch,
    ) -> Result<Vec<EnvironmentVariable>, StoreError> {
        (**self).apply_stage_batch(stage, batch).await
    }

    async fn assign_groups(
        &self,
        stage: StageId,
        groups: BTreeSet<VariableGroupId>,
    ) -> Result<Stage, StoreError> {
        (**self).assign_groups(stage, groups).await
    }

    async fn count_variables(&self) -> Result<usize, StoreError> {
        (**self).count_variables().await
    }
}
