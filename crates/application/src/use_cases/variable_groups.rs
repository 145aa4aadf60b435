//! Variable group use cases
//!
//! Listing and showing groups requires the deployer role; creating, changing
//! and destroying them requires admin. Variables are changed through a
//! [`VariableBatch`] that is validated in full before anything is written.

use shipyard_domain::VariableGroupId;
use shipyard_domain::environment::{VariableBatch, VariableGroup};
use tracing::{info, warn};

use crate::access::{Actor, Role};
use crate::error::{ApplicationError, ApplicationResult};
use crate::ports::{StoreError, VariableRepository};

/// Lists all variable groups.
pub struct ListVariableGroups<R> {
    repository: R,
}

impl<R: VariableRepository> ListVariableGroups<R> {
    /// Creates a new `ListVariableGroups` use case.
    pub const fn new(repository: R) -> Self {
        Self { repository }
    }

    /// Executes the use case.
    ///
    /// # Errors
    /// Returns an error if the actor is not a deployer or the store fails.
    pub async fn execute(&self, actor: &Actor) -> ApplicationResult<Vec<VariableGroup>> {
        actor.require(Role::Deployer)?;
        Ok(self.repository.list_groups().await?)
    }
}

/// Loads one variable group with its variables and stages.
pub struct ShowVariableGroup<R> {
    repository: R,
}

impl<R: VariableRepository> ShowVariableGroup<R> {
    /// Creates a new `ShowVariableGroup` use case.
    pub const fn new(repository: R) -> Self {
        Self { repository }
    }

    /// Executes the use case.
    ///
    /// # Errors
    /// Returns `ApplicationError::NotFound` for an unknown group.
    pub async fn execute(
        &self,
        actor: &Actor,
        id: VariableGroupId,
    ) -> ApplicationResult<VariableGroup> {
        actor.require(Role::Deployer)?;
        load(&self.repository, id).await
    }
}

/// Creates a variable group together with its variables.
pub struct CreateVariableGroup<R> {
    repository: R,
}

impl<R: VariableRepository> CreateVariableGroup<R> {
    /// Creates a new `CreateVariableGroup` use case.
    pub const fn new(repository: R) -> Self {
        Self { repository }
    }

    /// Executes the use case.
    ///
    /// Only create entries of `batch` are meaningful for a new group; entries
    /// with an id are rejected because the group owns no records yet.
    ///
    /// # Errors
    /// Returns `ApplicationError::Validation` with every problem of the name
    /// and the batch, in which case nothing is stored.
    pub async fn execute(
        &self,
        actor: &Actor,
        name: &str,
        batch: &VariableBatch,
    ) -> ApplicationResult<VariableGroup> {
        actor.require(Role::Admin)?;

        let group = self
            .repository
            .create_group(name, batch)
            .await
            .inspect_err(log_rejected)?;

        info!(
            actor = %actor.name,
            group = %group.id,
            variables = group.variable_count(),
            "created variable group"
        );
        Ok(group)
    }
}

/// Renames a variable group and applies a batch to its variables.
pub struct UpdateVariableGroup<R> {
    repository: R,
}

impl<R: VariableRepository> UpdateVariableGroup<R> {
    /// Creates a new `UpdateVariableGroup` use case.
    pub const fn new(repository: R) -> Self {
        Self { repository }
    }

    /// Executes the use case. The group keeps its name when `name` is `None`.
    ///
    /// # Errors
    /// Returns `ApplicationError::NotFound` for an unknown group and
    /// `ApplicationError::Validation` when the name or batch is invalid.
    pub async fn execute(
        &self,
        actor: &Actor,
        id: VariableGroupId,
        name: Option<&str>,
        batch: &VariableBatch,
    ) -> ApplicationResult<VariableGroup> {
        actor.require(Role::Admin)?;

        load(&self.repository, id).await?;
        let group = self
            .repository
            .update_group(id, name, batch)
            .await
            .inspect_err(log_rejected)?;

        info!(
            actor = %actor.name,
            group = %group.id,
            variables = group.variable_count(),
            "updated variable group"
        );
        Ok(group)
    }
}

/// Destroys a variable group, its variables and its stage attachments.
pub struct DestroyVariableGroup<R> {
    repository: R,
}

impl<R: VariableRepository> DestroyVariableGroup<R> {
    /// Creates a new `DestroyVariableGroup` use case.
    pub const fn new(repository: R) -> Self {
        Self { repository }
    }

    /// Executes the use case.
    ///
    /// # Errors
    /// Returns `ApplicationError::NotFound` for an unknown group.
    pub async fn execute(&self, actor: &Actor, id: VariableGroupId) -> ApplicationResult<()> {
        actor.require(Role::Admin)?;

        let group = load(&self.repository, id).await?;
        self.repository.delete_group(id).await?;

        info!(
            actor = %actor.name,
            group = %id,
            stages = group.stage_ids.len(),
            "destroyed variable group"
        );
        Ok(())
    }
}

async fn load<R: VariableRepository>(
    repository: &R,
    id: VariableGroupId,
) -> ApplicationResult<VariableGroup> {
    repository
        .load_group(id)
        .await?
        .ok_or_else(|| ApplicationError::NotFound(format!("variable group {id}")))
}

fn log_rejected(error: &StoreError) {
    if let StoreError::Rejected(errors) = error {
        warn!(errors = errors.errors().len(), "rejected variable group batch");
    }
}
