//! Variable store port
//!
//! Read side of variable persistence, consumed by resolution.

use async_trait::async_trait;

use shipyard_domain::environment::{EnvironmentVariable, KnownScopes};
use shipyard_domain::{DeployGroup, DeployGroupId, Environment, Stage, StageId, ValidationErrors};

/// Errors that can occur while talking to a store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Entity not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A commit referenced records that changed since they were read.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A batch was invalid against the records at commit time.
    #[error(transparent)]
    Rejected(#[from] ValidationErrors),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Stored data is inconsistent.
    #[error("Invalid data: {0}")]
    Invalid(String),
}

/// The two record sets a resolution is computed from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionSets {
    /// Records owned directly by the stage.
    pub direct: Vec<EnvironmentVariable>,
    /// Records of every variable group attached to the stage.
    pub via_groups: Vec<EnvironmentVariable>,
}

/// Read access to stages, deploy groups and variables.
///
/// `fetch_direct` and `fetch_via_groups` are the two bulk fetches of a
/// resolution. Each call must return all matching records at once, in a
/// stable order (creation order for direct records, group id then creation
/// order for group records).
#[async_trait]
pub trait VariableStore: Send + Sync {
    /// Loads a stage.
    async fn fetch_stage(&self, stage: StageId) -> Result<Option<Stage>, StoreError>;

    /// Loads all records owned directly by `stage`.
    ///
    /// Unknown stages have no records.
    async fn fetch_direct(&self, stage: StageId) -> Result<Vec<EnvironmentVariable>, StoreError>;

    /// Loads all records owned by every variable group attached to `stage`.
    ///
    /// Unknown stages have no records.
    async fn fetch_via_groups(
        &self,
        stage: StageId,
    ) -> Result<Vec<EnvironmentVariable>, StoreError>;

    /// Runs both bulk fetches for `stage`.
    ///
    /// The default issues them concurrently. Stores holding the records
    /// behind one lock override it to read both sets from the same snapshot.
    async fn fetch_resolution_sets(&self, stage: StageId) -> Result<ResolutionSets, StoreError> {
        let (direct, via_groups) =
            tokio::try_join!(self.fetch_direct(stage), self.fetch_via_groups(stage))?;
        Ok(ResolutionSets { direct, via_groups })
    }

    /// Loads a deploy group.
    async fn fetch_deploy_group(
        &self,
        deploy_group: DeployGroupId,
    ) -> Result<Option<DeployGroup>, StoreError>;

    /// Loads the environment owning `deploy_group`.
    async fn fetch_owning_environment(
        &self,
        deploy_group: DeployGroupId,
    ) -> Result<Option<Environment>, StoreError>;

    /// Loads the deploy groups of `stage`, ordered by id.
    async fn fetch_deploy_groups(&self, stage: StageId) -> Result<Vec<DeployGroup>, StoreError>;

    /// Loads the set of environments and deploy groups that can be scoped to.
    async fn fetch_known_scopes(&self) -> Result<KnownScopes, StoreError>;
}

#[async_trait]
impl<S: VariableStore + ?Sized> VariableStore for std::sync::Arc<S> {
    async fn fetch_stage(&self, stage: StageId) -> Result<Option<Stage>, StoreError> {
        (**self).fetch_stage(stage).await
    }

    async fn fetch_direct(&self, stage: StageId) -> Result<Vec<EnvironmentVariable>, StoreError> {
        (**self).fetch_direct(stage).await
    }

    async fn fetch_via_groups(
        &self,
        stage: StageId,
    ) -> Result<Vec<EnvironmentVariable>, StoreError> {
        (**self).fetch_via_groups(stage).await
    }

    async fn fetch_resolution_sets(&self, stage: StageId) -> Result<ResolutionSets, StoreError> {
        (**self).fetch_resolution_sets(stage).await
    }

    async fn fetch_deploy_group(
        &self,
        deploy_group: DeployGroupId,
    ) -> Result<Option<DeployGroup>, StoreError> {
        (**self).fetch_deploy_group(deploy_group).await
    }

    async fn fetch_owning_environment(
        &self,
        deploy_group: DeployGroupId,
    ) -> Result<Option<Environment>, StoreError> {
        (**self).fetch_owning_environment(deploy_group).await
    }

    async fn fetch_deploy_groups(&self, stage: StageId) -> Result<Vec<DeployGroup>, StoreError> {
        (**self).fetch_deploy_groups(stage).await
    }

    async fn fetch_known_scopes(&self) -> Result<KnownScopes, StoreError> {
        (**self).fetch_known_scopes().await
    }
}
