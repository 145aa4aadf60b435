//! In-memory store.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use shipyard_application::ports::{
    ResolutionSets, StoreError, VariableRepository, VariableStore,
};
use shipyard_domain::environment::{
    EnvironmentVariable, KnownScopes, Owner, VariableBatch, VariableGroup,
};
use shipyard_domain::{DeployGroup, DeployGroupId, Environment, Stage, StageId, VariableGroupId};
use tracing::debug;

use super::dataset::Dataset;

/// Store keeping its [`Dataset`] in memory.
///
/// Counts bulk fetches (`fetch_direct` and `fetch_via_groups`) so callers can
/// verify how many round trips a resolution would cost against a database.
/// `fetch_resolution_sets` counts as both, read under one lock.
#[derive(Debug, Default)]
pub struct InMemoryVariableStore {
    dataset: RwLock<Dataset>,
    bulk_fetches: AtomicUsize,
}

impl InMemoryVariableStore {
    /// Creates a store holding `dataset`.
    #[must_use]
    pub fn new(mut dataset: Dataset) -> Self {
        dataset.sync_sequences();
        Self {
            dataset: RwLock::new(dataset),
            bulk_fetches: AtomicUsize::new(0),
        }
    }

    /// Returns a copy of the current dataset.
    #[must_use]
    pub fn snapshot(&self) -> Dataset {
        self.dataset.read().clone()
    }

    /// Returns the number of bulk fetches served so far.
    #[must_use]
    pub fn bulk_fetches(&self) -> usize {
        self.bulk_fetches.load(Ordering::SeqCst)
    }

    /// Runs `change` against a copy of the dataset and keeps the copy only
    /// if `change` succeeds.
    fn commit<T>(
        &self,
        change: impl FnOnce(&mut Dataset) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut dataset = self.dataset.write();
        let mut next = dataset.clone();
        let value = change(&mut next)?;
        *dataset = next;
        Ok(value)
    }

    fn read<T>(&self, query: impl FnOnce(&Dataset) -> T) -> T {
        query(&*self.dataset.read())
    }
}

#[async_trait]
impl VariableStore for InMemoryVariableStore {
    async fn fetch_stage(&self, stage: StageId) -> Result<Option<Stage>, StoreError> {
        Ok(self.read(|d| d.stage(stage).cloned()))
    }

    async fn fetch_direct(&self, stage: StageId) -> Result<Vec<EnvironmentVariable>, StoreError> {
        self.bulk_fetches.fetch_add(1, Ordering::SeqCst);
        let records = self.read(|d| d.owned(Owner::Stage(stage)));
        debug!(stage = %stage, records = records.len(), "fetched stage variables");
        Ok(records)
    }

    async fn fetch_via_groups(
        &self,
        stage: StageId,
    ) -> Result<Vec<EnvironmentVariable>, StoreError> {
        self.bulk_fetches.fetch_add(1, Ordering::SeqCst);
        let records = self.read(|d| d.via_groups(stage));
        debug!(stage = %stage, records = records.len(), "fetched group variables");
        Ok(records)
    }

    async fn fetch_resolution_sets(&self, stage: StageId) -> Result<ResolutionSets, StoreError> {
        self.bulk_fetches.fetch_add(2, Ordering::SeqCst);
        let sets = self.read(|d| ResolutionSets {
            direct: d.owned(Owner::Stage(stage)),
            via_groups: d.via_groups(stage),
        });
        debug!(
            stage = %stage,
            direct = sets.direct.len(),
            via_groups = sets.via_groups.len(),
            "fetched resolution sets"
        );
        Ok(sets)
    }

    async fn fetch_deploy_group(
        &self,
        deploy_group: DeployGroupId,
    ) -> Result<Option<DeployGroup>, StoreError> {
        Ok(self.read(|d| d.deploy_group(deploy_group).cloned()))
    }

    async fn fetch_owning_environment(
        &self,
        deploy_group: DeployGroupId,
    ) -> Result<Option<Environment>, StoreError> {
        Ok(self.read(|d| d.owning_environment(deploy_group).cloned()))
    }

    async fn fetch_deploy_groups(&self, stage: StageId) -> Result<Vec<DeployGroup>, StoreError> {
        Ok(self.read(|d| d.deploy_groups_of(stage)))
    }

    async fn fetch_known_scopes(&self) -> Result<KnownScopes, StoreError> {
        Ok(self.read(Dataset::known_scopes))
    }
}

#[async_trait]
impl VariableRepository for InMemoryVariableStore {
    async fn list_groups(&self) -> Result<Vec<VariableGroup>, StoreError> {
        Ok(self.read(Dataset::groups))
    }

    async fn load_group(&self, id: VariableGroupId) -> Result<Option<VariableGroup>, StoreError> {
        Ok(self.read(|d| d.group(id)))
    }

    async fn create_group(
        &self,
        name: &str,
        batch: &VariableBatch,
    ) -> Result<VariableGroup, StoreError> {
        self.commit(|d| d.create_group(name, batch))
    }

    async fn update_group(
        &self,
        id: VariableGroupId,
        name: Option<&str>,
        batch: &VariableBatch,
    ) -> Result<VariableGroup, StoreError> {
        self.commit(|d| d.apply_group_batch(id, name, batch))
    }

    async fn delete_group(&self, id: VariableGroupId) -> Result<(), StoreError> {
        self.commit(|d| d.remove_group(id))
    }

    async fn apply_stage_batch(
        &self,
        stage: StageId,
        batch: &VariableBatch,
    ) -> Result<Vec<EnvironmentVariable>, StoreError> {
        self.commit(|d| d.apply_stage_batch(stage, batch))
    }

    async fn assign_groups(
        &self,
        stage: StageId,
        groups: BTreeSet<VariableGroupId>,
    ) -> Result<Stage, StoreError> {
        self.commit(|d| d.assign_groups(stage, groups))
    }

    async fn count_variables(&self) -> Result<usize, StoreError> {
        Ok(self.read(|d| d.variables.len()))
    }
}
