//! In-memory repository shared by the use case tests.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::significant_drop_tightening
)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;

use shipyard_domain::environment::{
    EnvironmentVariable, KnownScopes, Owner, VariableBatch, VariableDraft, VariableGroup,
};
use shipyard_domain::{
    DeployGroup, DeployGroupId, Environment, EnvironmentId, Stage, StageId, VariableGroupId,
    VariableId,
};

use crate::ports::{StoreError, VariableRepository, VariableStore};

#[derive(Default)]
struct State {
    environments: Vec<Environment>,
    deploy_groups: Vec<DeployGroup>,
    stages: BTreeMap<StageId, Stage>,
    groups: BTreeMap<VariableGroupId, String>,
    variables: Vec<EnvironmentVariable>,
    last_id: u64,
}

impl State {
    fn group(&self, id: VariableGroupId) -> Option<VariableGroup> {
        let name = self.groups.get(&id)?;
        Some(VariableGroup {
            id,
            name: name.clone(),
            variables: self.owned(Owner::Group(id)),
            stage_ids: self
                .stages
                .values()
                .filter(|s| s.variable_group_ids.contains(&id))
                .map(|s| s.id)
                .collect(),
        })
    }

    fn owned(&self, owner: Owner) -> Vec<EnvironmentVariable> {
        self.variables
            .iter()
            .filter(|v| v.owner == owner)
            .cloned()
            .collect()
    }

    fn known(&self) -> KnownScopes {
        KnownScopes::new(&self.environments, &self.deploy_groups)
    }

    fn replace(&mut self, owner: Owner, drafts: Vec<VariableDraft>) -> Result<(), StoreError> {
        let existing: BTreeSet<VariableId> = self.owned(owner).iter().map(|v| v.id).collect();
        if let Some(id) = drafts
            .iter()
            .filter_map(|d| d.id)
            .find(|id| !existing.contains(id))
        {
            return Err(StoreError::Conflict(format!("variable {id}")));
        }

        self.variables.retain(|v| v.owner != owner);
        for draft in drafts {
            let id = draft.id.unwrap_or_else(|| {
                self.last_id += 1;
                VariableId::new(self.last_id).unwrap()
            });
            self.variables.push(draft.persist(id, owner));
        }
        Ok(())
    }
}

/// Repository mock with one stage (id 1), one environment (id 1) and two
/// deploy groups (ids 1 and 2).
pub struct MockRepository {
    state: Mutex<State>,
}

impl MockRepository {
    pub fn new() -> Self {
        let production = EnvironmentId::new(1).unwrap();
        let state = State {
            environments: vec![Environment::new(production, "production")],
            deploy_groups: vec![
                DeployGroup::new(deploy_group(1), "pod1", production),
                DeployGroup::new(deploy_group(2), "pod2", production),
            ],
            stages: BTreeMap::from([(
                stage(),
                Stage::new(stage(), "production")
                    .with_deploy_group(deploy_group(1))
                    .with_deploy_group(deploy_group(2)),
            )]),
            ..State::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn add_group(&self, name: &str, drafts: Vec<VariableDraft>) -> VariableGroupId {
        let mut state = self.state.lock().expect("Lock poisoned");
        let id = VariableGroupId::new(state.groups.len() as u64 + 1).unwrap();
        state.groups.insert(id, name.to_string());
        state.replace(Owner::Group(id), drafts).unwrap();
        id
    }

    pub fn attach(&self, group: VariableGroupId) {
        let mut state = self.state.lock().expect("Lock poisoned");
        let stage = state.stages.get_mut(&stage()).unwrap();
        stage.variable_group_ids.insert(group);
    }

    pub fn add_stage_variable(&self, draft: VariableDraft) -> VariableId {
        let mut state = self.state.lock().expect("Lock poisoned");
        let mut drafts: Vec<_> = state
            .owned(Owner::Stage(stage()))
            .iter()
            .map(EnvironmentVariable::to_draft)
            .collect();
        drafts.push(draft);
        state.replace(Owner::Stage(stage()), drafts).unwrap();
        VariableId::new(state.last_id).unwrap()
    }
}

pub fn stage() -> StageId {
    StageId::new(1).unwrap()
}

pub fn deploy_group(raw: u64) -> DeployGroupId {
    DeployGroupId::new(raw).unwrap()
}

#[async_trait]
impl VariableStore for MockRepository {
    async fn fetch_stage(&self, stage: StageId) -> Result<Option<Stage>, StoreError> {
        let state = self.state.lock().expect("Lock poisoned");
        Ok(state.stages.get(&stage).cloned())
    }

    async fn fetch_direct(&self, stage: StageId) -> Result<Vec<EnvironmentVariable>, StoreError> {
        let state = self.state.lock().expect("Lock poisoned");
        Ok(state.owned(Owner::Stage(stage)))
    }

    async fn fetch_via_groups(
        &self,
        stage: StageId,
    ) -> Result<Vec<EnvironmentVariable>, StoreError> {
        let state = self.state.lock().expect("Lock poisoned");
        let groups = state
            .stages
            .get(&stage)
            .map(|s| s.variable_group_ids.clone())
            .unwrap_or_default();
        Ok(groups
            .into_iter()
            .flat_map(|id| state.owned(Owner::Group(id)))
            .collect())
    }

    async fn fetch_deploy_group(
        &self,
        deploy_group: DeployGroupId,
    ) -> Result<Option<DeployGroup>, StoreError> {
        let state = self.state.lock().expect("Lock poisoned");
        Ok(state.deploy_groups.iter().find(|g| g.id == deploy_group).cloned())
    }

    async fn fetch_owning_environment(
        &self,
        deploy_group: DeployGroupId,
    ) -> Result<Option<Environment>, StoreError> {
        let state = self.state.lock().expect("Lock poisoned");
        Ok(state
            .deploy_groups
            .iter()
            .find(|g| g.id == deploy_group)
            .and_then(|g| state.environments.iter().find(|e| e.id == g.environment_id))
            .cloned())
    }

    async fn fetch_deploy_groups(&self, stage: StageId) -> Result<Vec<DeployGroup>, StoreError> {
        let state = self.state.lock().expect("Lock poisoned");
        let ids = state
            .stages
            .get(&stage)
            .map(|s| s.deploy_group_ids.clone())
            .unwrap_or_default();
        Ok(state
            .deploy_groups
            .iter()
            .filter(|g| ids.contains(&g.id))
            .cloned()
            .collect())
    }

    async fn fetch_known_scopes(&self) -> Result<KnownScopes, StoreError> {
        let state = self.state.lock().expect("Lock poisoned");
        Ok(state.known())
    }
}

#[async_trait]
impl VariableRepository for MockRepository {
    async fn list_groups(&self) -> Result<Vec<VariableGroup>, StoreError> {
        let state = self.state.lock().expect("Lock poisoned");
        Ok(state.groups.keys().filter_map(|id| state.group(*id)).collect())
    }

    async fn load_group(&self, id: VariableGroupId) -> Result<Option<VariableGroup>, StoreError> {
        let state = self.state.lock().expect("Lock poisoned");
        Ok(state.group(id))
    }

    async fn create_group(
        &self,
        name: &str,
        batch: &VariableBatch,
    ) -> Result<VariableGroup, StoreError> {
        let mut state = self.state.lock().expect("Lock poisoned");
        let drafts = batch.apply_to_group(name, &[], &state.known())?;
        let id = VariableGroupId::new(state.groups.len() as u64 + 1).unwrap();
        state.groups.insert(id, name.trim().to_string());
        state.replace(Owner::Group(id), drafts)?;
        Ok(state.group(id).unwrap())
    }

    async fn update_group(
        &self,
        id: VariableGroupId,
        name: Option<&str>,
        batch: &VariableBatch,
    ) -> Result<VariableGroup, StoreError> {
        let mut state = self.state.lock().expect("Lock poisoned");
        let current = state
            .group(id)
            .ok_or_else(|| StoreError::NotFound(format!("variable group {id}")))?;
        let name = name.unwrap_or(&current.name);
        let drafts = batch.apply_to_group(name, &current.variables, &state.known())?;
        state.replace(Owner::Group(id), drafts)?;
        state.groups.insert(id, name.trim().to_string());
        Ok(state.group(id).unwrap())
    }

    async fn delete_group(&self, id: VariableGroupId) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("Lock poisoned");
        if state.groups.remove(&id).is_none() {
            return Err(StoreError::NotFound(format!("variable group {id}")));
        }
        state.variables.retain(|v| v.owner != Owner::Group(id));
        for stage in state.stages.values_mut() {
            stage.variable_group_ids.remove(&id);
        }
        Ok(())
    }

    async fn apply_stage_batch(
        &self,
        stage: StageId,
        batch: &VariableBatch,
    ) -> Result<Vec<EnvironmentVariable>, StoreError> {
        let mut state = self.state.lock().expect("Lock poisoned");
        if !state.stages.contains_key(&stage) {
            return Err(StoreError::NotFound(format!("stage {stage}")));
        }
        let owner = Owner::Stage(stage);
        let drafts = batch.apply(&state.owned(owner), &state.known())?;
        state.replace(owner, drafts)?;
        Ok(state.owned(owner))
    }

    async fn assign_groups(
        &self,
        stage: StageId,
        groups: BTreeSet<VariableGroupId>,
    ) -> Result<Stage, StoreError> {
        let mut state = self.state.lock().expect("Lock poisoned");
        if let Some(id) = groups.iter().find(|id| !state.groups.contains_key(*id)) {
            return Err(StoreError::NotFound(format!("variable group {id}")));
        }
        let entry = state
            .stages
            .get_mut(&stage)
            .ok_or_else(|| StoreError::NotFound(format!("stage {stage}")))?;
        entry.variable_group_ids = groups;
        Ok(entry.clone())
    }

    async fn count_variables(&self) -> Result<usize, StoreError> {
        let state = self.state.lock().expect("Lock poisoned");
        Ok(state.variables.len())
    }
}
