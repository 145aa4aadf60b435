//! Resolution sessions
//!
//! A session owns the two record sets of one stage. Opening it issues the two
//! bulk fetches; every later `env` call is computed from memory, so resolving
//! a stage for any number of deploy groups costs exactly two fetches.

use shipyard_domain::environment::{
    EnvironmentVariable, ResolutionContext, ResolutionTarget, ResolvedEnv,
};
use shipyard_domain::{DeployGroup, StageId};
use tracing::debug;

use super::engine::substitute;
use crate::ports::{ResolutionSets, StoreError, VariableStore};

/// The fetched variables of one stage, resolvable for any target.
#[derive(Debug, Clone)]
pub struct ResolutionSession {
    stage: StageId,
    direct: Vec<EnvironmentVariable>,
    via_groups: Vec<EnvironmentVariable>,
}

impl ResolutionSession {
    /// Fetches the stage's own records and its groups' records through
    /// [`VariableStore::fetch_resolution_sets`].
    ///
    /// # Errors
    /// Propagates store failures unchanged.
    pub async fn open<S>(store: &S, stage: StageId) -> Result<Self, StoreError>
    where
        S: VariableStore + ?Sized,
    {
        let ResolutionSets { direct, via_groups } = store.fetch_resolution_sets(stage).await?;

        debug!(
            stage = %stage,
            direct = direct.len(),
            via_groups = via_groups.len(),
            "opened resolution session"
        );

        Ok(Self::from_records(stage, direct, via_groups))
    }

    /// Creates a session from already fetched records.
    #[must_use]
    pub const fn from_records(
        stage: StageId,
        direct: Vec<EnvironmentVariable>,
        via_groups: Vec<EnvironmentVariable>,
    ) -> Self {
        Self {
            stage,
            direct,
            via_groups,
        }
    }

    /// Returns the stage this session resolves.
    #[must_use]
    pub const fn stage(&self) -> StageId {
        self.stage
    }

    /// Returns the priority-merge view of the fetched records.
    #[must_use]
    pub fn context(&self) -> ResolutionContext<'_> {
        ResolutionContext::new(&self.direct, &self.via_groups)
    }

    /// Resolves the environment for a deploy group, or the unscoped
    /// environment when `deploy_group` is `None`.
    #[must_use]
    pub fn env(&self, deploy_group: Option<&DeployGroup>) -> ResolvedEnv {
        let target = deploy_group.map(ResolutionTarget::for_deploy_group);
        self.env_for(target.as_ref())
    }

    /// Resolves the environment for an explicit target.
    #[must_use]
    pub fn env_for(&self, target: Option<&ResolutionTarget>) -> ResolvedEnv {
        let merged = self.context().resolve(target);
        substitute(&merged)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::significant_drop_tightening
)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use shipyard_domain::environment::{KnownScopes, Owner, Scope, VariableDraft};
    use shipyard_domain::{
        DeployGroupId, Environment, EnvironmentId, Stage, VariableGroupId, VariableId,
    };
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Minimal read-only store with a bulk fetch counter.
    #[derive(Default)]
    struct MockStore {
        stages: Mutex<BTreeMap<StageId, Stage>>,
        records: Mutex<Vec<EnvironmentVariable>>,
        deploy_groups: Mutex<Vec<DeployGroup>>,
        fetches: AtomicUsize,
    }

    impl MockStore {
        fn add(&self, owner: Owner, draft: VariableDraft) {
            let mut records = self.records.lock().expect("Lock poisoned");
            let id = VariableId::new(records.len() as u64 + 1).unwrap();
            records.push(draft.persist(id, owner));
        }

        fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl VariableStore for MockStore {
        async fn fetch_stage(&self, stage: StageId) -> Result<Option<Stage>, StoreError> {
            Ok(self.stages.lock().expect("Lock poisoned").get(&stage).cloned())
        }

        async fn fetch_direct(
            &self,
            stage: StageId,
        ) -> Result<Vec<EnvironmentVariable>, StoreError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let records = self.records.lock().expect("Lock poisoned");
            Ok(records
                .iter()
                .filter(|r| r.owner == Owner::Stage(stage))
                .cloned()
                .collect())
        }

        async fn fetch_via_groups(
            &self,
            stage: StageId,
        ) -> Result<Vec<EnvironmentVariable>, StoreError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let groups = self
                .stages
                .lock()
                .expect("Lock poisoned")
                .get(&stage)
                .map(|s| s.variable_group_ids.clone())
                .unwrap_or_default();
            let records = self.records.lock().expect("Lock poisoned");
            Ok(records
                .iter()
                .filter(|r| matches!(r.owner, Owner::Group(id) if groups.contains(&id)))
                .cloned()
                .collect())
        }

        async fn fetch_deploy_group(
            &self,
            id: DeployGroupId,
        ) -> Result<Option<DeployGroup>, StoreError> {
            let groups = self.deploy_groups.lock().expect("Lock poisoned");
            Ok(groups.iter().find(|g| g.id == id).cloned())
        }

        async fn fetch_owning_environment(
            &self,
            deploy_group: DeployGroupId,
        ) -> Result<Option<Environment>, StoreError> {
            Ok(self
                .fetch_deploy_group(deploy_group)
                .await?
                .map(|g| Environment::new(g.environment_id, "production")))
        }

        async fn fetch_deploy_groups(
            &self,
            stage: StageId,
        ) -> Result<Vec<DeployGroup>, StoreError> {
            let ids = self
                .stages
                .lock()
                .expect("Lock poisoned")
                .get(&stage)
                .map(|s| s.deploy_group_ids.clone())
                .unwrap_or_default();
            let groups = self.deploy_groups.lock().expect("Lock poisoned");
            Ok(groups.iter().filter(|g| ids.contains(&g.id)).cloned().collect())
        }

        async fn fetch_known_scopes(&self) -> Result<KnownScopes, StoreError> {
            let groups = self.deploy_groups.lock().expect("Lock poisoned");
            let environments: Vec<_> = groups
                .iter()
                .map(|g| Environment::new(g.environment_id, "production"))
                .collect();
            Ok(KnownScopes::new(&environments, groups.iter()))
        }
    }

    fn stage_id() -> StageId {
        StageId::new(1).unwrap()
    }

    fn production() -> EnvironmentId {
        EnvironmentId::new(1).unwrap()
    }

    fn pod(raw: u64) -> DeployGroup {
        DeployGroup::new(DeployGroupId::new(raw).unwrap(), format!("pod{raw}"), production())
    }

    /// Stage 1 with deploy groups pod1..pod3, two variable groups G1 (X=Y,
    /// Z=A scoped to pod1) and G2 (Y=Z), and stage records STAGE=DEPLOY
    /// (pod1) and STAGE=STAGE.
    fn fixture() -> MockStore {
        let g1 = VariableGroupId::new(1).unwrap();
        let g2 = VariableGroupId::new(2).unwrap();
        let store = MockStore::default();

        let stage = Stage::new(stage_id(), "staging")
            .with_deploy_group(pod(1).id)
            .with_deploy_group(pod(2).id)
            .with_deploy_group(pod(3).id)
            .with_variable_group(g1)
            .with_variable_group(g2);
        store.stages.lock().unwrap().insert(stage_id(), stage);
        store.deploy_groups.lock().unwrap().extend([pod(1), pod(2), pod(3)]);

        store.add(Owner::Group(g1), VariableDraft::new("X", "Y"));
        store.add(Owner::Group(g1), VariableDraft::new("Z", "A").scoped(pod(1).id));
        store.add(Owner::Group(g2), VariableDraft::new("Y", "Z"));
        store.add(
            Owner::Stage(stage_id()),
            VariableDraft::new("STAGE", "DEPLOY").scoped(pod(1).id),
        );
        store.add(Owner::Stage(stage_id()), VariableDraft::new("STAGE", "STAGE"));
        store
    }

    fn map(pairs: &[(&str, &str)]) -> ResolvedEnv {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_empty_for_unknown_stage() {
        let store = MockStore::default();
        let session = ResolutionSession::open(&store, StageId::new(99).unwrap()).await.unwrap();

        assert!(session.env(None).is_empty());
        assert!(session.env(Some(&pod(123))).is_empty());
    }

    #[tokio::test]
    async fn test_unscoped_env() {
        let store = fixture();
        let session = ResolutionSession::open(&store, stage_id()).await.unwrap();

        assert_eq!(session.env(None), map(&[("STAGE", "STAGE"), ("X", "Y"), ("Y", "Z")]));
    }

    #[tokio::test]
    async fn test_deploy_group_env() {
        let store = fixture();
        let session = ResolutionSession::open(&store, stage_id()).await.unwrap();

        assert_eq!(
            session.env(Some(&pod(1))),
            map(&[("STAGE", "DEPLOY"), ("X", "Y"), ("Y", "Z"), ("Z", "A")])
        );
        assert_eq!(
            session.env(Some(&pod(2))),
            map(&[("STAGE", "STAGE"), ("X", "Y"), ("Y", "Z")])
        );
    }

    #[tokio::test]
    async fn test_stage_variables_override_groups() {
        let store = fixture();
        store.add(Owner::Stage(stage_id()), VariableDraft::new("X", "OVER"));
        let session = ResolutionSession::open(&store, stage_id()).await.unwrap();

        assert_eq!(session.env(None), map(&[("STAGE", "STAGE"), ("X", "OVER"), ("Y", "Z")]));
    }

    #[tokio::test]
    async fn test_keeps_correct_order_for_different_priorities() {
        let store = fixture();
        let stage = Owner::Stage(stage_id());
        let env_scope = Scope::Environment(production());
        store.add(stage, VariableDraft::new("STAGE", "ENV").scoped(env_scope));
        store.add(stage, VariableDraft::new("X", "ALL"));
        store.add(stage, VariableDraft::new("X", "ENV").scoped(env_scope));
        store.add(stage, VariableDraft::new("X", "GROUP").scoped(pod(1).id));
        store.add(stage, VariableDraft::new("Y", "ENV").scoped(env_scope));
        store.add(stage, VariableDraft::new("Y", "ALL"));
        let session = ResolutionSession::open(&store, stage_id()).await.unwrap();

        assert_eq!(
            session.env(Some(&pod(1))),
            map(&[("STAGE", "DEPLOY"), ("X", "GROUP"), ("Y", "ENV"), ("Z", "A")])
        );
    }

    #[tokio::test]
    async fn test_two_fetches_for_many_deploy_groups() {
        let store = fixture();
        let groups = [pod(1), pod(2), pod(3)];

        let session = ResolutionSession::open(&store, stage_id()).await.unwrap();
        let _ = session.env(None);
        for group in &groups {
            let _ = session.env(Some(group));
        }

        assert_eq!(store.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_resolves_references() {
        let store = fixture();
        {
            let mut records = store.records.lock().unwrap();
            let last = records.last_mut().unwrap();
            last.value = "STAGE--$POD_ID--$POD_ID_NOT--${POD_ID}".to_string();
        }
        store.add(Owner::Stage(stage_id()), VariableDraft::new("POD_ID", "1"));
        let session = ResolutionSession::open(&store, stage_id()).await.unwrap();

        assert_eq!(
            session.env(None),
            map(&[("POD_ID", "1"), ("STAGE", "STAGE--1--$POD_ID_NOT--1"), ("X", "Y"), ("Y", "Z")])
        );
    }
}
