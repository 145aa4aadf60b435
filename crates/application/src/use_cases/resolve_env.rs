//! Resolve stage environment use case

use shipyard_domain::environment::{ResolutionTarget, ResolvedEnv};
use shipyard_domain::{DeployGroup, DeployGroupId, StageId};
use tracing::debug;

use crate::error::ApplicationResult;
use crate::ports::{StoreError, VariableStore};
use crate::variable_resolver::ResolutionSession;

/// Resolved environments of a stage for every deploy group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageEnvironments {
    /// The resolved stage.
    pub stage: StageId,
    /// Environment without a deploy group target.
    pub common: ResolvedEnv,
    /// Environment per deploy group of the stage, ordered by deploy group id.
    pub deploy_groups: Vec<(DeployGroup, ResolvedEnv)>,
}

/// Computes the environment a deploy of a stage receives.
///
/// Resolution is not role gated.
pub struct ResolveStageEnv<S> {
    store: S,
}

impl<S: VariableStore> ResolveStageEnv<S> {
    /// Creates a new `ResolveStageEnv` use case.
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Resolves the environment of `stage`, optionally for a deploy group.
    ///
    /// Unknown stages resolve to an empty environment. The deploy group does
    /// not have to belong to the stage.
    ///
    /// # Errors
    /// Returns an error if the store fails.
    pub async fn execute(
        &self,
        stage: StageId,
        deploy_group: Option<DeployGroupId>,
    ) -> ApplicationResult<ResolvedEnv> {
        let session = ResolutionSession::open(&self.store, stage).await?;
        let target = match deploy_group {
            Some(id) => Some(self.target(id).await?),
            None => None,
        };

        let env = session.env_for(target.as_ref());
        debug!(
            stage = %stage,
            deploy_group = ?deploy_group,
            variables = env.len(),
            "resolved stage environment"
        );
        Ok(env)
    }

    /// Resolves the common environment and the environment of every deploy
    /// group of `stage` from a single session.
    ///
    /// # Errors
    /// Returns an error if the store fails.
    pub async fn execute_all(&self, stage: StageId) -> ApplicationResult<StageEnvironments> {
        let (session, deploy_groups) = tokio::try_join!(
            ResolutionSession::open(&self.store, stage),
            self.store.fetch_deploy_groups(stage),
        )?;

        let common = session.env(None);
        let deploy_groups: Vec<_> = deploy_groups
            .into_iter()
            .map(|group| {
                let env = session.env(Some(&group));
                (group, env)
            })
            .collect();

        debug!(
            stage = %stage,
            deploy_groups = deploy_groups.len(),
            "resolved all stage environments"
        );
        Ok(StageEnvironments {
            stage,
            common,
            deploy_groups,
        })
    }

    async fn target(&self, deploy_group: DeployGroupId) -> Result<ResolutionTarget, StoreError> {
        let environment = self.store.fetch_owning_environment(deploy_group).await?;
        Ok(ResolutionTarget::new(
            deploy_group,
            environment.map(|e| e.id),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::use_cases::mock::{MockRepository, deploy_group, stage};
    use pretty_assertions::assert_eq;
    use shipyard_domain::EnvironmentId;
    use shipyard_domain::environment::{Scope, VariableDraft};

    fn env(pairs: &[(&str, &str)]) -> ResolvedEnv {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn repository() -> MockRepository {
        let repo = MockRepository::new();
        let shared = repo.add_group(
            "shared",
            vec![
                VariableDraft::new("DB_HOST", "db.internal"),
                VariableDraft::new("DB_URL", "mysql://${DB_HOST}/app"),
            ],
        );
        repo.attach(shared);
        repo.add_stage_variable(VariableDraft::new("POD", "none"));
        repo.add_stage_variable(
            VariableDraft::new("POD", "$REGION-pod")
                .scoped(Scope::Environment(EnvironmentId::new(1).unwrap())),
        );
        repo.add_stage_variable(VariableDraft::new("POD", "pod-one").scoped(deploy_group(1)));
        repo.add_stage_variable(VariableDraft::new("REGION", "us"));
        repo
    }

    #[tokio::test]
    async fn test_execute_without_deploy_group() {
        let use_case = ResolveStageEnv::new(repository());

        let result = use_case.execute(stage(), None).await.unwrap();
        assert_eq!(
            result,
            env(&[
                ("DB_HOST", "db.internal"),
                ("DB_URL", "mysql://db.internal/app"),
                ("POD", "none"),
                ("REGION", "us"),
            ])
        );
    }

    #[tokio::test]
    async fn test_execute_uses_tier_fallback() {
        let use_case = ResolveStageEnv::new(repository());

        let one = use_case.execute(stage(), Some(deploy_group(1))).await.unwrap();
        let two = use_case.execute(stage(), Some(deploy_group(2))).await.unwrap();

        assert_eq!(one["POD"], "pod-one");
        assert_eq!(two["POD"], "us-pod");
    }

    #[tokio::test]
    async fn test_unknown_deploy_group_only_sees_unscoped() {
        let use_case = ResolveStageEnv::new(repository());

        let result = use_case.execute(stage(), Some(deploy_group(77))).await.unwrap();
        assert_eq!(result["POD"], "none");
    }

    #[tokio::test]
    async fn test_unknown_stage_is_empty() {
        let use_case = ResolveStageEnv::new(repository());

        let result = use_case
            .execute(StageId::new(404).unwrap(), Some(deploy_group(1)))
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_execute_all() {
        let use_case = ResolveStageEnv::new(repository());

        let all = use_case.execute_all(stage()).await.unwrap();
        assert_eq!(all.stage, stage());
        assert_eq!(all.common["POD"], "none");

        let pods: Vec<_> = all
            .deploy_groups
            .iter()
            .map(|(group, env)| (group.name.as_str(), env["POD"].as_str()))
            .collect();
        assert_eq!(pods, vec![("pod1", "pod-one"), ("pod2", "us-pod")]);
    }
}
