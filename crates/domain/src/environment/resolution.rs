//! Priority merge of stage and variable group records.
//!
//! Records compete by name. The winner is picked by, in order:
//! 1. Tier: deploy group scope > environment scope > unscoped
//! 2. Source: stage-owned > group-owned
//! 3. Position: the record encountered last in fetch order
//!
//! Scoped records that do not match the target are not candidates at all.

use std::collections::BTreeMap;

use super::scope::Scope;
use super::variable::{EnvironmentVariable, Owner};
use crate::deploy::DeployGroup;
use crate::id::{DeployGroupId, EnvironmentId};

/// Final variable name to value mapping.
pub type ResolvedEnv = BTreeMap<String, String>;

/// Priority rank of a record for a given target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    /// Unscoped record.
    Unscoped,
    /// Scoped to the target's environment.
    Environment,
    /// Scoped to the target deploy group itself.
    DeployGroup,
}

impl Tier {
    /// Returns the tier of `scope` for `target`, or `None` when the record
    /// does not apply.
    #[must_use]
    pub fn of(scope: &Scope, target: Option<&ResolutionTarget>) -> Option<Self> {
        match (scope, target) {
            (Scope::None, _) => Some(Self::Unscoped),
            (_, None) => None,
            (Scope::Environment(id), Some(target)) => {
                (target.environment == Some(*id)).then_some(Self::Environment)
            }
            (Scope::DeployGroup(id), Some(target)) => {
                (target.deploy_group == *id).then_some(Self::DeployGroup)
            }
        }
    }
}

/// Where a candidate record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Source {
    /// Owned by a variable group attached to the stage.
    Group,
    /// Owned by the stage itself.
    Stage,
}

impl From<Owner> for Source {
    fn from(owner: Owner) -> Self {
        match owner {
            Owner::Stage(_) => Self::Stage,
            Owner::Group(_) => Self::Group,
        }
    }
}

/// The deploy group a resolution is computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionTarget {
    /// Target deploy group.
    pub deploy_group: DeployGroupId,
    /// Environment owning the deploy group, if known.
    pub environment: Option<EnvironmentId>,
}

impl ResolutionTarget {
    /// Creates a target from raw ids.
    #[must_use]
    pub const fn new(deploy_group: DeployGroupId, environment: Option<EnvironmentId>) -> Self {
        Self {
            deploy_group,
            environment,
        }
    }

    /// Creates a target for a deploy group, resolving its environment.
    #[must_use]
    pub fn for_deploy_group(group: &DeployGroup) -> Self {
        Self {
            deploy_group: group.id,
            environment: Scope::DeployGroup(group.id).resolve_environment(group),
        }
    }
}

/// A winning record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVariable {
    /// Variable name.
    pub name: String,
    /// Raw value, references not yet substituted.
    pub value: String,
    /// Tier the value won with.
    pub tier: Tier,
    /// Whether the value came from the stage or a group.
    pub source: Source,
}

/// The two record sets of a stage, ready to be merged for any target.
#[derive(Debug, Clone, Copy)]
pub struct ResolutionContext<'a> {
    direct: &'a [EnvironmentVariable],
    via_groups: &'a [EnvironmentVariable],
}

impl<'a> ResolutionContext<'a> {
    /// Creates a context from stage-owned and group-owned records, each in
    /// fetch order.
    #[must_use]
    pub const fn new(
        direct: &'a [EnvironmentVariable],
        via_groups: &'a [EnvironmentVariable],
    ) -> Self {
        Self { direct, via_groups }
    }

    /// Returns true when there is nothing to resolve.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.direct.is_empty() && self.via_groups.is_empty()
    }

    /// Picks the winning record for every name.
    #[must_use]
    pub fn winners(
        &self,
        target: Option<&ResolutionTarget>,
    ) -> BTreeMap<&'a str, ResolvedVariable> {
        let mut winners: BTreeMap<&'a str, ResolvedVariable> = BTreeMap::new();

        // Group records first so that, on equal rank, a later stage record
        // replaces them; `>=` makes the last record of equal rank win.
        let (direct, via_groups) = (self.direct, self.via_groups);
        let records = via_groups
            .iter()
            .map(|record| (record, Source::Group))
            .chain(direct.iter().map(|record| (record, Source::Stage)));

        for (record, source) in records {
            let Some(tier) = Tier::of(&record.scope, target) else {
                continue;
            };

            let replace = winners
                .get(record.name.as_str())
                .is_none_or(|current| (tier, source) >= (current.tier, current.source));

            if replace {
                winners.insert(
                    record.name.as_str(),
                    ResolvedVariable {
                        name: record.name.clone(),
                        value: record.value.clone(),
                        tier,
                        source,
                    },
                );
            }
        }

        winners
    }

    /// Returns the merged mapping for a target, before reference substitution.
    #[must_use]
    pub fn resolve(&self, target: Option<&ResolutionTarget>) -> ResolvedEnv {
        self.winners(target)
            .into_values()
            .map(|winner| (winner.name, winner.value))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::id::{StageId, VariableGroupId, VariableId};
    use pretty_assertions::assert_eq;

    struct Records {
        next_id: u64,
        records: Vec<EnvironmentVariable>,
    }

    impl Records {
        const fn new() -> Self {
            Self {
                next_id: 1,
                records: Vec::new(),
            }
        }

        fn add(&mut self, owner: Owner, name: &str, value: &str, scope: Scope) -> &mut Self {
            let id = VariableId::new(self.next_id).unwrap();
            self.next_id += 1;
            self.records.push(EnvironmentVariable {
                id,
                name: name.to_string(),
                value: value.to_string(),
                scope,
                owner,
            });
            self
        }
    }

    fn stage() -> Owner {
        Owner::Stage(StageId::new(1).unwrap())
    }

    fn group(raw: u64) -> Owner {
        Owner::Group(VariableGroupId::new(raw).unwrap())
    }

    fn pod(raw: u64) -> DeployGroupId {
        DeployGroupId::new(raw).unwrap()
    }

    fn production() -> EnvironmentId {
        EnvironmentId::new(1).unwrap()
    }

    fn target(raw: u64) -> ResolutionTarget {
        ResolutionTarget::new(pod(raw), Some(production()))
    }

    fn map(pairs: &[(&str, &str)]) -> ResolvedEnv {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_tier_of() {
        let t = target(1);
        assert_eq!(Tier::of(&Scope::None, None), Some(Tier::Unscoped));
        assert_eq!(Tier::of(&Scope::None, Some(&t)), Some(Tier::Unscoped));
        assert_eq!(Tier::of(&Scope::DeployGroup(pod(1)), None), None);
        assert_eq!(Tier::of(&Scope::DeployGroup(pod(1)), Some(&t)), Some(Tier::DeployGroup));
        assert_eq!(Tier::of(&Scope::DeployGroup(pod(2)), Some(&t)), None);
        assert_eq!(Tier::of(&Scope::Environment(production()), Some(&t)), Some(Tier::Environment));
        assert_eq!(Tier::of(&Scope::Environment(EnvironmentId::new(2).unwrap()), Some(&t)), None);
    }

    #[test]
    fn test_empty_context() {
        let ctx = ResolutionContext::new(&[], &[]);
        assert!(ctx.is_empty());
        assert!(ctx.resolve(None).is_empty());
        assert!(ctx.resolve(Some(&target(1))).is_empty());
    }

    #[test]
    fn test_merges_direct_and_groups() {
        let mut direct = Records::new();
        direct.add(stage(), "X", "Y", Scope::None);
        let mut groups = Records::new();
        groups.add(group(1), "Y", "Z", Scope::None);

        let ctx = ResolutionContext::new(&direct.records, &groups.records);
        assert_eq!(ctx.resolve(None), map(&[("X", "Y"), ("Y", "Z")]));
    }

    #[test]
    fn test_stage_overrides_group_on_same_tier() {
        let mut direct = Records::new();
        direct.add(stage(), "X", "OVER", Scope::None);
        let mut groups = Records::new();
        groups.add(group(1), "X", "Y", Scope::None);

        let ctx = ResolutionContext::new(&direct.records, &groups.records);
        let winner = ctx.winners(None).remove("X").unwrap();
        assert_eq!(winner.value, "OVER");
        assert_eq!(winner.source, Source::Stage);
    }

    #[test]
    fn test_scoped_group_beats_unscoped_stage() {
        let mut direct = Records::new();
        direct.add(stage(), "X", "ALL", Scope::None);
        let mut groups = Records::new();
        groups.add(group(1), "X", "POD", Scope::DeployGroup(pod(1)));

        let ctx = ResolutionContext::new(&direct.records, &groups.records);
        assert_eq!(ctx.resolve(Some(&target(1))), map(&[("X", "POD")]));
        assert_eq!(ctx.resolve(None), map(&[("X", "ALL")]));
    }

    #[test]
    fn test_deploy_group_scope_only_for_its_target() {
        let mut direct = Records::new();
        direct.add(stage(), "ONLY_POD1", "yes", Scope::DeployGroup(pod(1)));

        let ctx = ResolutionContext::new(&direct.records, &[]);
        assert_eq!(ctx.resolve(Some(&target(1))), map(&[("ONLY_POD1", "yes")]));
        assert!(ctx.resolve(Some(&target(2))).is_empty());
        assert!(ctx.resolve(None).is_empty());
    }

    #[test]
    fn test_tier_fallback() {
        let mut direct = Records::new();
        direct
            .add(stage(), "X", "GROUP", Scope::DeployGroup(pod(1)))
            .add(stage(), "X", "ALL", Scope::None)
            .add(stage(), "X", "ENV", Scope::Environment(production()));

        let ctx = ResolutionContext::new(&direct.records, &[]);
        assert_eq!(ctx.resolve(Some(&target(1))), map(&[("X", "GROUP")]));
        assert_eq!(ctx.resolve(Some(&target(2))), map(&[("X", "ENV")]));
        let other_env = ResolutionTarget::new(pod(3), EnvironmentId::new(2));
        assert_eq!(ctx.resolve(Some(&other_env)), map(&[("X", "ALL")]));
    }

    #[test]
    fn test_keeps_order_for_different_priorities() {
        let mut groups = Records::new();
        groups
            .add(group(1), "X", "Y", Scope::None)
            .add(group(1), "Z", "A", Scope::DeployGroup(pod(1)))
            .add(group(2), "Y", "Z", Scope::None);
        let mut direct = Records::new();
        direct
            .add(stage(), "STAGE", "DEPLOY", Scope::DeployGroup(pod(1)))
            .add(stage(), "STAGE", "STAGE", Scope::None)
            .add(stage(), "STAGE", "ENV", Scope::Environment(production()))
            .add(stage(), "X", "ALL", Scope::None)
            .add(stage(), "X", "ENV", Scope::Environment(production()))
            .add(stage(), "X", "GROUP", Scope::DeployGroup(pod(1)))
            .add(stage(), "Y", "ENV", Scope::Environment(production()))
            .add(stage(), "Y", "ALL", Scope::None);

        let ctx = ResolutionContext::new(&direct.records, &groups.records);
        assert_eq!(
            ctx.resolve(Some(&target(1))),
            map(&[("STAGE", "DEPLOY"), ("X", "GROUP"), ("Y", "ENV"), ("Z", "A")])
        );
    }

    #[test]
    fn test_last_record_wins_on_full_tie() {
        let mut groups = Records::new();
        groups
            .add(group(1), "X", "first", Scope::None)
            .add(group(2), "X", "second", Scope::None);
        let mut direct = Records::new();
        direct
            .add(stage(), "Y", "first", Scope::None)
            .add(stage(), "Y", "second", Scope::None);

        let ctx = ResolutionContext::new(&direct.records, &groups.records);
        assert_eq!(ctx.resolve(None), map(&[("X", "second"), ("Y", "second")]));
    }

    #[test]
    fn test_target_for_deploy_group() {
        let group = DeployGroup::new(pod(4), "pod4", production());
        let target = ResolutionTarget::for_deploy_group(&group);
        assert_eq!(target, ResolutionTarget::new(pod(4), Some(production())));
    }
}
