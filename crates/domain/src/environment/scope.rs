//! Variable scopes and their `"<Kind>-<id>"` token format.
//!
//! The token format is what forms submit and what existing records store, so
//! parsing and formatting must round-trip exactly:
//!
//! ```
//! use shipyard_domain::environment::Scope;
//!
//! let scope: Scope = "DeployGroup-42".parse().unwrap();
//! assert_eq!(scope.to_string(), "DeployGroup-42");
//! assert!("Stage-1".parse::<Scope>().is_err());
//! assert_eq!(Scope::parse("").unwrap(), Scope::None);
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::deploy::{DeployGroup, Environment};
use crate::error::{DomainError, DomainResult};
use crate::id::{DeployGroupId, EnvironmentId};

const ENVIRONMENT: &str = "Environment";
const DEPLOY_GROUP: &str = "DeployGroup";

/// Where a variable applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Scope {
    /// No restriction.
    #[default]
    None,
    /// Restricted to one environment.
    Environment(EnvironmentId),
    /// Restricted to one deploy group.
    DeployGroup(DeployGroupId),
}

impl Scope {
    /// Parses a scope token.
    ///
    /// Blank tokens mean "no scope".
    ///
    /// # Errors
    /// Returns `DomainError::InvalidScope` when the type segment is not
    /// `Environment` or `DeployGroup`, or the id segment is not a positive
    /// integer.
    pub fn parse(token: &str) -> DomainResult<Self> {
        if token.trim().is_empty() {
            return Ok(Self::None);
        }

        let invalid = || DomainError::InvalidScope(token.to_string());
        let (kind, id) = token.split_once('-').ok_or_else(invalid)?;

        match kind {
            ENVIRONMENT => id.parse().map(Self::Environment).map_err(|_| invalid()),
            DEPLOY_GROUP => id.parse().map(Self::DeployGroup).map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }

    /// Parses an optional token, treating an absent token as no scope.
    ///
    /// # Errors
    /// See [`Scope::parse`].
    pub fn parse_optional(token: Option<&str>) -> DomainResult<Self> {
        token.map_or(Ok(Self::None), Self::parse)
    }

    /// Formats the scope as its token. `Scope::None` formats as `""`.
    #[must_use]
    pub fn token(&self) -> String {
        self.to_string()
    }

    /// Returns true for the unrestricted scope.
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Returns the environment this scope applies to.
    ///
    /// A deploy group scope resolves through `lookup` to its owning
    /// environment, an environment scope is its own environment.
    pub fn resolve_environment<L>(&self, lookup: &L) -> Option<EnvironmentId>
    where
        L: EnvironmentLookup + ?Sized,
    {
        match *self {
            Self::None => None,
            Self::Environment(id) => Some(id),
            Self::DeployGroup(id) => lookup.environment_of(id),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => Ok(()),
            Self::Environment(id) => write!(f, "{ENVIRONMENT}-{id}"),
            Self::DeployGroup(id) => write!(f, "{DEPLOY_GROUP}-{id}"),
        }
    }
}

impl FromStr for Scope {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<EnvironmentId> for Scope {
    fn from(id: EnvironmentId) -> Self {
        Self::Environment(id)
    }
}

impl From<DeployGroupId> for Scope {
    fn from(id: DeployGroupId) -> Self {
        Self::DeployGroup(id)
    }
}

impl Serialize for Scope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Scope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = Option::<String>::deserialize(deserializer)?;
        Self::parse_optional(token.as_deref()).map_err(serde::de::Error::custom)
    }
}

/// Maps deploy groups to their owning environment.
pub trait EnvironmentLookup {
    /// Returns the environment owning `deploy_group`, if known.
    fn environment_of(&self, deploy_group: DeployGroupId) -> Option<EnvironmentId>;
}

impl EnvironmentLookup for DeployGroup {
    fn environment_of(&self, deploy_group: DeployGroupId) -> Option<EnvironmentId> {
        (self.id == deploy_group).then_some(self.environment_id)
    }
}

impl EnvironmentLookup for [DeployGroup] {
    fn environment_of(&self, deploy_group: DeployGroupId) -> Option<EnvironmentId> {
        self.iter()
            .find(|group| group.id == deploy_group)
            .map(|group| group.environment_id)
    }
}

impl EnvironmentLookup for BTreeMap<DeployGroupId, DeployGroup> {
    fn environment_of(&self, deploy_group: DeployGroupId) -> Option<EnvironmentId> {
        self.get(&deploy_group).map(|group| group.environment_id)
    }
}

/// The set of scope targets that currently exist.
///
/// Used to reject records scoped to deleted or never-created entities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownScopes {
    environments: BTreeSet<EnvironmentId>,
    deploy_groups: BTreeSet<DeployGroupId>,
}

impl KnownScopes {
    /// Builds the catalog from existing environments and deploy groups.
    pub fn new<'a>(
        environments: impl IntoIterator<Item = &'a Environment>,
        deploy_groups: impl IntoIterator<Item = &'a DeployGroup>,
    ) -> Self {
        Self {
            environments: environments.into_iter().map(|e| e.id).collect(),
            deploy_groups: deploy_groups.into_iter().map(|g| g.id).collect(),
        }
    }

    /// Returns true if the scope's target exists. `Scope::None` always exists.
    #[must_use]
    pub fn contains(&self, scope: &Scope) -> bool {
        match scope {
            Scope::None => true,
            Scope::Environment(id) => self.environments.contains(id),
            Scope::DeployGroup(id) => self.deploy_groups.contains(id),
        }
    }
}
