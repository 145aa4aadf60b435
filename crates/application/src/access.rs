//! Role checks at the mutation boundary.
//!
//! Authentication happens elsewhere; use cases only receive the already
//! authenticated [`Actor`] and check its role.

use std::fmt;
use std::str::FromStr;

use tracing::warn;

/// Roles, ordered from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    /// May look at things.
    Viewer,
    /// May deploy and list shared configuration.
    Deployer,
    /// May change shared configuration.
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Viewer => "viewer",
            Self::Deployer => "deployer",
            Self::Admin => "admin",
        })
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "viewer" => Ok(Self::Viewer),
            "deployer" => Ok(Self::Deployer),
            "admin" => Ok(Self::Admin),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

/// A role name that is not one of `viewer`, `deployer` or `admin`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0:?}")]
pub struct UnknownRole(pub String);

/// Raised when an actor lacks the role an operation needs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{actor} is not authorized: {required} role required")]
pub struct AccessError {
    /// Name of the actor.
    pub actor: String,
    /// Role the operation needs.
    pub required: Role,
}

/// The authenticated user or token performing an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    /// Display name, used in logs and errors.
    pub name: String,
    /// Granted role.
    pub role: Role,
}

impl Actor {
    /// Creates an actor.
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            role,
        }
    }

    /// Checks that the actor has at least `required`.
    ///
    /// # Errors
    /// Returns `AccessError` otherwise.
    pub fn require(&self, required: Role) -> Result<(), AccessError> {
        if self.role >= required {
            return Ok(());
        }
        warn!(actor = %self.name, role = %self.role, %required, "access denied");
        Err(AccessError {
            actor: self.name.clone(),
            required,
        })
    }
}
