//! Environment variable records and their owners.

use serde::{Deserialize, Serialize};

use super::scope::Scope;
use crate::error::{DomainError, DomainResult};
use crate::id::{StageId, VariableGroupId, VariableId};

/// The container a variable record belongs to. Ownership is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id")]
pub enum Owner {
    /// Owned directly by a stage.
    Stage(StageId),
    /// Owned by a variable group shared between stages.
    Group(VariableGroupId),
}

/// A persisted environment variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentVariable {
    /// Record id.
    pub id: VariableId,
    /// Variable name.
    pub name: String,
    /// Raw value, may contain `$NAME` references.
    pub value: String,
    /// Where the variable applies.
    #[serde(default)]
    pub scope: Scope,
    /// Owning stage or variable group.
    pub owner: Owner,
}

impl EnvironmentVariable {
    /// Returns the unsaved form of this record, keeping its id.
    #[must_use]
    pub fn to_draft(&self) -> VariableDraft {
        VariableDraft {
            id: Some(self.id),
            name: self.name.clone(),
            value: self.value.clone(),
            scope: self.scope,
        }
    }
}

/// A variable record as it will be committed for an owner.
///
/// `id` is `None` for records that do not exist yet; the store assigns ids
/// and sets the owner on commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableDraft {
    /// Existing record id, if any.
    #[serde(default)]
    pub id: Option<VariableId>,
    /// Variable name.
    pub name: String,
    /// Raw value.
    #[serde(default)]
    pub value: String,
    /// Where the variable applies.
    #[serde(default)]
    pub scope: Scope,
}

impl VariableDraft {
    /// Creates a new unscoped draft.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            value: value.into(),
            scope: Scope::None,
        }
    }

    /// Restricts the draft to a scope.
    #[must_use]
    pub fn scoped(mut self, scope: impl Into<Scope>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Checks record-level invariants.
    ///
    /// # Errors
    /// Returns `DomainError::BlankVariableName` when the name is blank.
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::BlankVariableName);
        }
        Ok(())
    }

    /// Turns the draft into a persisted record.
    #[must_use]
    pub fn persist(self, id: VariableId, owner: Owner) -> EnvironmentVariable {
        EnvironmentVariable {
            id,
            name: self.name,
            value: self.value,
            scope: self.scope,
            owner,
        }
    }
}
