//! Nested-attributes batches for creating, updating and deleting variables.
//!
//! A batch is keyed by an arbitrary index (forms submit `"0"`, `"1"`, ...).
//! Each entry is interpreted as one instruction:
//!
//! | `id`  | `_destroy` | instruction            |
//! |-------|------------|------------------------|
//! | none  | false      | create                 |
//! | some  | false      | update                 |
//! | some  | true       | delete                 |
//! | none  | true       | ignored (discarded row)|
//!
//! [`VariableBatch::apply`] either returns the complete new record list of
//! the owner or every problem it found; it never returns a partial result.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Deserializer, Serialize};

use super::scope::{KnownScopes, Scope};
use super::variable::{EnvironmentVariable, VariableDraft};
use crate::error::{DomainError, DomainResult, FieldError, ValidationErrors};
use crate::id::VariableId;

/// Form field holding the scope token.
pub const SCOPE_FIELD: &str = "scope_type_and_id";

/// Record name used for problems with the group itself.
pub const GROUP_RECORD: &str = "group";

/// Attributes of one record inside a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableAttributes {
    /// Id of an existing record to update or delete.
    #[serde(default)]
    pub id: Option<VariableId>,
    /// Variable name.
    #[serde(default)]
    pub name: String,
    /// Variable value.
    #[serde(default)]
    pub value: String,
    /// Scope token, `"<Kind>-<id>"` or blank.
    #[serde(default)]
    pub scope_type_and_id: Option<String>,
    /// Marks an existing record for deletion.
    #[serde(default, rename = "_destroy", deserialize_with = "deserialize_flag")]
    pub destroy: bool,
}

impl VariableAttributes {
    /// Attributes for a new record.
    pub fn create(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ..Self::default()
        }
    }

    /// Attributes replacing an existing record.
    pub fn update(id: VariableId, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            ..Self::create(name, value)
        }
    }

    /// Attributes deleting an existing record.
    #[must_use]
    pub fn destroy(id: VariableId) -> Self {
        Self {
            id: Some(id),
            destroy: true,
            ..Self::default()
        }
    }

    /// Sets the scope token.
    #[must_use]
    pub fn with_scope(mut self, token: impl Into<String>) -> Self {
        self.scope_type_and_id = Some(token.into());
        self
    }

    /// Interprets the attributes.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidScope` when the scope token does not parse
    /// and `DomainError::BlankVariableName` for a create or update without a
    /// name. Deletions are not validated.
    pub fn instruction(&self) -> DomainResult<VariableInstruction> {
        match (self.id, self.destroy) {
            (Some(id), true) => return Ok(VariableInstruction::Destroy(id)),
            (None, true) => return Ok(VariableInstruction::Skip),
            _ => {}
        }

        let draft = VariableDraft {
            id: self.id,
            name: self.name.clone(),
            value: self.value.clone(),
            scope: Scope::parse_optional(self.scope_type_and_id.as_deref())?,
        };
        draft.validate()?;

        Ok(match draft.id {
            Some(_) => VariableInstruction::Update(draft),
            None => VariableInstruction::Create(draft),
        })
    }
}

/// What a batch entry asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableInstruction {
    /// Add a new record.
    Create(VariableDraft),
    /// Replace name, value and scope of an existing record.
    Update(VariableDraft),
    /// Delete an existing record.
    Destroy(VariableId),
    /// Nothing to do.
    Skip,
}

/// A set of record instructions applied to one owner as a unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableBatch {
    entries: BTreeMap<String, VariableAttributes>,
}

impl VariableBatch {
    /// Creates an empty batch.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Adds an entry under `key`, replacing any previous entry with that key.
    pub fn insert(&mut self, key: impl Into<String>, attributes: VariableAttributes) {
        self.entries.insert(key.into(), attributes);
    }

    /// Adds an entry, builder style.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, attributes: VariableAttributes) -> Self {
        self.insert(key, attributes);
        self
    }

    /// Returns true when the batch has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns entries in submission order: numeric keys ascending, then
    /// other keys lexicographically.
    pub fn ordered_entries(&self) -> Vec<(&str, &VariableAttributes)> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|(key, attributes)| (key.as_str(), attributes))
            .collect();
        entries.sort_by_key(|(key, _)| (key.parse::<u64>().unwrap_or(u64::MAX), *key));
        entries
    }

    /// Applies the batch to the current records of one owner.
    ///
    /// Returns the owner's complete new record list: surviving records in
    /// their original order with updates applied, followed by created records
    /// in submission order.
    ///
    /// # Errors
    /// Returns every problem found: unparsable or unknown scopes, blank names,
    /// and ids that do not belong to the owner.
    pub fn apply(
        &self,
        current: &[EnvironmentVariable],
        known: &KnownScopes,
    ) -> Result<Vec<VariableDraft>, ValidationErrors> {
        let mut records: Vec<VariableDraft> =
            current.iter().map(EnvironmentVariable::to_draft).collect();
        let mut created = Vec::new();
        let mut destroyed = BTreeSet::new();
        let mut errors = ValidationErrors::new();

        for (key, attributes) in self.ordered_entries() {
            let instruction = match attributes.instruction() {
                Ok(instruction) => instruction,
                Err(error) => {
                    errors.push(field_error(key, attributes, &error));
                    continue;
                }
            };

            match instruction {
                VariableInstruction::Create(draft) => {
                    if check_scope(key, &draft, known, &mut errors) {
                        created.push(draft);
                    }
                }
                VariableInstruction::Update(draft) => {
                    let position = records.iter().position(|r| r.id == draft.id);
                    match position {
                        Some(index) => {
                            if check_scope(key, &draft, known, &mut errors) {
                                records[index] = draft;
                            }
                        }
                        None => errors.push(missing_record(key, draft.id)),
                    }
                }
                VariableInstruction::Destroy(id) => {
                    if records.iter().any(|r| r.id == Some(id)) {
                        destroyed.insert(id);
                    } else {
                        errors.push(missing_record(key, Some(id)));
                    }
                }
                VariableInstruction::Skip => {}
            }
        }

        records.retain(|r| r.id.is_none_or(|id| !destroyed.contains(&id)));
        records.extend(created);
        errors.into_result(records)
    }

    /// Applies the batch to a variable group's records and checks the group
    /// name in the same pass, so both kinds of problems are reported together.
    ///
    /// # Errors
    /// Returns every problem of `name` (record `"group"`) and of the batch.
    pub fn apply_to_group(
        &self,
        name: &str,
        current: &[EnvironmentVariable],
        known: &KnownScopes,
    ) -> Result<Vec<VariableDraft>, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if name.trim().is_empty() {
            errors.push(FieldError::new(GROUP_RECORD, "name", "can't be blank"));
        }

        let drafts = self.apply(current, known).unwrap_or_else(|batch_errors| {
            errors.merge(batch_errors);
            Vec::new()
        });
        errors.into_result(drafts)
    }
}

impl FromIterator<(String, VariableAttributes)> for VariableBatch {
    fn from_iter<I: IntoIterator<Item = (String, VariableAttributes)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

fn check_scope(
    key: &str,
    draft: &VariableDraft,
    known: &KnownScopes,
    errors: &mut ValidationErrors,
) -> bool {
    if known.contains(&draft.scope) {
        return true;
    }
    errors.push(FieldError::new(
        key,
        SCOPE_FIELD,
        format!("{} does not exist (variable {:?})", draft.scope, draft.name),
    ));
    false
}

fn field_error(key: &str, attributes: &VariableAttributes, error: &DomainError) -> FieldError {
    match error {
        DomainError::InvalidScope(token) => FieldError::new(
            key,
            SCOPE_FIELD,
            format!("{token:?} is not a valid scope (variable {:?})", attributes.name),
        ),
        DomainError::BlankVariableName => FieldError::new(key, "name", "can't be blank"),
        DomainError::InvalidIdentifier(_) => FieldError::new(key, "id", error.to_string()),
    }
}

fn missing_record(key: &str, id: Option<VariableId>) -> FieldError {
    let id = id.map_or_else(String::new, |id| id.to_string());
    FieldError::new(key, "id", format!("{id} does not belong to this owner"))
}

/// Accepts `true`/`false` as well as the string flags forms submit
/// (`"1"`, `"0"`, `"true"`, `"false"`, `""`).
fn deserialize_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(u8),
        Text(String),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(flag) => Ok(flag),
        Flag::Int(n) => Ok(n != 0),
        Flag::Text(text) => match text.as_str() {
            "1" | "true" => Ok(true),
            "0" | "false" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!("invalid flag {other:?}"))),
        },
    }
}
