//! Domain error types

use std::fmt;

use thiserror::Error;

/// Domain-level errors that can occur during validation or processing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A scope token is malformed or names an unsupported scope type.
    #[error("invalid scope: {0:?}")]
    InvalidScope(String),

    /// An identifier is invalid or empty.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// A variable name is empty.
    #[error("variable name can't be blank")]
    BlankVariableName,
}

/// Result type alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

/// A single field-level problem found while validating a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Batch key (or record label) of the offending record.
    pub record: String,
    /// Attribute that failed validation.
    pub field: &'static str,
    /// Human readable message.
    pub message: String,
}

impl FieldError {
    /// Creates a new field error.
    pub fn new(record: impl Into<String>, field: &'static str, message: impl Into<String>) -> Self {
        Self {
            record: record.into(),
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} {}", self.record, self.field, self.message)
    }
}

/// All validation problems of a rejected batch.
///
/// A batch is accepted or rejected as a whole, so every problem is
/// collected before reporting instead of stopping at the first one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// Creates an empty error list.
    #[must_use]
    pub const fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Records a problem.
    pub fn push(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    /// Appends every problem of `other`.
    pub fn merge(&mut self, other: Self) {
        self.errors.extend(other.errors);
    }

    /// Returns true when no problem was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the recorded problems in the order they were found.
    #[must_use]
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Returns the problems reported for one record.
    pub fn for_record<'a>(&'a self, record: &'a str) -> impl Iterator<Item = &'a FieldError> {
        self.errors.iter().filter(move |e| e.record == record)
    }

    /// Converts into `Ok(value)` when empty, `Err(self)` otherwise.
    ///
    /// # Errors
    /// Returns `self` when at least one problem was recorded.
    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed")?;
        for (i, error) in self.errors.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}
