//! Application error types

use shipyard_domain::{DomainError, ValidationErrors};
use thiserror::Error;

use crate::access::AccessError;
use crate::ports::StoreError;

/// Application-level errors.
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// A domain validation error occurred.
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),

    /// A batch was rejected.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// The actor may not perform the operation.
    #[error(transparent)]
    Access(#[from] AccessError),

    /// A store operation failed.
    #[error("store error: {0}")]
    Store(StoreError),

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<StoreError> for ApplicationError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Rejected(errors) => Self::Validation(errors),
            other => Self::Store(other),
        }
    }
}

/// Result type alias for application operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
