//! Port definitions (interfaces)
//!
//! Ports define the boundaries between the application core and external systems.
//! Each port is a trait that can be implemented by adapters in the infrastructure layer.

mod clock;
mod file_system;
mod variable_repository;
mod variable_store;

pub use clock::Clock;
pub use file_system::{FileSystem, FileSystemError};
pub use variable_repository::VariableRepository;
pub use variable_store::{ResolutionSets, StoreError, VariableStore};
