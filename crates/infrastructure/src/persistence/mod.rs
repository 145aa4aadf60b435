//! Persistence implementations.
//!
//! Both stores implement the application's `VariableStore` and
//! `VariableRepository` ports on top of a shared [`Dataset`].

mod dataset;
mod file_system;
mod json_store;
mod memory_store;

pub use dataset::{Dataset, Sequences, StoredGroup};
pub use file_system::TokioFileSystem;
pub use json_store::JsonFileStore;
pub use memory_store::InMemoryVariableStore;
