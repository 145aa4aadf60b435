//! Shipyard Infrastructure - Adapters and implementations
//!
//! This crate provides concrete implementations of the ports
//! defined in the application layer.

pub mod adapters;
pub mod export;
pub mod persistence;
pub mod serialization;

pub use adapters::SystemClock;
pub use export::{ENV_FILE, EnvFileWriter, ExportError, env_file_name, render_dotenv};
pub use persistence::{
    Dataset, InMemoryVariableStore, JsonFileStore, Sequences, StoredGroup, TokioFileSystem,
};
pub use serialization::{
    SerializationError, from_json, from_json_bytes, to_json_stable, to_json_stable_bytes,
};
