//! Export infrastructure.
//!
//! Turns resolved environments into env files.

mod dotenv;

pub use dotenv::{ENV_FILE, EnvFileWriter, env_file_name, render_dotenv};

use shipyard_application::ports::FileSystemError;
use thiserror::Error;

/// Export error type.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Writing a file failed.
    #[error("File system error: {0}")]
    FileSystem(#[from] FileSystemError),

    /// Two deploy groups slugify to the same file name.
    #[error("Two deploy groups map to env file {0}")]
    DuplicateFile(String),
}
