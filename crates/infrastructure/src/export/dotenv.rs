//! Env file rendering and writing.
//!
//! A stage gets one `.env` file with its common environment and one
//! `.env.<deploy-group-slug>` file per deploy group:
//! ```text
//! out/
//!   .env
//!   .env.pod-1
//!   .env.pod-2
//! ```

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use shipyard_application::ports::FileSystem;
use shipyard_application::use_cases::StageEnvironments;
use shipyard_domain::DeployGroup;
use shipyard_domain::environment::ResolvedEnv;
use tracing::info;

use super::ExportError;

/// File name of the common env file.
pub const ENV_FILE: &str = ".env";

/// Renders an environment as dotenv text, one `NAME="value"` line per
/// variable in name order.
///
/// # Examples
///
/// ```
/// use shipyard_domain::environment::ResolvedEnv;
/// use shipyard_infrastructure::export::render_dotenv;
///
/// let mut env = ResolvedEnv::new();
/// env.insert("GREETING".into(), "say \"hi\"".into());
/// env.insert("A".into(), "1".into());
///
/// assert_eq!(render_dotenv(&env), "A=\"1\"\nGREETING=\"say \\\"hi\\\"\"\n");
/// ```
#[must_use]
pub fn render_dotenv(env: &ResolvedEnv) -> String {
    let mut out = String::new();
    for (name, value) in env {
        // Writing to a String cannot fail.
        let _ = writeln!(out, "{name}=\"{}\"", escape(value));
    }
    out
}

/// Escapes backslashes, double quotes, dollar signs and line breaks.
///
/// Values are already substituted; an escaped `$` keeps dotenv loaders from
/// expanding it a second time.
fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '$' => escaped.push_str("\\$"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Returns the env file name for a deploy group, or the common file name.
#[must_use]
pub fn env_file_name(deploy_group: Option<&DeployGroup>) -> String {
    match deploy_group {
        Some(group) => {
            let slug = slugify(&group.name);
            if slug.is_empty() {
                format!("{ENV_FILE}.{}", group.id)
            } else {
                format!("{ENV_FILE}.{slug}")
            }
        }
        None => ENV_FILE.to_string(),
    }
}

/// Converts a name to a slug suitable for file names.
fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Writes the env files of a stage.
#[derive(Debug, Clone)]
pub struct EnvFileWriter<F> {
    fs: F,
}

impl<F: FileSystem> EnvFileWriter<F> {
    /// Creates a writer using `fs`.
    pub const fn new(fs: F) -> Self {
        Self { fs }
    }

    /// Writes `.env` and one file per deploy group into `dir`.
    ///
    /// Returns the written paths, common file first.
    ///
    /// # Errors
    /// Returns an error if two deploy groups map to the same file name or a
    /// file cannot be written.
    pub async fn write_all(
        &self,
        dir: &Path,
        environments: &StageEnvironments,
    ) -> Result<Vec<PathBuf>, ExportError> {
        let mut files = vec![(ENV_FILE.to_string(), &environments.common)];
        for (group, env) in &environments.deploy_groups {
            let name = env_file_name(Some(group));
            if files.iter().any(|(existing, _)| *existing == name) {
                return Err(ExportError::DuplicateFile(name));
            }
            files.push((name, env));
        }

        self.fs.create_dir_all(dir).await?;
        let mut written = Vec::with_capacity(files.len());
        for (name, env) in files {
            let path = dir.join(name);
            self.fs
                .write_file(&path, render_dotenv(env).as_bytes())
                .await?;
            written.push(path);
        }

        info!(
            stage = %environments.stage,
            dir = %dir.display(),
            files = written.len(),
            "wrote env files"
        );
        Ok(written)
    }
}
