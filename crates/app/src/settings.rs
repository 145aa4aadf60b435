//! Layered settings: defaults, optional `shipyard.toml`, `SHIPYARD_*`
//! environment variables, then command line flags.

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use shipyard_application::{Actor, Role, UnknownRole};

use crate::cli::Cli;

/// Runtime settings of the `shipyard` binary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    /// Path of the JSON dataset file.
    pub store_path: PathBuf,
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Directory env files are written to.
    pub output_dir: PathBuf,
    /// Name recorded in logs for mutations.
    pub actor: String,
    /// Role of the local operator.
    pub role: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("shipyard.json"),
            log_level: "info".to_string(),
            output_dir: PathBuf::from("."),
            actor: "shipyard".to_string(),
            role: "admin".to_string(),
        }
    }
}

impl Settings {
    /// Loads settings from `file` (required when given) or an optional
    /// `shipyard.toml` in the working directory, then `SHIPYARD_*` variables.
    ///
    /// # Errors
    /// Returns an error if a source cannot be read or a value has the wrong
    /// type.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let builder = Config::builder()
            .set_default("store_path", defaults.store_path.display().to_string())?
            .set_default("log_level", defaults.log_level)?
            .set_default("output_dir", defaults.output_dir.display().to_string())?
            .set_default("actor", defaults.actor)?
            .set_default("role", defaults.role)?;

        let builder = match file {
            Some(path) => builder.add_source(File::from(path)),
            None => builder.add_source(File::with_name("shipyard").required(false)),
        };

        builder
            .add_source(Environment::with_prefix("SHIPYARD"))
            .build()?
            .try_deserialize()
    }

    /// Applies command line overrides.
    #[must_use]
    pub fn with_overrides(mut self, cli: &Cli) -> Self {
        if let Some(store) = &cli.store {
            self.store_path.clone_from(store);
        }
        if let Some(level) = &cli.log_level {
            self.log_level.clone_from(level);
        }
        self
    }

    /// Returns the actor mutations run as.
    ///
    /// # Errors
    /// Returns an error if `role` is not a known role.
    pub fn actor(&self) -> Result<Actor, UnknownRole> {
        let role: Role = self.role.parse()?;
        Ok(Actor::new(self.actor.clone(), role))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "store_path = \"/srv/shipyard.json\"\nrole = \"deployer\"\n",
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.store_path, PathBuf::from("/srv/shipyard.json"));
        assert_eq!(settings.output_dir, PathBuf::from("."));
        assert_eq!(settings.actor().unwrap().role, Role::Deployer);
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let dir = tempdir().unwrap();
        assert!(Settings::load(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::try_parse_from(["shipyard", "--store", "other.json", "groups"]).unwrap();
        let settings = Settings::default().with_overrides(&cli);

        assert_eq!(settings.store_path, PathBuf::from("other.json"));
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn test_unknown_role() {
        let settings = Settings {
            role: "root".to_string(),
            ..Settings::default()
        };
        assert!(settings.actor().is_err());
    }
}
