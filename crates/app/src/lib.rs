//! Shipyard - resolve deploy environment variables from the command line
//!
//! The binary is a thin shell over [`commands::execute`]; settings come from
//! [`settings::Settings`] and arguments from [`cli::Cli`].

pub mod cli;
pub mod commands;
pub mod settings;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global subscriber. `RUST_LOG` wins over `level`.
///
/// Logs go to stderr so command output on stdout stays pipeable.
pub fn init_tracing(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
