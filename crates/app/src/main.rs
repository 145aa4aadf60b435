//! Shipyard command line binary.

use anyhow::Result;
use clap::Parser;
use shipyard::cli::Cli;
use shipyard::commands;
use shipyard::settings::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?.with_overrides(&cli);
    shipyard::init_tracing(&settings.log_level);

    let output = commands::execute(&settings, cli.command).await?;
    print!("{output}");
    Ok(())
}
