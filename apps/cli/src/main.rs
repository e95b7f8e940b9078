//! PageForge CLI: scheduled content automation and remote content tools.
//!
//! Runs the cadence scheduler, seeds keyword/location landing pages, and
//! answers tool calls against a local content database.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
