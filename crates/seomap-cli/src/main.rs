//! seomap CLI - incremental sitemap generation for multi-site content
//!
//! This is the main entry point for the seomap command-line interface.
//! Command implementations live in [`commands`].

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod output;
mod utils;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    utils::logging::initialize_logging(&cli)?;

    execute_command(cli).await
}

async fn execute_command(cli: Cli) -> Result<()> {
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Generate {
            catalog,
            site,
            kind,
            output,
            no_scan,
        } => {
            commands::generate(config, &catalog, &site, kind.into(), output.as_deref(), no_scan)
                .await?;
        },

        Commands::List {
            catalog,
            site,
            format,
        } => {
            commands::list_items(config, &catalog, &site, format)?;
        },

        Commands::Scan {
            catalog,
            loc,
            format,
        } => {
            commands::scan(config, &catalog, &loc, format).await?;
        },

        Commands::ResetCache => {
            commands::reset_cache(&config)?;
        },
    }

    Ok(())
}
