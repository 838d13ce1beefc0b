mod actions;
mod bulk;
mod cli;
mod config;
mod error;
mod export;
mod logging;
mod model;
mod query;
mod rally;
mod util;

use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use cli::Cli;
use config::ConnectionSettings;
use error::AgileError;
use rally::http::RallyClient;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Action errors carry their full message; others show the context chain.
            match e.downcast_ref::<AgileError>() {
                Some(err) => eprintln!("ERROR | {err}"),
                None => eprintln!("ERROR | {e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::load_config(cli.config.as_deref())?;
    let password = std::env::var(config::PASSWORD_ENV).ok();
    let settings = ConnectionSettings::resolve(&config.connection, cli.overrides(), password)?;
    tracing::debug!(
        endpoint = %settings.endpoint(),
        credentials = ?settings.credentials,
        "connection resolved"
    );

    let client = RallyClient::new(&settings)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    cli::dispatch(&client, &cli.command, &mut out).await?;
    out.flush().context("Unable to write to console")?;
    Ok(())
}
