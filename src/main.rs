mod ai;
mod app;
mod cli;
mod config;
mod domain;
mod helpdesk;
mod infrastructure;
mod tasks;
mod webhook;

use anyhow::Result;
use clap::Parser;
use infrastructure::{directories, logging, shutdown};

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = config::load_config()?;
    config.simulate |= cli.simulate;
    let paths = directories::ensure_directories(&config.directories)?;
    logging::init_tracing(&config.logging, &paths)?;

    let (shutdown, _) = shutdown::Shutdown::new();
    shutdown::install_signal_handlers(shutdown.clone());

    let app = app::SpamGuardApp::initialize(config, shutdown).await?;
    match cli.subcommand() {
        Command::Watch => app.run_watch().await,
        Command::Once { limit } => app.run_once(limit).await,
        Command::Serve { bind } => app.serve(bind).await,
        Command::Event { payload } => app.run_event(&payload).await,
    }
}
