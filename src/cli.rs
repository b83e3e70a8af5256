use std::{net::SocketAddr, path::PathBuf};

use clap::{Parser, Subcommand};

/// Helpdesk spam triage: classifies new tickets and closes spam.
#[derive(Debug, Parser)]
#[command(name = "helpdesk-spam-guard", version, about, long_about = None)]
pub struct Cli {
    /// Never mutate the helpdesk; log what would have happened instead
    #[arg(long, global = true)]
    pub simulate: bool,

    /// Defaults to `watch`
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Command {
    /// Poll for new tickets on the configured interval until stopped
    Watch,

    /// Run a single batch cycle and print statistics as JSON
    Once {
        /// Override MAX_TICKETS_PER_BATCH for this run
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Accept ticket events over HTTP
    Serve {
        /// Override WEBHOOK_BIND_ADDR
        #[arg(long)]
        bind: Option<SocketAddr>,
    },

    /// Process one webhook payload from a file, or `-` for stdin
    Event { payload: PathBuf },
}

impl Cli {
    pub fn subcommand(&self) -> Command {
        self.command.clone().unwrap_or(Command::Watch)
    }
}
