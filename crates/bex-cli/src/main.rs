//! bex - Backlog export from the command line.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "bex")]
#[command(author, version, about = "Export backlogs to self-contained documents")]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file
    #[arg(long, short = 'c', global = true, default_value = "bex.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter configuration file
    Init {
        /// Destination (defaults to the --config path)
        file: Option<PathBuf>,

        /// Replace an existing file
        #[arg(long)]
        overwrite: bool,
    },

    /// Export one backlog, or all configured ones
    Export {
        /// Backlog name (omit to export every configured backlog)
        backlog: Option<String>,

        /// Export to this path instead of the configured outputs
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Replace existing outputs regardless of their output config
        #[arg(long)]
        overwrite: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { file, overwrite } => {
            commands::init(file.as_deref().unwrap_or(&cli.config), overwrite)
        }
        Commands::Export {
            backlog,
            output,
            overwrite,
        } => {
            commands::export(
                &cli.config,
                backlog.as_deref(),
                output.as_deref(),
                overwrite,
            )
            .await
        }
    }
}
