use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "newsboard")]
#[command(version, about = "Editorial workflow board for news production")]
pub struct Cli {
    /// Debug-level logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to newsboard.toml (defaults to .newsboard/newsboard.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Also write JSON logs to a daily-rolling file in this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Act as this user id (overrides config and environment)
    #[arg(long, global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the board over HTTP and WebSocket
    Serve {
        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,

        /// Dev mode: bind 0.0.0.0 and allow any origin
        #[arg(long)]
        dev: bool,

        /// Open the board in a browser once listening
        #[arg(long)]
        open: bool,

        /// Serve an in-memory board loaded from a JSON or TOML seed file
        #[arg(long)]
        seed: Option<PathBuf>,
    },
    /// Print the board, or a single column
    Board {
        /// Only print this column
        #[arg(long)]
        column: Option<String>,

        #[arg(long)]
        seed: Option<PathBuf>,
    },
    /// Move a card to another column
    Move {
        /// Card id (production items are matched first)
        id: String,

        /// Destination column: trend, rewrite, review, send, published, reprove
        column: String,

        /// Skip the confirmation prompt when reproving
        #[arg(long)]
        yes: bool,

        #[arg(long)]
        seed: Option<PathBuf>,
    },
    /// View or initialize configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show effective configuration and warnings
    Show,
    /// Write a default newsboard.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    // A missing .env is fine.
    let _ = dotenvy::dotenv();

    let _log_guard = newsboard::telemetry::init(cli.verbose, cli.log_dir.as_deref())?;

    let config_path = match cli.config.clone() {
        Some(path) => path,
        None => {
            let cwd = std::env::current_dir().context("Failed to get current directory")?;
            newsboard::config::NewsboardConfig::default_path(&cwd)
        }
    };

    match &cli.command {
        Commands::Serve {
            port,
            dev,
            open,
            seed,
        } => {
            cmd::cmd_serve(&cli, &config_path, *port, *dev, *open, seed.as_deref()).await?;
        }
        Commands::Board { column, seed } => {
            cmd::cmd_board(&cli, &config_path, column.as_deref(), seed.as_deref()).await?;
        }
        Commands::Move {
            id,
            column,
            yes,
            seed,
        } => {
            cmd::cmd_move(&cli, &config_path, id, column, *yes, seed.as_deref()).await?;
        }
        Commands::Config { command } => cmd::cmd_config(&cli, &config_path, command.clone())?,
    }

    Ok(())
}
