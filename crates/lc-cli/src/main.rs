//! lab-console CLI
//!
//! Terminal front end for the lab console runtime:
//! - `console`: attach to a device console
//! - `watch`: follow a lab's node, link and job state
//! - `config`: manage the client configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lab_console::commands::{self, WatchOptions};
use lab_console::settings::Settings;

#[derive(Parser)]
#[command(name = "lab-console")]
#[command(author, version, about = "Real-time client for network lab consoles")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Orchestrator origin, e.g. https://lab.example.com (overrides config)
    #[arg(long, global = true, env = "LAB_CONSOLE_ORIGIN")]
    origin: Option<String>,

    /// Bearer token (overrides the token file)
    #[arg(long, global = true, env = "LAB_CONSOLE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Attach to a node's serial console
    Console {
        /// Lab identifier
        lab: String,
        /// Node identifier
        node: String,
    },

    /// Follow live node, link and job state of a lab
    Watch {
        /// Lab identifier
        lab: String,
        /// Request a fresh snapshot whenever the connection opens
        #[arg(short, long)]
        refresh: bool,
        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
        /// Print node and link tables on exit
        #[arg(short, long)]
        summary: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Show config file path
    Path,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match cli.command {
        Commands::Console { lab, node } => {
            let settings = Settings::load(cli.config.as_deref(), cli.origin, cli.token)?;
            let ctx = settings.context()?;
            commands::console_command(ctx, &settings.config, &lab, &node).await?;
        }

        Commands::Watch {
            lab,
            refresh,
            json,
            summary,
        } => {
            let settings = Settings::load(cli.config.as_deref(), cli.origin, cli.token)?;
            let ctx = settings.context()?;
            let options = WatchOptions {
                refresh,
                json,
                summary,
            };
            commands::watch_command(
                ctx,
                settings.config.state_sync,
                settings.config.ping_interval,
                &lab,
                options,
            )
            .await?;
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_show(cli.config.as_ref())?,
            ConfigAction::Path => commands::config_path(cli.config.as_ref())?,
            ConfigAction::Init { force } => commands::config_init(cli.config.as_ref(), force)?,
        },
    }

    Ok(())
}
