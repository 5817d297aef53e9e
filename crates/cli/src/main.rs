//! UnityPilot CLI - the main entry point.
//!
//! Commands:
//! - `serve`   - Start the HTTP gateway
//! - `chat`    - Interactive query loop against the Unity Editor
//! - `query`   - Answer a single query and exit
//! - `tools`   - List the tools the Unity MCP server exposes
//! - `secret`  - Generate a secret key for signing session cookies
//! - `config`  - Show the effective or default configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use unitypilot_config::Environment;

mod commands;

#[derive(Parser)]
#[command(
    name = "unitypilot",
    about = "UnityPilot - drive the Unity Editor with natural language",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ~/.unitypilot/config.toml)
    #[arg(short, long, global = true, env = "UNITYPILOT_CONFIG")]
    config: Option<PathBuf>,

    /// Deployment environment: development, testing, staging or production
    #[arg(short, long, global = true)]
    mode: Option<Environment>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Chat with the Unity Editor interactively
    Chat,

    /// Answer a single query
    Query {
        /// The query text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// List the Unity MCP tool catalog
    Tools,

    /// Print a freshly generated secret key
    Secret,

    /// Show configuration
    Config {
        /// Print the default configuration instead of the effective one
        #[arg(long)]
        default: bool,

        /// Print the config file path
        #[arg(long, conflicts_with = "default")]
        path: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so chat and query output stay clean.
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let load = || commands::load_config(cli.config.as_deref(), cli.mode);

    match cli.command {
        Commands::Serve { port } => commands::serve::run(load()?, port).await?,
        Commands::Chat => commands::chat::run(load()?).await?,
        Commands::Query { text } => commands::query::run(load()?, &text.join(" ")).await?,
        Commands::Tools => commands::tools::run(load()?).await?,
        Commands::Secret => commands::secret::run(),
        Commands::Config { default, path } => {
            if default {
                commands::config_cmd::show_default();
            } else if path {
                commands::config_cmd::path(cli.config.as_deref());
            } else {
                commands::config_cmd::show(&load()?);
            }
        }
    }

    Ok(())
}
