//! Vetteam CLI: run the veterinary market research team from a terminal.
//!
//! The same binary doubles as the team's tool host: `vetteam tool-host`
//! speaks the tool protocol on stdin/stdout, and `vetteam run` launches it
//! as a child process by default.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Vetteam: AI veterinary market research team
#[derive(Parser)]
#[command(name = "vetteam", version, about = "Vetteam: AI veterinary market research team")]
pub struct Cli {
    /// Path to a YAML config file
    #[arg(long, global = true, env = "VETTEAM_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run researcher → analyst → strategist and print the results
    Run {
        /// Echo prompts instead of calling a model (no API key needed)
        #[arg(long)]
        offline: bool,
        /// Print a JSON object instead of Markdown sections
        #[arg(long)]
        json: bool,
        /// Opening user message
        #[arg(long)]
        message: Option<String>,
    },

    /// Serve the built-in market research tools over stdio
    ToolHost,

    /// Connect to the configured tool host and list its tools
    Tools {
        /// Print the descriptors as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the resolved configuration (API key redacted)
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // stdout belongs to the tool protocol in `tool-host`; logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vetteam_core=info,vetteam_cli=info".into()),
        )
        .init();

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Run {
            offline,
            json,
            message,
        } => commands::run::run(config, offline, json, message.as_deref()).await,
        Commands::ToolHost => commands::tool_host::run().await,
        Commands::Tools { json } => commands::tools::list(config, json).await,
        Commands::Config => commands::config::show(config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
