//! Kbase CLI
//!
//! Main entry point for the `kbase` command-line tool: ask grounded
//! questions, read conversation history and manage the knowledge base.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, HistoryCommand, KnowledgeCommand};
use kbase_core::{config::AppConfig, logging, AppResult};
use kbase_knowledge::Services;
use std::path::PathBuf;

/// Kbase - answers grounded in your own documents
#[derive(Parser, Debug)]
#[command(name = "kbase")]
#[command(about = "Answers grounded in your own documents", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "KBASE_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "KBASE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Generation provider (ollama, gemini)
    #[arg(short, long, global = true, env = "KBASE_PROVIDER")]
    provider: Option<String>,

    /// Generation model identifier
    #[arg(short, long, global = true, env = "KBASE_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask a question answered from the knowledge base
    Ask(AskCommand),

    /// Show a user's conversation history
    History(HistoryCommand),

    /// Knowledge base management
    Knowledge(KnowledgeCommand),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Ask(_) => "ask",
            Commands::History(_) => "history",
            Commands::Knowledge(_) => "knowledge",
        }
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_from(cli.workspace.clone(), cli.config.clone())?
        .with_overrides(
            cli.workspace,
            cli.config,
            cli.provider,
            cli.model,
            cli.log_level,
            cli.verbose,
            cli.no_color,
        );
    if cli.log_json {
        config.log_json = true;
    }

    logging::init_logging(config.log_level.as_deref(), config.no_color, config.log_json)?;

    tracing::info!("Kbase CLI starting");
    tracing::debug!(
        workspace = ?config.workspace,
        provider = %config.provider,
        model = %config.model,
        embedding_provider = %config.embedding_provider,
        "Configuration loaded"
    );

    config.validate()?;
    let services = Services::open(&config)?;

    let _span = tracing::info_span!("command", name = cli.command.name()).entered();

    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(&services).await,
        Commands::History(cmd) => cmd.execute(&services).await,
        Commands::Knowledge(cmd) => cmd.execute(&services).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
