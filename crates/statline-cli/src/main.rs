use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use statline_application::{bootstrap, init_tracing};
use statline_infrastructure::ConfigService;

mod commands;

#[derive(Parser)]
#[command(name = "statline")]
#[command(about = "Statline - ask questions about AFL statistics in plain English", long_about = None)]
struct Cli {
    /// Config file to use instead of the platform default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question and print the answer
    Ask {
        question: String,
        /// Continue an existing conversation
        #[arg(long, short)]
        conversation: Option<String>,
        /// Print the raw event stream as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Start an interactive session
    Chat {
        #[arg(long, short)]
        conversation: Option<String>,
    },
    /// List conversations, or show the turns of one
    History { id: Option<String> },
    /// Delete a stored conversation
    Forget { id: String },
    /// Describe the tables, teams and metrics that can be queried
    Catalog,
    /// Check a SQL query against the safety rules without running it
    Validate { sql: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_service = match cli.config {
        Some(path) => ConfigService::with_path(path),
        None => ConfigService::new()?,
    };
    let config = config_service.load()?;
    let _guard = init_tracing(&config.logging, config.logging.directory.as_deref())?;

    match cli.command {
        Commands::Catalog => commands::catalog::describe(&config)?,
        Commands::Validate { sql } => commands::validate::check(&config, &sql)?,
        Commands::Ask {
            question,
            conversation,
            json,
        } => {
            let app = bootstrap(config)?;
            commands::ask::run(&app, &question, conversation.as_deref(), json).await?
        }
        Commands::Chat { conversation } => {
            commands::chat::run(&bootstrap(config)?, conversation).await?
        }
        Commands::History { id } => commands::history::show(id.as_deref()).await?,
        Commands::Forget { id } => commands::history::forget(&id).await?,
    }

    Ok(())
}
