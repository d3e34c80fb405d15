//! Scribe CLI: the main entry point.
//!
//! Commands:
//! - `chat`: Process a document from a file or stdin
//! - `serve`: Start the HTTP text-in/text-out server
//! - `models`: List the models a gateway offers

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "scribe",
    about = "Scribe: chat with LLMs in a plain-text document",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer the last question of a document and print the result
    Chat(commands::chat::ChatArgs),

    /// Start the HTTP server
    Serve(commands::serve::ServeArgs),

    /// List available models for a gateway
    Models {
        /// Gateway to query (defaults to the configured gateway)
        #[arg(short, long)]
        gateway: Option<scribe_providers::Gateway>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout carries the document
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Chat(args) => commands::chat::run(args).await?,
        Commands::Serve(args) => commands::serve::run(args).await?,
        Commands::Models { gateway } => commands::models::run(gateway).await?,
    }

    Ok(())
}
