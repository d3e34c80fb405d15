//! `scribe chat`: Process one document.

use super::options::RunFlags;
use clap::Args;
use scribe_agent::run_chat_with_cancel;
use scribe_config::AppConfig;
use scribe_providers::build_provider;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// File to read the document from (stdin when omitted)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Do not load tools.yaml / tools.yml or the default tools file
    #[arg(long)]
    pub omit_tools: bool,

    #[command(flatten)]
    pub run: RunFlags,
}

pub async fn run(args: ChatArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let (gateway, mut options) = args.run.resolve(&config)?;
    options.omit_tools = args.omit_tools;

    let text = match &args.file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))?,
        None => {
            let mut text = String::new();
            tokio::io::stdin().read_to_string(&mut text).await?;
            text
        }
    };

    let provider = build_provider(gateway, config.gateway_override(gateway.as_str()))?;
    info!(gateway = %gateway, model = %options.model, "Running chat");

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling run");
            on_interrupt.cancel();
        }
    });

    let document = run_chat_with_cancel(&text, &options, Arc::new(provider), &cancel).await?;

    let mut stdout = tokio::io::stdout();
    stdout.write_all(document.as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}
