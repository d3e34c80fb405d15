//! `scribe serve`: Start the HTTP server.

use super::options::RunFlags;
use clap::Args;
use scribe_config::AppConfig;
use scribe_gateway::ServerState;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Host to bind to (defaults to the configured host)
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Port to bind to (defaults to the configured port)
    #[arg(short = 'P', long)]
    pub port: Option<u16>,

    /// Include auto-discovered tools (tools.yaml / tools.yml or the default tools file)
    #[arg(long)]
    pub default_tools: bool,

    #[command(flatten)]
    pub run: RunFlags,
}

pub async fn run(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let (gateway, mut defaults) = args.run.resolve(&config)?;
    defaults.omit_tools = !args.default_tools;

    let host = args.host.unwrap_or_else(|| config.serve.host.clone());
    let port = args.port.unwrap_or(config.serve.port);

    eprintln!("Scribe server");
    eprintln!("   Listening: http://{host}:{port}");
    eprintln!("   Gateway:   {gateway}");
    eprintln!("   Model:     {}", defaults.model);

    let state = ServerState::from_config(&config, gateway, defaults);
    scribe_gateway::start(state, &host, port).await?;

    Ok(())
}
