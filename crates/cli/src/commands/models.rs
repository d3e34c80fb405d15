//! `scribe models`: List the models a gateway offers.

use scribe_config::AppConfig;
use scribe_core::Provider;
use scribe_providers::{build_provider, Gateway};

pub async fn run(gateway: Option<Gateway>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let gateway = match gateway {
        Some(gateway) => gateway,
        None => config.default_gateway.parse()?,
    };

    let provider = build_provider(gateway, config.gateway_override(gateway.as_str()))?;
    let models = provider
        .list_models()
        .await
        .map_err(|e| format!("Error fetching models: {e}"))?;

    println!();
    println!("Available models for {gateway}:");
    println!();
    for model in &models {
        println!("  {model}");
    }
    println!();

    Ok(())
}
