//! `ronnyx serve` — Start the HTTP API server.

use ronnyx_config::AppConfig;
use ronnyx_core::event::EventBus;
use std::sync::Arc;

pub async fn run(
    port_override: Option<u16>,
    host_override: Option<String>,
    events: Arc<EventBus>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }
    if let Some(host) = host_override {
        config.gateway.host = host;
    }

    println!("Ronnyx Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:     {}", config.llm.model);
    println!("   Sessions:  {}", config.sessions.backend);

    ronnyx_gateway::start(config, events).await?;

    Ok(())
}
