//! `unitypilot serve` - Start the HTTP gateway.

use unitypilot_config::AppConfig;

pub async fn run(mut config: AppConfig, port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(port) = port_override {
        config.gateway.port = Some(port);
    }

    println!("🎮 UnityPilot Gateway");
    println!("   Environment: {}", config.environment);
    println!("   Listening:   {}:{}", config.host(), config.port());
    println!("   Model:       {}", config.model.vendor);

    unitypilot_gateway::start(config).await?;

    Ok(())
}
