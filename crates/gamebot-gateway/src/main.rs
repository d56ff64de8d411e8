//! Gateway client entry point
//!
//! Run with:
//! ```bash
//! BOT_TOKEN=... cargo run -p gamebot-gateway
//! ```
//!
//! Configuration is loaded from environment variables. Lifecycle notifications
//! and inbound events are logged until Ctrl-C.

use gamebot_common::{try_init_tracing_with_config, AppConfig, TracingConfig};
use gamebot_gateway::{
    ClientConfig, EventCategory, GatewayClient, GatewayEvent, HttpEndpointResolver, LifecycleEvent,
    StaticEndpoint,
};
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() {
    // Configuration decides the log format, so it loads first
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = try_init_tracing_with_config(TracingConfig::for_app(&config.app)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run(config).await {
        error!(error = %e, "Gateway client failed");
        std::process::exit(1);
    }
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    info!(app = %config.app.name, env = ?config.app.env, "Starting gateway client...");

    let builder = GatewayClient::builder(ClientConfig::from(&config.gateway));
    let builder = match &config.gateway.url {
        Some(url) => {
            info!(url = %url, "Using fixed gateway endpoint");
            builder.resolver(StaticEndpoint::new(url.clone()))
        }
        None => builder.resolver(
            HttpEndpointResolver::new(
                &config.bot.api_base_url,
                &config.bot.token,
                config.gateway.compress,
            )
            .with_request_timeout(Duration::from_millis(config.bot.request_timeout_ms)),
        ),
    };
    let client = builder.build()?;

    client.on_lifecycle(|event: LifecycleEvent| async move {
        match &event {
            LifecycleEvent::Error(e) => warn!(code = e.code(), error = %e, "Gateway error"),
            _ => info!(event = %event, "Gateway lifecycle"),
        }
        anyhow::Ok(())
    });

    client.on_event(EventCategory::System, |event: GatewayEvent| async move {
        info!(
            sn = ?event.sn,
            kind = event.system_kind().unwrap_or("unknown"),
            target_id = event.target_id().unwrap_or_default(),
            "System event"
        );
        anyhow::Ok(())
    });

    client.on_event(EventCategory::Message, |event: GatewayEvent| async move {
        debug!(
            sn = ?event.sn,
            message_type = ?event.message_type(),
            target_id = event.target_id().unwrap_or_default(),
            "Message event"
        );
        anyhow::Ok(())
    });

    client.connect().await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    client.disconnect().await?;

    Ok(())
}
