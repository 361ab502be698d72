//! redwood-tail entry point.
//!
//! Connects as one participant, binds the configured channels and logs
//! every envelope received on them until interrupted.

use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use redwood_channels::ClientConfig;
use redwood_channels::ConnectionManager;

const STATUS_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = ClientConfig::from_env().context("loading configuration")?;
    let endpoint = config.endpoint().context(
        "REDWOOD_APP_NAME, REDWOOD_GROUP_ID and REDWOOD_PARTICIPANT_CODE must be set",
    )?;
    if config.channels.is_empty() {
        anyhow::bail!("REDWOOD_CHANNELS lists no channel to tail");
    }
    tracing::info!(url = %endpoint.url(), channels = ?config.channels, "starting redwood-tail");

    // Connect and bind
    let manager = ConnectionManager::global();
    manager
        .ensure_connected(&endpoint)
        .context("starting transport")?;

    let mut bindings = Vec::with_capacity(config.channels.len());
    for name in &config.channels {
        let binding = manager
            .bind(name)
            .with_context(|| format!("binding channel {name:?}"))?;
        binding.on_event(|event| {
            tracing::info!(
                channel = %event.channel,
                timestamp = event.timestamp,
                payload = %event.payload,
                "event"
            );
        });
        bindings.push(binding);
    }

    if config.ping_enabled {
        manager
            .start_latency_probe(config.ping_interval())
            .context("starting latency probe")?;
    }

    // Report status until interrupted
    let mut status = tokio::time::interval(STATUS_INTERVAL);
    loop {
        tokio::select! {
            _ = status.tick() => {
                match manager.average_rtt() {
                    Some(rtt) => tracing::info!(
                        status = %manager.connection_status(),
                        avg_rtt_ms = rtt.floor(),
                        "connection"
                    ),
                    None => tracing::info!(status = %manager.connection_status(), "connection"),
                }
            }
            result = tokio::signal::ctrl_c() => {
                result.context("waiting for ctrl-c")?;
                break;
            }
        }
    }

    manager.stop_latency_probe();
    for binding in &bindings {
        binding.dispose();
    }
    tracing::info!("redwood-tail stopped");

    Ok(())
}
