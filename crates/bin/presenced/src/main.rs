//! # presenced: presence daemon
//!
//! Composition root that wires the MQTT adapter to the event dispatcher.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Validate the rule lists before any broker connection is attempted
//! - Initialize logging
//! - Spawn the dispatcher task and run the broker loop
//! - Handle graceful shutdown (SIGTERM/SIGINT) with a best-effort disconnect
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no domain logic belongs here.

mod config;

use std::time::Duration;

use presence_app::dispatcher::EventDispatcher;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

const DISPATCH_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    let registry = config
        .build_registry()
        .inspect_err(|err| tracing::error!(error = %err, "rejecting configuration"))?;

    // Adapter
    let (publisher, mut connection) =
        presence_adapter_mqtt::connect(&config.mqtt, registry.subscription_topics())?;

    // Dispatcher
    let (inbound_tx, inbound_rx) = mpsc::channel(config.mqtt.channel_capacity);
    let dispatcher = EventDispatcher::new(registry, config.timing.settings(), publisher);
    let dispatch_task = tokio::spawn(dispatcher.run(inbound_rx));

    tracing::info!(broker = %config.broker_addr(), "presenced starting");

    let outcome = tokio::select! {
        res = connection.run(inbound_tx) => res,
        () = shutdown_signal() => {
            tracing::info!("shutdown requested");
            Ok(())
        }
    };

    // The sender was dropped with the broker loop, so the dispatcher stops
    // once it has finished the message in hand.
    if tokio::time::timeout(DISPATCH_DRAIN_TIMEOUT, dispatch_task)
        .await
        .is_err()
    {
        tracing::warn!("dispatcher did not stop in time");
    }
    connection.shutdown().await;

    if let Err(err) = &outcome {
        tracing::error!(error = %err, "broker connection failed");
    }
    outcome?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
