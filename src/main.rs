//! Switchyard - channel-bridging event multiplexer.
//!
//! Binds the configured endpoints behind one bridge and runs the dispatcher
//! until interrupted.

use std::sync::Arc;

use anyhow::Result;
use tokio::signal;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use switchyard::bridge::{Bridge, RoleResolver};
use switchyard::config::{env::get_config_path, load_and_validate};
use switchyard::event::Dispatcher;
use switchyard::service;
use switchyard::transport::{DefaultTransportFactory, Role};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Switchyard v{} starting...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_path = get_config_path();
    info!("Loading configuration from {}...", config_path);

    let config = load_and_validate(&config_path).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        error!("Please ensure {} exists and is properly formatted.", config_path);
        e
    })?;

    // Validation has already rejected unknown roles.
    let role = config.role().unwrap_or(Role::Server);

    info!("Configuration loaded successfully");
    info!("  Channel: {}", config.bridge.channel);
    info!("  Role: {}", role);
    info!("  Endpoints: {}", config.endpoints.len());

    // ============================================================
    // Build the bridge and bind endpoints
    // ============================================================
    let mut dispatcher = Dispatcher::new(config.dispatcher_settings());
    let factory = Arc::new(DefaultTransportFactory::new(config.client_retry()));
    let mut bridge = Bridge::new(
        &mut dispatcher,
        config.bridge.channel.clone(),
        RoleResolver::new(role, factory),
    );

    for interface in &config.endpoints {
        match bridge.bind(&mut dispatcher, interface.as_str()) {
            Ok(id) => info!(endpoint = %id, interface = %interface, "Bound endpoint"),
            Err(e) => {
                error!(interface = %interface, error = %e, "Failed to bind endpoint");
                bridge.teardown(&mut dispatcher);
                return Err(e.into());
            }
        }
    }
    if config.endpoints.is_empty() {
        warn!("No endpoints configured - the bridge will stay idle");
    }

    service::install(&mut dispatcher, &bridge, &config.service);
    debug!("Component tree:\n{}", dispatcher.graph(bridge.id()));

    // ============================================================
    // Run the dispatcher
    // ============================================================
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut dispatcher_task = tokio::spawn(async move {
        let result = dispatcher.run(shutdown_rx).await;
        (dispatcher, result)
    });

    let finished = tokio::select! {
        biased;
        _ = shutdown_signal() => {
            info!("Shutdown signal received - tearing down bridge...");
            None
        }
        joined = &mut dispatcher_task => Some(joined),
    };

    let joined = match finished {
        Some(joined) => joined,
        None => {
            if let Err(e) = shutdown_tx.send(true) {
                warn!("Dispatcher already stopped: {}", e);
            }
            dispatcher_task.await
        }
    };

    match joined {
        Ok((mut dispatcher, result)) => {
            if let Err(e) = result {
                error!("Dispatcher error: {}", e);
            }
            debug!("Dispatcher state at shutdown:\n{}", dispatcher.inspect());
            bridge.teardown(&mut dispatcher);
        }
        Err(e) => warn!("Dispatcher task panicked: {}", e),
    }

    info!("Exiting...");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
