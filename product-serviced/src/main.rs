mod api;
mod config;
mod registry;
mod remote_config;

use std::sync::Arc;
use anyhow::{Context, Result};
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use crate::api::routes::{AppState, InstanceSummary};
use crate::config::Config;
use crate::registry::{EurekaClient, InstanceRecord, Timings};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("product_serviced=info"))
        )
        .init();

    tracing::info!("Starting product-serviced");

    // Load config
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/etc/product-service/service.toml".to_string());

    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;

    tracing::info!("Loaded config from {}", config_path);

    // Merge remote configuration before anything reads it
    let timeout = config.registry.request_timeout();
    remote_config::apply_remote(&mut config, timeout)
        .await
        .context("Couldn't load remote configuration, cannot start")?;

    // Bind first so the registry sees the port we actually got
    let listener = tokio::net::TcpListener::bind(&config.server.listen)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server.listen))?;
    let port = listener
        .local_addr()
        .context("Failed to read bound address")?
        .port();

    tracing::info!("Listening on {} (port {})", config.server.listen, port);

    let instance_id = registry::generate_instance_id();
    let record = InstanceRecord::from_config(&config, instance_id.clone(), port);

    let client = EurekaClient::new(&config.registry)
        .context("Failed to create registry client")?;
    tracing::info!("Using registry at {}", client.base_url());

    // Cancelled on signal; starts the registry shutdown sequence
    let shutdown = CancellationToken::new();

    // Registration failure aborts boot
    let registration = registry::start_client(
        Arc::new(client),
        record,
        Timings::from(&config.registry),
        shutdown.clone(),
    )
    .await
    .context("Failed to register with service registry")?;

    tracing::info!("Registry state: {:?}", registration.state());

    // Build API router
    let app_state = AppState {
        instance: Arc::new(InstanceSummary {
            app: config.application.name.clone(),
            instance_id,
            port,
            started_at: Utc::now(),
        }),
        lifecycle_rx: registration.subscribe(),
    };
    let app = api::routes::router(app_state);

    // Keep serving through the DOWN grace period; stop only after deregistering
    let server_cancel = CancellationToken::new();
    let server_shutdown = server_cancel.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    // Wait for shutdown signal
    wait_for_signal()
        .await
        .context("Failed to listen for shutdown signal")?;

    tracing::info!("Shutdown signal received");

    // Trigger cancellation
    shutdown.cancel();

    let outcome = registration.finished().await;

    server_cancel.cancel();
    let _ = server_handle.await;

    outcome.context("Failed to leave service registry")?;

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
