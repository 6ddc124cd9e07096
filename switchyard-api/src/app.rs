use crate::router::routes::create_app_router;
use anyhow::Result;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use switchyard_balance::BalanceService;
use switchyard_core::{load_config, Config};
use switchyard_relay::ProxyForwarder;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Application state shared with every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<BalanceService>,
    pub forwarder: Arc<ProxyForwarder>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Builds the state from a validated config and starts the health
    /// monitor.
    pub async fn new(config: Config) -> Result<Self> {
        let service = Arc::new(BalanceService::new(&config)?);
        service.start().await?;
        info!("Balance service started");

        let forwarder = Arc::new(ProxyForwarder::new(
            service.registry(),
            service.stats(),
            Duration::from_secs(config.settings.request_timeout_seconds),
            config.settings.internal_api_secret.clone(),
        )?);

        Ok(Self {
            service,
            forwarder,
            config: Arc::new(config),
        })
    }

    pub async fn shutdown(&self) {
        info!("Shutting down application...");
        self.service.stop().await;
        info!("Application shutdown complete");
    }
}

/// Creates the application router with state applied.
pub fn create_app(state: AppState) -> Router {
    create_app_router(state.clone()).with_state(state)
}

/// Loads configuration, starts the balance service and serves the proxy
/// until a shutdown signal arrives.
pub async fn start_server() -> Result<()> {
    // Logging is driven entirely by RUST_LOG.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    info!("Starting Switchyard load balancer...");
    let config_path = switchyard_core::get_config_path();
    info!("Configuration file: {}", config_path);

    let config = load_config()?;
    let bind_addr = config.bind_address();
    info!(
        "Configuration loaded: {} backends, probe interval {}s",
        config.backends.len(),
        config.settings.health_check_interval_seconds
    );

    let app_state = match AppState::new(config).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            return Err(e);
        }
    };

    let app = create_app(app_state.clone());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("Load balancer listening on http://{}", addr);
    info!("Reserved endpoints:");
    info!("  GET  /lb-health   - Load balancer health");
    info!("  GET  /lb-stats    - Traffic and backend statistics");
    info!("  POST /reset-stats - Reset statistics counters");
    info!("All other paths are proxied to the backend pool");

    let shutdown_signal = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    };

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal);

    if let Err(e) = server.await {
        error!("Server error: {}", e);
        app_state.shutdown().await;
        return Err(e.into());
    }

    app_state.shutdown().await;
    Ok(())
}
