use crate::balance::monitor::HealthMonitor;
use crate::balance::registry::BackendRegistry;
use crate::balance::stats::{StatsCollector, StatsSnapshot};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use switchyard_core::{Config, Settings};
use tokio::sync::RwLock;
use tracing::{error, info};

/// Back-off applied when a probe cycle itself errors, before retrying.
const CYCLE_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Owns the backend registry, the stats collector, and the health-monitor
/// task lifecycle. Constructed once at startup and handed to the HTTP
/// layer by reference; there are no ambient globals.
pub struct BalanceService {
    registry: Arc<BackendRegistry>,
    monitor: Arc<HealthMonitor>,
    stats: Arc<StatsCollector>,
    settings: Settings,
    is_running: Arc<RwLock<bool>>,
}

impl BalanceService {
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(BackendRegistry::new(
            &config.backends,
            config.settings.failure_threshold,
        ));
        let monitor = Arc::new(HealthMonitor::new(
            registry.clone(),
            Duration::from_secs(config.settings.health_check_timeout_seconds),
            config.settings.health_check_path.clone(),
        )?);

        Ok(Self {
            registry,
            monitor,
            stats: Arc::new(StatsCollector::new()),
            settings: config.settings.clone(),
            is_running: Arc::new(RwLock::new(false)),
        })
    }

    /// Starts the health-monitor loop. Idempotent: a second call while
    /// running is a no-op.
    pub async fn start(&self) -> Result<()> {
        {
            let mut running = self.is_running.write().await;
            if *running {
                return Ok(());
            }
            *running = true;
        }

        info!(
            "Starting balance service: {} backends, probe interval {}s, failure threshold {}",
            self.registry.len(),
            self.settings.health_check_interval_seconds,
            self.settings.failure_threshold
        );

        let monitor = self.monitor.clone();
        let is_running = self.is_running.clone();
        let initial_delay = Duration::from_secs(self.settings.initial_check_delay_seconds);
        let interval = Duration::from_secs(self.settings.health_check_interval_seconds);

        tokio::spawn(async move {
            // Grace period so backends that are still starting up are not
            // demoted by the very first cycle.
            tokio::time::sleep(initial_delay).await;

            while *is_running.read().await {
                if let Err(e) = monitor.run_probe_cycle().await {
                    error!("Probe cycle failed: {}", e);
                    tokio::time::sleep(CYCLE_ERROR_BACKOFF).await;
                    continue;
                }
                tokio::time::sleep(interval).await;
            }
            info!("Health monitor loop stopped");
        });

        Ok(())
    }

    /// Signals the monitor loop to stop at its next cycle boundary.
    pub async fn stop(&self) {
        let mut running = self.is_running.write().await;
        *running = false;
        info!("Balance service stopped");
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// Round-robin pick over the currently-healthy subset.
    pub fn select_backend(&self) -> Option<String> {
        self.registry.select_next()
    }

    pub fn registry(&self) -> Arc<BackendRegistry> {
        self.registry.clone()
    }

    pub fn stats(&self) -> Arc<StatsCollector> {
        self.stats.clone()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot(&self.registry)
    }
}
