use crate::balance::registry::{BackendRegistry, HealthTransition};
use anyhow::Result;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Probes every registered backend and feeds the outcomes into the
/// registry.
///
/// The monitor is deliberately the only component that mutates health
/// flags: a failed forwarded request never demotes a backend, only
/// probing does.
pub struct HealthMonitor {
    registry: Arc<BackendRegistry>,
    client: Client,
    health_check_path: String,
}

impl HealthMonitor {
    pub fn new(
        registry: Arc<BackendRegistry>,
        probe_timeout: Duration,
        health_check_path: String,
    ) -> Result<Self> {
        let client = Client::builder().timeout(probe_timeout).build()?;
        Ok(Self {
            registry,
            client,
            health_check_path,
        })
    }

    /// Runs one probe cycle: one concurrent probe task per backend, all
    /// joined before returning.
    ///
    /// Individual probe failures are not errors; they accumulate toward
    /// the demotion threshold inside the registry. Transitions are logged
    /// here so a flapping probe does not flood the log.
    pub async fn run_probe_cycle(&self) -> Result<()> {
        let addresses = self.registry.addresses();
        debug!("Starting probe cycle for {} backends", addresses.len());

        let mut tasks = Vec::new();
        for address in addresses {
            let client = self.client.clone();
            let registry = self.registry.clone();
            let url = format!("http://{}{}", address, self.health_check_path);

            let task = tokio::spawn(async move {
                let success = match client.get(&url).send().await {
                    Ok(response) => response.status().is_success(),
                    Err(e) => {
                        debug!("Probe for {} failed: {}", address, e);
                        false
                    }
                };

                match registry.record_probe_result(&address, success) {
                    Some(HealthTransition::Demoted) => {
                        warn!("Backend {} marked unhealthy", address);
                    }
                    Some(HealthTransition::Recovered) => {
                        info!("Backend {} recovered", address);
                    }
                    None => {}
                }
            });
            tasks.push(task);
        }

        for task in tasks {
            if let Err(e) = task.await {
                error!("Probe task failed to complete: {}", e);
            }
        }

        debug!(
            "Probe cycle complete: {}/{} backends healthy",
            self.registry.healthy_count(),
            self.registry.len()
        );
        Ok(())
    }
}
