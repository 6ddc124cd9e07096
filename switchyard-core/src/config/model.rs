use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Ordered backend address pool. Order matters: round-robin rotation
    /// follows configuration order.
    pub backends: Vec<String>,
    #[serde(default)]
    pub settings: Settings,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval_seconds: u64,
    #[serde(default = "default_health_check_timeout")]
    pub health_check_timeout_seconds: u64,
    /// Grace period before the first probe cycle so backends that are
    /// still starting up are not demoted.
    #[serde(default = "default_initial_check_delay")]
    pub initial_check_delay_seconds: u64,
    /// Consecutive failed probes required to mark a backend unhealthy.
    /// A single successful probe recovers it.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Shared secret attached to forwarded requests so downstream
    /// services can tell proxied traffic from direct hits.
    #[serde(default = "default_internal_api_secret")]
    pub internal_api_secret: String,
    #[serde(default = "default_health_check_path")]
    pub health_check_path: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            health_check_interval_seconds: default_health_check_interval(),
            health_check_timeout_seconds: default_health_check_timeout(),
            initial_check_delay_seconds: default_initial_check_delay(),
            failure_threshold: default_failure_threshold(),
            request_timeout_seconds: default_request_timeout(),
            internal_api_secret: default_internal_api_secret(),
            health_check_path: default_health_check_path(),
        }
    }
}

impl Config {
    /// Validates the configuration, returning a descriptive error for the
    /// first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.backends.is_empty() {
            anyhow::bail!("at least one backend address must be configured");
        }

        let mut seen = HashSet::new();
        for address in &self.backends {
            if address.trim().is_empty() {
                anyhow::bail!("backend address must not be empty");
            }
            if !seen.insert(address.as_str()) {
                anyhow::bail!("duplicate backend address: {}", address);
            }
        }

        if self.settings.health_check_interval_seconds == 0 {
            anyhow::bail!("health_check_interval_seconds must be greater than 0");
        }
        if self.settings.failure_threshold == 0 {
            anyhow::bail!("failure_threshold must be greater than 0");
        }

        Ok(())
    }

    /// Address the proxy listens on, in `host:port` form.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    7100
}

fn default_health_check_interval() -> u64 {
    15
}

fn default_health_check_timeout() -> u64 {
    5
}

fn default_initial_check_delay() -> u64 {
    15
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_request_timeout() -> u64 {
    30
}

fn default_internal_api_secret() -> String {
    "default-secret-for-local-dev".to_string()
}

fn default_health_check_path() -> String {
    "/health".to_string()
}
