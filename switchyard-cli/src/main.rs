//! Switchyard CLI Tool
//!
//! Command line interface for managing a Switchyard deployment

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "switchyard-cli")]
#[command(about = "A CLI tool for managing Switchyard")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration file
    ValidateConfig {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },
    /// Probe backend health once and report the results
    HealthCheck {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,
        /// Specific backend address to check
        #[arg(short, long)]
        backend: Option<String>,
    },
    /// Generate example configuration file
    GenerateConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config.example.toml")]
        output: String,
    },
    /// Fetch statistics from a running load balancer
    Stats {
        /// Base URL of the running load balancer
        #[arg(short, long, default_value = "http://127.0.0.1:7100")]
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::ValidateConfig { config } => {
            println!("Validating configuration file: {}", config);
            match switchyard_core::load_config_from_path(&config) {
                Ok(cfg) => {
                    println!("✅ Configuration is valid");
                    println!("  - {} backends configured", cfg.backends.len());
                    println!("  - listening on {}", cfg.bind_address());
                    println!(
                        "  - probe interval {}s, failure threshold {}",
                        cfg.settings.health_check_interval_seconds,
                        cfg.settings.failure_threshold
                    );
                }
                Err(e) => {
                    eprintln!("❌ Configuration validation failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::HealthCheck { config, backend } => {
            println!("Performing health check...");
            let cfg = switchyard_core::load_config_from_path(&config)?;

            if let Some(ref address) = backend {
                if !cfg.backends.contains(address) {
                    eprintln!("❌ Backend '{}' is not in the configured pool", address);
                    std::process::exit(1);
                }
            }

            // One probe per backend, so a single refused connection is
            // enough to report it as down here.
            let registry = Arc::new(switchyard_balance::BackendRegistry::new(&cfg.backends, 1));
            let monitor = switchyard_balance::HealthMonitor::new(
                registry.clone(),
                Duration::from_secs(cfg.settings.health_check_timeout_seconds),
                cfg.settings.health_check_path.clone(),
            )?;
            monitor.run_probe_cycle().await?;

            let mut any_down = false;
            for snapshot in registry.snapshot_details() {
                if let Some(ref address) = backend {
                    if &snapshot.address != address {
                        continue;
                    }
                }
                if snapshot.healthy {
                    println!("✅ {} is healthy", snapshot.address);
                } else {
                    println!("❌ {} is unreachable", snapshot.address);
                    any_down = true;
                }
            }

            if any_down {
                std::process::exit(1);
            }
            println!("✅ Health check completed");
        }
        Commands::GenerateConfig { output } => {
            println!("Generating configuration file: {}", output);
            generate_config_file(&output)?;
            println!("✅ Configuration file generated successfully");
        }
        Commands::Stats { url } => {
            println!("Fetching statistics from {}...", url);
            show_stats(&url).await?;
        }
    }

    Ok(())
}

fn generate_config_file(output_path: &str) -> Result<()> {
    let config_content = r#"# Switchyard Configuration File
# This is a basic configuration example

host = "0.0.0.0"
port = 7100

# Ordered backend pool; round-robin rotation follows this order
backends = [
    "127.0.0.1:8001",
    "127.0.0.1:8002",
    "127.0.0.1:8003",
]

[settings]
health_check_interval_seconds = 15
health_check_timeout_seconds = 5
initial_check_delay_seconds = 15
failure_threshold = 3
request_timeout_seconds = 30
internal_api_secret = "default-secret-for-local-dev"
health_check_path = "/health"
"#;

    std::fs::write(output_path, config_content)?;
    Ok(())
}

async fn show_stats(base_url: &str) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    let stats_url = format!("{}/lb-stats", base_url.trim_end_matches('/'));
    let response = client.get(&stats_url).send().await?;
    let status = response.status();
    if !status.is_success() {
        eprintln!(
            "❌ Stats request failed: {} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("")
        );
        std::process::exit(1);
    }
    let stats: serde_json::Value = response.json().await?;

    println!("📊 Load Balancer Statistics");
    println!("===========================");
    println!(
        "Total Requests: {}",
        stats["load_balancer"]["total_requests"]
    );
    println!(
        "Failed Requests: {}",
        stats["load_balancer"]["failed_requests"]
    );
    println!("Success Rate: {}%", stats["load_balancer"]["success_rate"]);
    println!(
        "Requests/Second: {}",
        stats["load_balancer"]["requests_per_second"]
    );
    println!("Uptime: {}s", stats["uptime_seconds"]);
    println!();

    println!("🏥 Backend Health");
    println!("=================");
    println!(
        "Healthy: {}/{}",
        stats["health_check"]["healthy_servers"],
        stats["health_check"]["backend_servers"]
    );
    if let Some(details) = stats["health_check"]["server_details"].as_object() {
        for (address, detail) in details {
            let healthy = detail["healthy"].as_bool().unwrap_or(false);
            println!("Backend: {}", address);
            println!(
                "  Status: {}",
                if healthy {
                    "🟢 Healthy"
                } else {
                    "🔴 Unhealthy"
                }
            );
            println!(
                "  Consecutive Failures: {}",
                detail["consecutive_failures"]
            );
            if !detail["avg_response_time_ms"].is_null() {
                println!("  Avg Latency: {}ms", detail["avg_response_time_ms"]);
            }
            if !detail["last_check_seconds_ago"].is_null() {
                println!("  Last Check: {}s ago", detail["last_check_seconds_ago"]);
            }
            println!();
        }
    }

    Ok(())
}
