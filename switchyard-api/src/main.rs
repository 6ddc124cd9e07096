//! Switchyard
//!
//! Main entry point for the health-aware load balancing reverse proxy

use switchyard_api::start_server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    start_server().await?;
    Ok(())
}
