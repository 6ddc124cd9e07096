//! Switchyard API Server
//!
//! HTTP surface of the load balancer: the reserved local endpoints plus
//! the catch-all reverse proxy.

pub mod app;
pub mod router;

pub use app::{create_app, start_server, AppState};
