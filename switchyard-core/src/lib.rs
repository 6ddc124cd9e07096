//! Switchyard Core Library
//!
//! This library provides core functionality for the Switchyard load
//! balancer:
//! - Configuration model and validation
//! - Configuration file loading

pub mod config;

// Re-export commonly used types
pub use config::loader::{get_config_path, load_config, load_config_from_path};
pub use config::model::{Config, Settings};
