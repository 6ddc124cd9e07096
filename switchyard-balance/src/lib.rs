//! Switchyard Load Balancing Library
//!
//! Backend registry with round-robin selection, the health monitor that
//! keeps it current, and request statistics collection.

pub mod balance;

pub use balance::monitor::HealthMonitor;
pub use balance::registry::{BackendRegistry, BackendSnapshot, HealthTransition};
pub use balance::service::BalanceService;
pub use balance::stats::{StatsCollector, StatsSnapshot};
