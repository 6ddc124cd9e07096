pub mod monitor;
pub mod registry;
pub mod service;
pub mod stats;


pub use monitor::HealthMonitor;
pub use registry::{BackendRegistry, BackendSnapshot, HealthTransition};
pub use service::BalanceService;
pub use stats::{StatsCollector, StatsSnapshot};
