use crate::balance::registry::BackendRegistry;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Request timestamps kept for the trailing-window rate.
const TIMESTAMP_WINDOW: usize = 200;

/// Span of the trailing throughput window.
const RATE_WINDOW: Duration = Duration::from_secs(10);

struct StatsInner {
    total_requests: u64,
    failed_requests: u64,
    request_timestamps: VecDeque<Instant>,
}

/// Aggregate request counters plus a bounded timestamp window.
///
/// Created once at startup and shared between the request paths; the
/// registry keeps the per-backend latency samples, this collector only
/// reads them when building a snapshot.
pub struct StatsCollector {
    started_at: Instant,
    inner: Mutex<StatsInner>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            inner: Mutex::new(StatsInner {
                total_requests: 0,
                failed_requests: 0,
                request_timestamps: VecDeque::with_capacity(TIMESTAMP_WINDOW),
            }),
        }
    }

    /// Records an inbound request: bumps the total count and appends the
    /// current timestamp to the bounded window.
    pub fn record_request_start(&self) {
        self.record_request_at(Instant::now());
    }

    pub(crate) fn record_request_at(&self, at: Instant) {
        let mut inner = self.inner.lock();
        inner.total_requests += 1;
        if inner.request_timestamps.len() == TIMESTAMP_WINDOW {
            inner.request_timestamps.pop_front();
        }
        inner.request_timestamps.push_back(at);
    }

    /// Records a failed request (no healthy backend, or a transport-level
    /// forwarding failure).
    pub fn record_failure(&self) {
        self.inner.lock().failed_requests += 1;
    }

    /// Builds an immutable snapshot; does not mutate any state.
    pub fn snapshot(&self, registry: &BackendRegistry) -> StatsSnapshot {
        let now = Instant::now();
        let (total_requests, failed_requests, requests_per_second) = {
            let inner = self.inner.lock();
            let recent = inner
                .request_timestamps
                .iter()
                .filter(|ts| now.duration_since(**ts) <= RATE_WINDOW)
                .count();
            (
                inner.total_requests,
                inner.failed_requests,
                recent as f64 / RATE_WINDOW.as_secs() as f64,
            )
        };

        let success_rate = (total_requests.saturating_sub(failed_requests)) as f64
            / total_requests.max(1) as f64
            * 100.0;

        let details = registry.snapshot_details();
        let healthy_servers = details.iter().filter(|d| d.healthy).count();
        let backend_servers = details.len();
        let server_details: BTreeMap<String, ServerDetail> = details
            .into_iter()
            .map(|d| {
                (
                    d.address,
                    ServerDetail {
                        healthy: d.healthy,
                        consecutive_failures: d.consecutive_failures,
                        avg_response_time_ms: d
                            .average_latency
                            .map(|l| round2(l.as_secs_f64() * 1000.0)),
                        last_check_seconds_ago: d
                            .last_checked_at
                            .map(|at| now.duration_since(at).as_secs()),
                    },
                )
            })
            .collect();

        StatsSnapshot {
            load_balancer: LoadBalancerStats {
                total_requests,
                failed_requests,
                success_rate: round2(success_rate),
                requests_per_second: round2(requests_per_second),
            },
            health_check: HealthCheckStats {
                backend_servers,
                healthy_servers,
                server_details,
            },
            uptime_seconds: self.started_at.elapsed().as_secs(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Zeroes the counters and clears the timestamp window. Backend
    /// health state is not touched.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.total_requests = 0;
        inner.failed_requests = 0;
        inner.request_timestamps.clear();
    }

    #[cfg(test)]
    fn window_len(&self) -> usize {
        self.inner.lock().request_timestamps.len()
    }
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Queryable stats snapshot returned by `/lb-stats`.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub load_balancer: LoadBalancerStats,
    pub health_check: HealthCheckStats,
    pub uptime_seconds: u64,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadBalancerStats {
    pub total_requests: u64,
    pub failed_requests: u64,
    pub success_rate: f64,
    pub requests_per_second: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckStats {
    pub backend_servers: usize,
    pub healthy_servers: usize,
    pub server_details: BTreeMap<String, ServerDetail>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerDetail {
    pub healthy: bool,
    pub consecutive_failures: u32,
    pub avg_response_time_ms: Option<f64>,
    /// Seconds since the last probe touched this backend; `None` until
    /// the first probe cycle.
    pub last_check_seconds_ago: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_registry() -> BackendRegistry {
        BackendRegistry::new(
            &["127.0.0.1:8001".to_string(), "127.0.0.1:8002".to_string()],
            3,
        )
    }

    #[test]
    fn requests_per_second_counts_trailing_window_only() {
        let stats = StatsCollector::new();
        let now = Instant::now();

        // Five stale entries outside the window, twelve inside.
        for _ in 0..5 {
            stats.record_request_at(now - Duration::from_secs(30));
        }
        for _ in 0..12 {
            stats.record_request_at(now - Duration::from_secs(2));
        }

        let snapshot = stats.snapshot(&test_registry());
        assert_eq!(snapshot.load_balancer.total_requests, 17);
        assert_eq!(snapshot.load_balancer.requests_per_second, 1.2);
    }

    #[test]
    fn success_rate_reflects_failed_over_total() {
        let stats = StatsCollector::new();
        for _ in 0..10 {
            stats.record_request_start();
        }
        stats.record_failure();
        stats.record_failure();

        let snapshot = stats.snapshot(&test_registry());
        assert_eq!(snapshot.load_balancer.failed_requests, 2);
        assert_eq!(snapshot.load_balancer.success_rate, 80.0);
    }

    #[test]
    fn success_rate_is_full_with_no_traffic() {
        let stats = StatsCollector::new();
        let snapshot = stats.snapshot(&test_registry());
        assert_eq!(snapshot.load_balancer.total_requests, 0);
        assert_eq!(snapshot.load_balancer.success_rate, 100.0);
        assert_eq!(snapshot.load_balancer.requests_per_second, 0.0);
    }

    #[test]
    fn timestamp_window_is_bounded() {
        let stats = StatsCollector::new();
        for _ in 0..250 {
            stats.record_request_start();
        }
        assert_eq!(stats.window_len(), 200);
        let snapshot = stats.snapshot(&test_registry());
        // the counter is not bounded, only the window is
        assert_eq!(snapshot.load_balancer.total_requests, 250);
    }

    #[test]
    fn reset_clears_counters_but_not_backend_health() {
        let registry = test_registry();
        for _ in 0..3 {
            registry.record_probe_result("127.0.0.1:8001", false);
        }
        assert_eq!(registry.healthy_count(), 1);

        let stats = StatsCollector::new();
        for _ in 0..5 {
            stats.record_request_start();
        }
        stats.record_failure();
        stats.reset();

        let snapshot = stats.snapshot(&registry);
        assert_eq!(snapshot.load_balancer.total_requests, 0);
        assert_eq!(snapshot.load_balancer.failed_requests, 0);
        assert_eq!(stats.window_len(), 0);
        // health flags survive a stats reset
        assert_eq!(snapshot.health_check.healthy_servers, 1);
        assert_eq!(snapshot.health_check.backend_servers, 2);
    }

    #[test]
    fn snapshot_reports_probe_recency_per_backend() {
        let registry = test_registry();
        registry.record_probe_result("127.0.0.1:8001", true);

        let stats = StatsCollector::new();
        let snapshot = stats.snapshot(&registry);
        let probed = &snapshot.health_check.server_details["127.0.0.1:8001"];
        assert_eq!(probed.last_check_seconds_ago, Some(0));
        let unprobed = &snapshot.health_check.server_details["127.0.0.1:8002"];
        assert_eq!(unprobed.last_check_seconds_ago, None);
    }

    #[test]
    fn snapshot_includes_per_backend_latency_averages() {
        let registry = test_registry();
        registry.record_latency("127.0.0.1:8001", Duration::from_millis(40));
        registry.record_latency("127.0.0.1:8001", Duration::from_millis(60));

        let stats = StatsCollector::new();
        let snapshot = stats.snapshot(&registry);
        let detail = &snapshot.health_check.server_details["127.0.0.1:8001"];
        assert_eq!(detail.avg_response_time_ms, Some(50.0));
        let untouched = &snapshot.health_check.server_details["127.0.0.1:8002"];
        assert_eq!(untouched.avg_response_time_ms, None);
    }
}
