use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Number of response-time samples kept per backend for averaging.
const LATENCY_WINDOW: usize = 10;

/// Health flip reported by [`BackendRegistry::record_probe_result`] so
/// callers can log at the transition boundaries only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthTransition {
    /// The backend crossed the consecutive-failure threshold.
    Demoted,
    /// A previously-unhealthy backend had a successful probe.
    Recovered,
}

/// One upstream server and its live health/latency bookkeeping.
///
/// The address is fixed at registration; everything else is mutated by the
/// health monitor and the forwarding path through the registry lock.
#[derive(Debug)]
struct BackendServer {
    address: String,
    healthy: bool,
    consecutive_failures: u32,
    last_checked_at: Option<Instant>,
    response_times: VecDeque<Duration>,
}

impl BackendServer {
    fn new(address: String) -> Self {
        Self {
            address,
            // Optimistic initial state, pending the first probe cycle.
            healthy: true,
            consecutive_failures: 0,
            last_checked_at: None,
            response_times: VecDeque::with_capacity(LATENCY_WINDOW),
        }
    }

    fn push_latency(&mut self, latency: Duration) {
        if self.response_times.len() == LATENCY_WINDOW {
            self.response_times.pop_front();
        }
        self.response_times.push_back(latency);
    }

    fn average_latency(&self) -> Option<Duration> {
        if self.response_times.is_empty() {
            return None;
        }
        let total: Duration = self.response_times.iter().sum();
        Some(total / self.response_times.len() as u32)
    }
}

/// Point-in-time view of one backend, used by the stats snapshot.
#[derive(Debug, Clone)]
pub struct BackendSnapshot {
    pub address: String,
    pub healthy: bool,
    pub consecutive_failures: u32,
    pub last_checked_at: Option<Instant>,
    pub average_latency: Option<Duration>,
}

struct RegistryInner {
    /// Configuration order; rotation follows this order.
    servers: Vec<BackendServer>,
    /// Monotonic rotation cursor. Taken modulo the healthy-subset size at
    /// selection time and never reset when membership changes.
    cursor: u64,
}

/// Shared pool of backend servers with round-robin selection over the
/// healthy subset.
///
/// One mutex guards both the health flags and the rotation cursor, so a
/// healthy-set read plus the cursor increment is atomic with respect to
/// concurrent selectors and the health monitor. The lock is never held
/// across a network call.
pub struct BackendRegistry {
    failure_threshold: u32,
    inner: Mutex<RegistryInner>,
}

impl BackendRegistry {
    pub fn new(addresses: &[String], failure_threshold: u32) -> Self {
        let servers = addresses
            .iter()
            .map(|address| BackendServer::new(address.clone()))
            .collect();
        Self {
            failure_threshold,
            inner: Mutex::new(RegistryInner { servers, cursor: 0 }),
        }
    }

    /// All registered addresses, in configuration order.
    pub fn addresses(&self) -> Vec<String> {
        let inner = self.inner.lock();
        inner.servers.iter().map(|s| s.address.clone()).collect()
    }

    /// Addresses currently marked healthy, in configuration order.
    pub fn healthy_snapshot(&self) -> Vec<String> {
        let inner = self.inner.lock();
        inner
            .servers
            .iter()
            .filter(|s| s.healthy)
            .map(|s| s.address.clone())
            .collect()
    }

    /// Picks the next healthy backend in rotation order, or `None` when
    /// the healthy set is empty.
    ///
    /// The cursor keeps counting across demotions and recoveries, so a
    /// membership change between two selections can transiently skew
    /// fairness. That is accepted behavior, not corrected.
    pub fn select_next(&self) -> Option<String> {
        let mut inner = self.inner.lock();
        let healthy: Vec<usize> = inner
            .servers
            .iter()
            .enumerate()
            .filter(|(_, s)| s.healthy)
            .map(|(i, _)| i)
            .collect();
        if healthy.is_empty() {
            return None;
        }
        let index = (inner.cursor % healthy.len() as u64) as usize;
        inner.cursor += 1;
        Some(inner.servers[healthy[index]].address.clone())
    }

    /// Applies one probe outcome to a backend.
    ///
    /// Success resets the failure counter and recovers the backend
    /// unconditionally; failure increments the counter and demotes only
    /// once it reaches the configured threshold. Returns the transition
    /// when the health flag actually flipped, `None` otherwise (including
    /// for unknown addresses).
    pub fn record_probe_result(&self, address: &str, success: bool) -> Option<HealthTransition> {
        let mut inner = self.inner.lock();
        let server = inner.servers.iter_mut().find(|s| s.address == address)?;
        server.last_checked_at = Some(Instant::now());

        if success {
            server.consecutive_failures = 0;
            if !server.healthy {
                server.healthy = true;
                return Some(HealthTransition::Recovered);
            }
            None
        } else {
            server.consecutive_failures += 1;
            if server.healthy && server.consecutive_failures >= self.failure_threshold {
                server.healthy = false;
                return Some(HealthTransition::Demoted);
            }
            None
        }
    }

    /// Records one forwarded-request latency sample for a backend.
    pub fn record_latency(&self, address: &str, latency: Duration) {
        let mut inner = self.inner.lock();
        if let Some(server) = inner.servers.iter_mut().find(|s| s.address == address) {
            server.push_latency(latency);
        }
    }

    /// Per-backend snapshots in configuration order.
    pub fn snapshot_details(&self) -> Vec<BackendSnapshot> {
        let inner = self.inner.lock();
        inner
            .servers
            .iter()
            .map(|s| BackendSnapshot {
                address: s.address.clone(),
                healthy: s.healthy,
                consecutive_failures: s.consecutive_failures,
                last_checked_at: s.last_checked_at,
                average_latency: s.average_latency(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().servers.is_empty()
    }

    pub fn healthy_count(&self) -> usize {
        self.inner.lock().servers.iter().filter(|s| s.healthy).count()
    }
}
