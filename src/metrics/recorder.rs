//! Metrics recording implementation using Prometheus.

use prometheus::{
    register_counter_vec_with_registry, register_histogram_vec_with_registry, CounterVec, Encoder,
    HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Trait for recording session metrics.
pub trait MetricsRecorder: Clone + Send + Sync + 'static {
    /// Records a login attempt with its outcome.
    fn record_login_attempt(&self, result: &str);

    /// Records a refresh call issued to the backend.
    fn record_token_refresh(&self, result: &str, duration_secs: f64);

    /// Records a caller that got its tokens without issuing a refresh call.
    fn record_refresh_coalesced(&self, source: &str);

    /// Records a request re-issued after a 401, by the status of the retry.
    fn record_request_retry(&self, status: u16);

    fn record_guard_decision(&self, decision: &str);
}

/// Prometheus metrics collector.
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,

    login_attempts_total: CounterVec,

    token_refresh_total: CounterVec,
    token_refresh_duration_seconds: HistogramVec,
    token_refresh_coalesced_total: CounterVec,

    request_retries_total: CounterVec,
    route_guard_decisions_total: CounterVec,
}

impl Metrics {
    /// Creates a new metrics instance with its own Prometheus registry.
    pub fn new() -> Self {
        let registry = Arc::new(Registry::new());

        let login_attempts_total = register_counter_vec_with_registry!(
            Opts::new("portal_login_attempts_total", "Total number of login attempts"),
            &["result"],
            registry.clone()
        )
        .expect("Failed to register portal_login_attempts_total");

        let token_refresh_total = register_counter_vec_with_registry!(
            Opts::new(
                "portal_token_refresh_total",
                "Refresh calls issued to the identity backend"
            ),
            &["result"],
            registry.clone()
        )
        .expect("Failed to register portal_token_refresh_total");

        let token_refresh_duration_seconds = register_histogram_vec_with_registry!(
            "portal_token_refresh_duration_seconds",
            "Refresh call duration in seconds",
            &["result"],
            vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
            registry.clone()
        )
        .expect("Failed to register portal_token_refresh_duration_seconds");

        let token_refresh_coalesced_total = register_counter_vec_with_registry!(
            Opts::new(
                "portal_token_refresh_coalesced_total",
                "Callers served by another caller's refresh"
            ),
            &["source"],
            registry.clone()
        )
        .expect("Failed to register portal_token_refresh_coalesced_total");

        let request_retries_total = register_counter_vec_with_registry!(
            Opts::new(
                "portal_request_retries_total",
                "Requests re-issued after a 401 and a refresh"
            ),
            &["status"],
            registry.clone()
        )
        .expect("Failed to register portal_request_retries_total");

        let route_guard_decisions_total = register_counter_vec_with_registry!(
            Opts::new(
                "portal_route_guard_decisions_total",
                "Route guard decisions for page navigations"
            ),
            &["decision"],
            registry.clone()
        )
        .expect("Failed to register portal_route_guard_decisions_total");

        Metrics {
            registry,
            login_attempts_total,
            token_refresh_total,
            token_refresh_duration_seconds,
            token_refresh_coalesced_total,
            request_retries_total,
            route_guard_decisions_total,
        }
    }

    /// Renders all metrics in Prometheus text format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!("Failed to encode metrics: {}", e);
            return String::new();
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRecorder for Metrics {
    fn record_login_attempt(&self, result: &str) {
        self.login_attempts_total.with_label_values(&[result]).inc();
    }

    fn record_token_refresh(&self, result: &str, duration_secs: f64) {
        self.token_refresh_total.with_label_values(&[result]).inc();
        self.token_refresh_duration_seconds
            .with_label_values(&[result])
            .observe(duration_secs);
    }

    fn record_refresh_coalesced(&self, source: &str) {
        self.token_refresh_coalesced_total
            .with_label_values(&[source])
            .inc();
    }

    fn record_request_retry(&self, status: u16) {
        let status = status.to_string();
        self.request_retries_total
            .with_label_values(&[status.as_str()])
            .inc();
    }

    fn record_guard_decision(&self, decision: &str) {
        self.route_guard_decisions_total
            .with_label_values(&[decision])
            .inc();
    }
}
