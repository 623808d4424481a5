//! Observability infrastructure for the prediction gateway
//!
//! Provides:
//! - Prometheus metrics (request/backend latency, cache hits by tier,
//!   breaker trips, validation skips, audit drops)
//! - Structured JSON logging with tracing

use crate::models::CacheTier;
use prometheus::{
    register_gauge_vec, register_histogram, register_int_gauge, GaugeVec, Histogram, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for latency measurements (in seconds)
///
/// Backend calls can legitimately take several seconds, so the buckets
/// run out to the 30s timeout ceiling.
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<GatewayMetricsInner> = OnceLock::new();

struct GatewayMetricsInner {
    request_latency_seconds: Histogram,
    backend_latency_seconds: Histogram,
    requests_total: IntGauge,
    producer_runs_total: IntGauge,
    cache_hits_total: GaugeVec,
    backend_failures_total: GaugeVec,
    breaker_opens_total: GaugeVec,
    validations_skipped_total: IntGauge,
    audit_drops_total: IntGauge,
    in_flight_requests: IntGauge,
}

impl GatewayMetricsInner {
    fn new() -> Self {
        Self {
            request_latency_seconds: register_histogram!(
                "prediction_gateway_request_latency_seconds",
                "End-to-end time serving one prediction request",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register request_latency_seconds"),

            backend_latency_seconds: register_histogram!(
                "prediction_gateway_backend_latency_seconds",
                "Time spent in a single backend adapter call",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register backend_latency_seconds"),

            requests_total: register_int_gauge!(
                "prediction_gateway_requests_total",
                "Total prediction requests received"
            )
            .expect("Failed to register requests_total"),

            producer_runs_total: register_int_gauge!(
                "prediction_gateway_producer_runs_total",
                "Units of backend work actually executed (requests minus coalesced joiners and cache hits still count one run)"
            )
            .expect("Failed to register producer_runs_total"),

            cache_hits_total: register_gauge_vec!(
                "prediction_gateway_cache_hits_total",
                "Cache hits by tier",
                &["tier"]
            )
            .expect("Failed to register cache_hits_total"),

            backend_failures_total: register_gauge_vec!(
                "prediction_gateway_backend_failures_total",
                "Backend call failures by backend and error kind",
                &["backend", "kind"]
            )
            .expect("Failed to register backend_failures_total"),

            breaker_opens_total: register_gauge_vec!(
                "prediction_gateway_breaker_opens_total",
                "Circuit breaker open transitions by backend",
                &["backend"]
            )
            .expect("Failed to register breaker_opens_total"),

            validations_skipped_total: register_int_gauge!(
                "prediction_gateway_validations_skipped_total",
                "Results returned unvalidated because the daily budget was exhausted"
            )
            .expect("Failed to register validations_skipped_total"),

            audit_drops_total: register_int_gauge!(
                "prediction_gateway_audit_drops_total",
                "Audit records dropped because the channel was full"
            )
            .expect("Failed to register audit_drops_total"),

            in_flight_requests: register_int_gauge!(
                "prediction_gateway_in_flight_requests",
                "Distinct fingerprints currently in flight"
            )
            .expect("Failed to register in_flight_requests"),
        }
    }
}

/// Gateway metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct GatewayMetrics {
    _private: (),
}

impl Default for GatewayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(GatewayMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &GatewayMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_request_latency(&self, duration_secs: f64) {
        self.inner().request_latency_seconds.observe(duration_secs);
    }

    pub fn observe_backend_latency(&self, duration_secs: f64) {
        self.inner().backend_latency_seconds.observe(duration_secs);
    }

    pub fn inc_requests(&self) {
        self.inner().requests_total.inc();
    }

    pub fn inc_producer_runs(&self) {
        self.inner().producer_runs_total.inc();
    }

    pub fn inc_cache_hit(&self, tier: CacheTier) {
        self.inner()
            .cache_hits_total
            .with_label_values(&[tier.as_str()])
            .inc();
    }

    pub fn inc_backend_failure(&self, backend: &str, kind: &str) {
        self.inner()
            .backend_failures_total
            .with_label_values(&[backend, kind])
            .inc();
    }

    pub fn inc_breaker_open(&self, backend: &str) {
        self.inner()
            .breaker_opens_total
            .with_label_values(&[backend])
            .inc();
    }

    pub fn inc_validations_skipped(&self) {
        self.inner().validations_skipped_total.inc();
    }

    pub fn inc_audit_drops(&self) {
        self.inner().audit_drops_total.inc();
    }

    pub fn set_in_flight(&self, count: i64) {
        self.inner().in_flight_requests.set(count);
    }
}

/// Structured logger for gateway events
///
/// Provides consistent JSON-formatted logging for served predictions,
/// backend failures, breaker transitions, and lifecycle events.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    /// Log a served prediction
    pub fn log_request_served(
        &self,
        fingerprint: &str,
        origin: &str,
        verdict: &str,
        confidence: f32,
        latency_ms: u64,
    ) {
        info!(
            event = "prediction_served",
            instance = %self.instance,
            fingerprint = %fingerprint,
            origin = %origin,
            verdict = %verdict,
            confidence = confidence,
            latency_ms = latency_ms,
            "Prediction served"
        );
    }

    /// Log a routing decision
    pub fn log_route(&self, fingerprint: &str, query_type: &str, backend: &str, reason: &str) {
        info!(
            event = "request_routed",
            instance = %self.instance,
            fingerprint = %fingerprint,
            query_type = %query_type,
            backend = %backend,
            reason = %reason,
            "Request routed"
        );
    }

    /// Log a failed backend call
    pub fn log_backend_failure(&self, backend: &str, kind: &str, detail: &str) {
        warn!(
            event = "backend_failure",
            instance = %self.instance,
            backend = %backend,
            kind = %kind,
            detail = %detail,
            "Backend call failed, advancing to fallback"
        );
    }

    /// Log a breaker opening for a backend
    pub fn log_breaker_opened(&self, backend: &str) {
        warn!(
            event = "breaker_opened",
            instance = %self.instance,
            backend = %backend,
            "Circuit breaker opened, routing to fallback until cool-down"
        );
    }

    /// Log a validation skipped by the daily budget
    pub fn log_validation_skipped(&self, fingerprint: &str) {
        warn!(
            event = "validation_skipped",
            instance = %self.instance,
            fingerprint = %fingerprint,
            "Daily validation budget exhausted, result returned unvalidated"
        );
    }

    /// Log gateway startup
    pub fn log_startup(&self, version: &str) {
        info!(
            event = "gateway_started",
            instance = %self.instance,
            gateway_version = %version,
            "Prediction gateway started"
        );
    }

    /// Log gateway shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "gateway_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Prediction gateway shutting down"
        );
    }
}
