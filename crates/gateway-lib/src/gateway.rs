//! Prediction gateway orchestrator
//!
//! Ties the pipeline together: fingerprint -> coalesce -> cache lookup ->
//! route -> backend call (with breaker and timeout) -> validate ->
//! write-through cache -> audit -> respond. Every exit path records
//! exactly one audit record.

use crate::audit::{AuditRecorder, AuditSink};
use crate::backend::BackendRegistry;
use crate::cache::CacheManager;
use crate::coalesce::RequestCoalescer;
use crate::error::{BackendError, GatewayError};
use crate::fingerprint::{Fingerprint, Fingerprinter};
use crate::models::{
    AuditRecord, CacheOutcome, PredictionRequest, PredictionResult, RequestOutcome, ResultOrigin,
};
use crate::observability::{GatewayMetrics, StructuredLogger};
use crate::router::BackendRouter;
use crate::validator::ResultValidator;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Entry point consumed by the chat/API layer
///
/// Cheap to clone; all heavyweight state is shared behind Arcs. Built at
/// startup and injected wherever requests arrive.
#[derive(Clone)]
pub struct PredictionGateway {
    fingerprinter: Fingerprinter,
    coalescer: RequestCoalescer,
    cache: Arc<CacheManager>,
    router: Arc<BackendRouter>,
    backends: Arc<BackendRegistry>,
    validator: Arc<ResultValidator>,
    audit: AuditRecorder,
    metrics: GatewayMetrics,
    logger: StructuredLogger,
}

impl PredictionGateway {
    pub fn new(
        cache: Arc<CacheManager>,
        router: Arc<BackendRouter>,
        backends: Arc<BackendRegistry>,
        validator: Arc<ResultValidator>,
        audit_sink: Arc<dyn AuditSink>,
        logger: StructuredLogger,
    ) -> Self {
        let metrics = GatewayMetrics::new();
        Self {
            fingerprinter: Fingerprinter::new(),
            coalescer: RequestCoalescer::new(),
            cache,
            router,
            backends,
            validator,
            audit: AuditRecorder::spawn(audit_sink, metrics.clone()),
            metrics,
            logger,
        }
    }

    /// Serve one prediction request
    ///
    /// Concurrent identical requests are coalesced into a single unit of
    /// backend work; all callers receive the same result or error.
    pub async fn request(
        &self,
        request: PredictionRequest,
    ) -> Result<PredictionResult, GatewayError> {
        self.metrics.inc_requests();
        let fingerprint = self.fingerprinter.fingerprint(&request);

        let this = self.clone();
        let producer_fp = fingerprint.clone();
        let outcome = self
            .coalescer
            .coalesce(fingerprint, async move {
                this.produce(producer_fp, request).await
            })
            .await;

        self.metrics
            .set_in_flight(self.coalescer.in_flight() as i64);
        outcome
    }

    /// The unit of work run once per coalesced fingerprint
    async fn produce(
        self,
        fingerprint: Fingerprint,
        request: PredictionRequest,
    ) -> Result<PredictionResult, GatewayError> {
        let started = Instant::now();
        self.metrics.inc_producer_runs();

        // Cache lookup; a hit at any tier short-circuits the backends
        if let Some((entry, tier)) = self.cache.get(&fingerprint).await {
            let latency_ms = started.elapsed().as_millis() as u64;
            self.metrics.inc_cache_hit(tier);
            self.metrics
                .observe_request_latency(started.elapsed().as_secs_f64());

            let mut result = entry.result;
            result.origin = ResultOrigin::Cache(tier);
            result.latency_ms = latency_ms;

            self.audit.record(AuditRecord {
                fingerprint: fingerprint.clone(),
                cache: CacheOutcome::Hit(tier),
                route: None,
                evaluation: Some(result.evaluation.clone()),
                outcome: RequestOutcome::Success,
                latency_ms,
                timestamp: chrono::Utc::now().timestamp(),
            });
            self.logger.log_request_served(
                fingerprint.as_str(),
                tier.as_str(),
                result.evaluation.verdict.as_str(),
                result.evaluation.confidence,
                latency_ms,
            );
            return Ok(result);
        }

        let decision = self.router.route(&request);
        self.logger.log_route(
            fingerprint.as_str(),
            decision.query_type.as_str(),
            &decision.backend,
            &decision.reason,
        );

        let candidates: Vec<String> = decision.candidates().map(str::to_string).collect();
        let mut last_error: Option<BackendError> = None;

        for backend in &candidates {
            if !self.router.admit(backend) {
                debug!(backend = %backend, "Circuit breaker open, skipping to fallback");
                continue;
            }

            let call_started = Instant::now();
            match self.backends.call(backend, &request).await {
                Ok(raw) => {
                    self.metrics
                        .observe_backend_latency(call_started.elapsed().as_secs_f64());
                    self.router.record_success(backend);

                    let evaluation = self.validator.evaluate(&request, decision.query_type, &raw);
                    if evaluation.unvalidated {
                        self.metrics.inc_validations_skipped();
                        self.logger.log_validation_skipped(fingerprint.as_str());
                    }

                    let latency_ms = started.elapsed().as_millis() as u64;
                    let result = PredictionResult {
                        fingerprint: fingerprint.clone(),
                        query_type: decision.query_type,
                        prediction: raw,
                        evaluation: evaluation.clone(),
                        origin: ResultOrigin::Backend(backend.clone()),
                        generated_at: chrono::Utc::now().timestamp_millis(),
                        latency_ms,
                    };

                    self.cache.put(&fingerprint, &result).await;
                    self.metrics
                        .observe_request_latency(started.elapsed().as_secs_f64());
                    self.audit.record(AuditRecord {
                        fingerprint: fingerprint.clone(),
                        cache: CacheOutcome::Miss,
                        route: Some(decision.clone()),
                        evaluation: Some(evaluation.clone()),
                        outcome: RequestOutcome::Success,
                        latency_ms,
                        timestamp: chrono::Utc::now().timestamp(),
                    });
                    self.logger.log_request_served(
                        fingerprint.as_str(),
                        backend,
                        evaluation.verdict.as_str(),
                        evaluation.confidence,
                        latency_ms,
                    );
                    return Ok(result);
                }
                Err(e) => {
                    self.metrics.inc_backend_failure(backend, e.kind());
                    self.logger
                        .log_backend_failure(backend, e.kind(), &e.to_string());
                    if self.router.record_failure(backend) {
                        self.metrics.inc_breaker_open(backend);
                        self.logger.log_breaker_opened(backend);
                    }
                    last_error = Some(e);
                }
            }
        }

        let last = last_error.unwrap_or_else(|| BackendError::Unavailable {
            backend: decision.backend.clone(),
            reason: "no backend admitted the request".to_string(),
        });
        let error = GatewayError::AllBackendsExhausted { last };
        let latency_ms = started.elapsed().as_millis() as u64;

        self.metrics
            .observe_request_latency(started.elapsed().as_secs_f64());
        self.audit.record(AuditRecord {
            fingerprint,
            cache: CacheOutcome::Miss,
            route: Some(decision),
            evaluation: None,
            outcome: RequestOutcome::Error(error.kind().to_string()),
            latency_ms,
            timestamp: chrono::Utc::now().timestamp(),
        });
        Err(error)
    }

    /// Number of distinct fingerprints currently in flight
    pub fn in_flight(&self) -> usize {
        self.coalescer.in_flight()
    }

    /// Remaining validation budget today
    pub fn validation_budget_remaining(&self) -> u32 {
        self.validator.budget_remaining()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemorySink;
    use crate::backend::BackendAdapter;
    use crate::cache::{CacheConfig, MemoryTier};
    use crate::models::RawPrediction;
    use crate::router::{BreakerConfig, RouteTable};
    use crate::validator::{ResultValidator, ValidatorConfig};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FakeBackend {
        id: String,
        value: f64,
        fail: bool,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl FakeBackend {
        fn ok(id: &str, value: f64) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                value,
                fail: false,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            })
        }

        fn slow(id: &str, value: f64, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                value,
                fail: false,
                delay,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(id: &str) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                value: 0.0,
                fail: true,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BackendAdapter for FakeBackend {
        fn id(&self) -> &str {
            &self.id
        }

        async fn call(&self, _request: &PredictionRequest) -> Result<RawPrediction, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(BackendError::Unavailable {
                    backend: self.id.clone(),
                    reason: "fake outage".to_string(),
                });
            }
            Ok(RawPrediction {
                value: self.value,
                unit: Some("score".to_string()),
                narrative: None,
                model_confidence: Some(0.9),
                model_version: "fake-v1".to_string(),
            })
        }
    }

    struct TestHarness {
        gateway: PredictionGateway,
        sink: Arc<MemorySink>,
    }

    fn harness(adapters: Vec<Arc<FakeBackend>>, l1_ttl: Duration) -> TestHarness {
        harness_with_tiers(adapters, l1_ttl, true)
    }

    fn harness_with_tiers(
        adapters: Vec<Arc<FakeBackend>>,
        l1_ttl: Duration,
        with_l2: bool,
    ) -> TestHarness {
        let l2: Option<Arc<dyn crate::cache::TierClient>> = if with_l2 {
            Some(Arc::new(MemoryTier::new()))
        } else {
            None
        };
        let cache = Arc::new(CacheManager::new(
            CacheConfig {
                l1_capacity: 64,
                l1_ttl,
                l2_ttl: Duration::from_secs(60),
                l3_ttl: Duration::from_secs(120),
            },
            l2,
            None,
        ));
        let router = Arc::new(BackendRouter::new(
            RouteTable::standard(),
            BreakerConfig {
                failure_threshold: 3,
                cooldown: Duration::from_secs(60),
            },
        ));
        let mut registry = BackendRegistry::new();
        for adapter in adapters {
            registry.register(adapter);
        }
        let validator = Arc::new(ResultValidator::new(ValidatorConfig::default()));
        let sink = Arc::new(MemorySink::new());
        let gateway = PredictionGateway::new(
            cache,
            router,
            Arc::new(registry),
            validator,
            sink.clone(),
            StructuredLogger::new("gw-test"),
        );
        TestHarness { gateway, sink }
    }

    fn payout_request(subject: &str) -> PredictionRequest {
        PredictionRequest::new(vec![subject.to_string()], "payout_rating")
    }

    async fn wait_for_audit(sink: &Arc<MemorySink>, expected: usize) {
        for _ in 0..200 {
            if sink.len() >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("expected {} audit records, got {}", expected, sink.len());
    }

    #[tokio::test]
    async fn test_success_path_writes_one_audit_record() {
        let scoring = FakeBackend::ok("ml-scoring", 7.5);
        let h = harness(vec![scoring.clone()], Duration::from_secs(60));

        let result = h.gateway.request(payout_request("AAPL")).await.unwrap();
        assert_eq!(result.prediction.value, 7.5);
        assert_eq!(result.origin, ResultOrigin::Backend("ml-scoring".to_string()));

        wait_for_audit(&h.sink, 1).await;
        let records = h.sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].cache, CacheOutcome::Miss);
        assert_eq!(records[0].outcome, RequestOutcome::Success);
        assert!(records[0].route.is_some());
    }

    #[tokio::test]
    async fn test_cache_hit_never_calls_backend() {
        let scoring = FakeBackend::ok("ml-scoring", 7.5);
        let h = harness(vec![scoring.clone()], Duration::from_secs(60));

        h.gateway.request(payout_request("AAPL")).await.unwrap();
        let second = h.gateway.request(payout_request("AAPL")).await.unwrap();

        assert_eq!(scoring.calls(), 1);
        assert!(matches!(second.origin, ResultOrigin::Cache(_)));

        // Two transactions, two audit records, only one non-cache origin
        wait_for_audit(&h.sink, 2).await;
        let misses = h
            .sink
            .records()
            .iter()
            .filter(|r| r.cache == CacheOutcome::Miss)
            .count();
        assert_eq!(misses, 1);
    }

    #[tokio::test]
    async fn test_concurrent_identical_requests_call_backend_once() {
        let scoring = FakeBackend::slow("ml-scoring", 8.0, Duration::from_millis(50));
        let h = harness(vec![scoring.clone()], Duration::from_secs(60));

        let g1 = h.gateway.clone();
        let g2 = h.gateway.clone();
        let first = tokio::spawn(async move { g1.request(payout_request("AAPL")).await });
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = tokio::spawn(async move { g2.request(payout_request("AAPL")).await });

        let a = first.await.unwrap().unwrap();
        let b = second.await.unwrap().unwrap();

        assert_eq!(scoring.calls(), 1);
        assert_eq!(a.prediction.value, b.prediction.value);
        assert_eq!(a.generated_at, b.generated_at);

        // Only the single producer run recorded a transaction
        wait_for_audit(&h.sink, 1).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(h.sink.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_primary_falls_back_without_reclassifying() {
        let scoring = FakeBackend::failing("ml-scoring");
        let llm = FakeBackend::ok("llm-primary", 6.0);
        let h = harness(vec![scoring.clone(), llm.clone()], Duration::from_secs(60));

        let result = h.gateway.request(payout_request("AAPL")).await.unwrap();
        assert_eq!(result.origin, ResultOrigin::Backend("llm-primary".to_string()));
        assert_eq!(scoring.calls(), 1);
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_open_breaker_skips_failed_backend() {
        let scoring = FakeBackend::failing("ml-scoring");
        let llm = FakeBackend::ok("llm-primary", 6.0);
        let h = harness(vec![scoring.clone(), llm.clone()], Duration::from_secs(60));

        // Three distinct requests trip the breaker (threshold 3)
        for subject in ["AAPL", "MSFT", "TSLA"] {
            h.gateway.request(payout_request(subject)).await.unwrap();
        }
        assert_eq!(scoring.calls(), 3);

        // Fourth request goes straight to fallback without touching the
        // failed backend
        let result = h.gateway.request(payout_request("NVDA")).await.unwrap();
        assert_eq!(result.origin, ResultOrigin::Backend("llm-primary".to_string()));
        assert_eq!(scoring.calls(), 3);
    }

    #[tokio::test]
    async fn test_all_backends_exhausted_surfaces_last_error() {
        let scoring = FakeBackend::failing("ml-scoring");
        let llm = FakeBackend::failing("llm-primary");
        let h = harness(vec![scoring, llm], Duration::from_secs(60));

        let err = h.gateway.request(payout_request("AAPL")).await.unwrap_err();
        match err {
            GatewayError::AllBackendsExhausted { last } => {
                assert_eq!(last.backend(), "llm-primary");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        wait_for_audit(&h.sink, 1).await;
        let records = h.sink.records();
        assert!(matches!(records[0].outcome, RequestOutcome::Error(_)));
    }

    #[tokio::test]
    async fn test_expired_entry_triggers_fresh_backend_call() {
        let scoring = FakeBackend::ok("ml-scoring", 7.5);
        let h = harness_with_tiers(vec![scoring.clone()], Duration::from_millis(20), false);

        h.gateway.request(payout_request("AAPL")).await.unwrap();
        assert_eq!(scoring.calls(), 1);

        // With no outer tiers, an expired L1 entry means a fresh call
        tokio::time::sleep(Duration::from_millis(50)).await;
        h.gateway.request(payout_request("AAPL")).await.unwrap();
        assert_eq!(scoring.calls(), 2);
    }

    #[tokio::test]
    async fn test_l2_hit_after_l1_expiry() {
        let scoring = FakeBackend::ok("ml-scoring", 7.5);
        let h = harness(vec![scoring.clone()], Duration::from_millis(20));

        h.gateway.request(payout_request("AAPL")).await.unwrap();
        assert_eq!(scoring.calls(), 1);

        // L1 expires but the background L2 write (60s TTL) still serves
        // the value, which is promoted back into L1
        tokio::time::sleep(Duration::from_millis(50)).await;
        let second = h.gateway.request(payout_request("AAPL")).await.unwrap();
        assert_eq!(scoring.calls(), 1);
        assert_eq!(
            second.origin,
            ResultOrigin::Cache(crate::models::CacheTier::L2)
        );
    }
}
