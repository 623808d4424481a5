//! Backend adapter contract and registry
//!
//! Adapters wrap the actual LLM/ML wire clients, which live outside this
//! crate. The registry owns one slot per backend with a concurrency
//! semaphore and a per-call timeout, so one backend's overload cannot
//! starve the others.

use crate::error::BackendError;
use crate::models::{PredictionRequest, RawPrediction};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Default per-call timeout (the recommended range is 5-15s)
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Default per-backend concurrency bound
pub const DEFAULT_MAX_CONCURRENCY: usize = 32;

/// Contract every prediction backend implements
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Stable backend id used by the router and circuit breakers
    fn id(&self) -> &str;

    /// Issue one prediction call. The registry applies the timeout.
    async fn call(&self, request: &PredictionRequest) -> Result<RawPrediction, BackendError>;
}

struct BackendSlot {
    adapter: Arc<dyn BackendAdapter>,
    limiter: Arc<Semaphore>,
    call_timeout: Duration,
}

/// Registered backends keyed by id
pub struct BackendRegistry {
    slots: HashMap<String, BackendSlot>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            slots: HashMap::new(),
        }
    }

    /// Register an adapter with default timeout and concurrency
    pub fn register(&mut self, adapter: Arc<dyn BackendAdapter>) {
        self.register_with(adapter, DEFAULT_CALL_TIMEOUT, DEFAULT_MAX_CONCURRENCY);
    }

    /// Register an adapter with explicit timeout and concurrency bound
    pub fn register_with(
        &mut self,
        adapter: Arc<dyn BackendAdapter>,
        call_timeout: Duration,
        max_concurrency: usize,
    ) {
        let id = adapter.id().to_string();
        self.slots.insert(
            id,
            BackendSlot {
                adapter,
                limiter: Arc::new(Semaphore::new(max_concurrency.max(1))),
                call_timeout,
            },
        );
    }

    pub fn contains(&self, id: &str) -> bool {
        self.slots.contains_key(id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.slots.keys().map(|s| s.as_str()).collect()
    }

    /// Call the named backend with its concurrency bound and timeout
    pub async fn call(
        &self,
        id: &str,
        request: &PredictionRequest,
    ) -> Result<RawPrediction, BackendError> {
        let slot = self.slots.get(id).ok_or_else(|| BackendError::Unavailable {
            backend: id.to_string(),
            reason: "no adapter registered".to_string(),
        })?;

        let _permit =
            slot.limiter
                .acquire()
                .await
                .map_err(|_| BackendError::Unavailable {
                    backend: id.to_string(),
                    reason: "concurrency limiter closed".to_string(),
                })?;

        match tokio::time::timeout(slot.call_timeout, slot.adapter.call(request)).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout {
                backend: id.to_string(),
                timeout_ms: slot.call_timeout.as_millis() as u64,
            }),
        }
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubBackend {
        id: String,
        value: f64,
        delay: Duration,
        concurrent: Arc<AtomicUsize>,
        max_concurrent: Arc<AtomicUsize>,
    }

    impl StubBackend {
        fn new(id: &str, value: f64, delay: Duration) -> Self {
            Self {
                id: id.to_string(),
                value,
                delay,
                concurrent: Arc::new(AtomicUsize::new(0)),
                max_concurrent: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl BackendAdapter for StubBackend {
        fn id(&self) -> &str {
            &self.id
        }

        async fn call(&self, _request: &PredictionRequest) -> Result<RawPrediction, BackendError> {
            let now = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_concurrent.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.concurrent.fetch_sub(1, Ordering::SeqCst);
            Ok(RawPrediction {
                value: self.value,
                unit: None,
                narrative: None,
                model_confidence: Some(0.9),
                model_version: "stub-v1".to_string(),
            })
        }
    }

    fn request() -> PredictionRequest {
        PredictionRequest::new(vec!["AAPL".to_string()], "payout_rating")
    }

    #[tokio::test]
    async fn test_call_registered_backend() {
        let mut registry = BackendRegistry::new();
        registry.register(Arc::new(StubBackend::new("b1", 7.0, Duration::ZERO)));

        let raw = registry.call("b1", &request()).await.unwrap();
        assert_eq!(raw.value, 7.0);
    }

    #[tokio::test]
    async fn test_unknown_backend_is_unavailable() {
        let registry = BackendRegistry::new();
        let err = registry.call("nope", &request()).await.unwrap_err();
        assert!(matches!(err, BackendError::Unavailable { .. }));
        assert_eq!(err.backend(), "nope");
    }

    #[tokio::test]
    async fn test_slow_backend_times_out() {
        let mut registry = BackendRegistry::new();
        registry.register_with(
            Arc::new(StubBackend::new("slow", 1.0, Duration::from_millis(100))),
            Duration::from_millis(10),
            4,
        );

        let err = registry.call("slow", &request()).await.unwrap_err();
        assert!(matches!(err, BackendError::Timeout { .. }));
        assert_eq!(err.kind(), "timeout");
    }

    #[tokio::test]
    async fn test_semaphore_bounds_concurrency() {
        let adapter = Arc::new(StubBackend::new("bounded", 1.0, Duration::from_millis(20)));
        let max_seen = Arc::clone(&adapter.max_concurrent);

        let mut registry = BackendRegistry::new();
        registry.register_with(adapter, Duration::from_secs(5), 2);
        let registry = Arc::new(registry);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                registry.call("bounded", &request()).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }
}
