//! Backend routing
//!
//! Classifies each request into a query type, maps the type to a primary
//! backend with an ordered fallback list, and tracks per-backend circuit
//! breakers so repeated failures skip straight to fallback.

mod breaker;
mod rules;

pub use breaker::{BreakerConfig, BreakerState, CircuitBreaker};
pub use rules::{BackendRoute, RouteRule, RouteTable};

use crate::models::{PredictionRequest, RouteDecision};
use dashmap::DashMap;
use std::sync::Arc;

/// Classifier plus per-backend breaker registry
pub struct BackendRouter {
    table: RouteTable,
    breaker_config: BreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl BackendRouter {
    pub fn new(table: RouteTable, breaker_config: BreakerConfig) -> Self {
        Self {
            table,
            breaker_config,
            breakers: DashMap::new(),
        }
    }

    /// Classify a request and select its backend route
    pub fn route(&self, request: &PredictionRequest) -> RouteDecision {
        let (query_type, reason) = self.table.classify(request);
        let route = self.table.route_for(query_type);
        RouteDecision {
            query_type,
            backend: route.primary.clone(),
            fallbacks: route.fallbacks.clone(),
            reason,
        }
    }

    fn breaker(&self, backend: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(backend.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(self.breaker_config.clone())))
            .clone()
    }

    /// Whether the breaker admits a call to this backend right now
    pub fn admit(&self, backend: &str) -> bool {
        self.breaker(backend).try_acquire()
    }

    pub fn record_success(&self, backend: &str) {
        self.breaker(backend).on_success();
    }

    /// Returns true exactly when this failure opened the breaker
    pub fn record_failure(&self, backend: &str) -> bool {
        self.breaker(backend).on_failure()
    }

    pub fn breaker_state(&self, backend: &str) -> BreakerState {
        self.breakers
            .get(backend)
            .map(|b| b.state())
            .unwrap_or(BreakerState::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QueryType;
    use std::time::Duration;

    fn router(threshold: u32, cooldown_ms: u64) -> BackendRouter {
        BackendRouter::new(
            RouteTable::standard(),
            BreakerConfig {
                failure_threshold: threshold,
                cooldown: Duration::from_millis(cooldown_ms),
            },
        )
    }

    #[test]
    fn test_route_includes_fallbacks_in_order() {
        let router = router(3, 1000);
        let request = PredictionRequest::new(vec!["AAPL".to_string()], "payout_rating");
        let decision = router.route(&request);

        assert_eq!(decision.query_type, QueryType::PayoutScore);
        let candidates: Vec<&str> = decision.candidates().collect();
        assert_eq!(candidates, vec!["ml-scoring", "llm-primary"]);
    }

    #[test]
    fn test_breaker_opens_after_consecutive_failures() {
        let router = router(3, 60_000);
        assert!(router.admit("ml-scoring"));

        assert!(!router.record_failure("ml-scoring"));
        assert!(!router.record_failure("ml-scoring"));
        assert!(router.record_failure("ml-scoring"));

        assert_eq!(router.breaker_state("ml-scoring"), BreakerState::Open);
        assert!(!router.admit("ml-scoring"));
        // Other backends are unaffected
        assert!(router.admit("llm-primary"));
    }

    #[test]
    fn test_success_closes_half_open_breaker() {
        let router = router(1, 10);
        router.record_failure("ml-forecast");
        assert!(!router.admit("ml-forecast"));

        std::thread::sleep(Duration::from_millis(30));
        assert!(router.admit("ml-forecast"));
        router.record_success("ml-forecast");
        assert_eq!(router.breaker_state("ml-forecast"), BreakerState::Closed);
    }

    #[test]
    fn test_unknown_backend_defaults_to_closed() {
        let router = router(3, 1000);
        assert_eq!(router.breaker_state("never-seen"), BreakerState::Closed);
    }
}
