//! Request coalescing
//!
//! Deduplicates concurrent identical in-flight requests: the first caller
//! for a fingerprint runs the producer, every later caller joins the
//! waiter set and receives the same outcome. This is what turns N
//! concurrent identical requests into exactly one backend call.
//!
//! The in-flight map is the only mutex-protected shared state in the
//! crate; the lock is held only for map operations, never across awaits.

use crate::error::GatewayError;
use crate::fingerprint::Fingerprint;
use crate::models::PredictionResult;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::debug;

type Outcome = Result<PredictionResult, GatewayError>;

/// One in-flight request and the callers waiting on it
struct InFlight {
    waiters: Vec<oneshot::Sender<Outcome>>,
    live_waiters: Arc<AtomicUsize>,
    cancelled: Arc<AtomicBool>,
    started_at: Instant,
}

/// Merges concurrent duplicate requests into a single unit of work
#[derive(Clone)]
pub struct RequestCoalescer {
    in_flight: Arc<Mutex<HashMap<Fingerprint, InFlight>>>,
}

impl RequestCoalescer {
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Join or start the in-flight request for `fingerprint`
    ///
    /// If an entry exists the caller blocks until the running producer
    /// resolves and receives its outcome; otherwise the caller claims the
    /// entry and the producer runs as a detached task so that no single
    /// caller's cancellation can tear down the shared work. When the
    /// producer fails, every waiter receives the same error.
    pub async fn coalesce<F>(&self, fingerprint: Fingerprint, producer: F) -> Outcome
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        let (rx, mut guard, leader) = {
            let mut map = lock(&self.in_flight);
            match map.get_mut(&fingerprint) {
                Some(entry) => {
                    let (tx, rx) = oneshot::channel();
                    entry.waiters.push(tx);
                    entry.live_waiters.fetch_add(1, Ordering::SeqCst);
                    let guard = WaiterGuard::new(&entry.live_waiters, &entry.cancelled);
                    (rx, guard, false)
                }
                None => {
                    let (tx, rx) = oneshot::channel();
                    let live_waiters = Arc::new(AtomicUsize::new(1));
                    let cancelled = Arc::new(AtomicBool::new(false));
                    let guard = WaiterGuard::new(&live_waiters, &cancelled);
                    map.insert(
                        fingerprint.clone(),
                        InFlight {
                            waiters: vec![tx],
                            live_waiters,
                            cancelled,
                            started_at: Instant::now(),
                        },
                    );
                    (rx, guard, true)
                }
            }
        };

        if leader {
            let map = Arc::clone(&self.in_flight);
            let fp = fingerprint.clone();
            tokio::spawn(async move {
                let outcome = producer.await;
                // The entry is destroyed the instant the producer resolves;
                // waiters that joined during execution are all notified here.
                let entry = lock(&map).remove(&fp);
                if let Some(entry) = entry {
                    if entry.cancelled.load(Ordering::SeqCst) {
                        debug!(
                            fingerprint = %fp,
                            elapsed_ms = entry.started_at.elapsed().as_millis() as u64,
                            "All callers gone before completion, fan-out discarded"
                        );
                    }
                    let mut delivered = 0usize;
                    for tx in entry.waiters {
                        if tx.send(outcome.clone()).is_ok() {
                            delivered += 1;
                        }
                    }
                    debug!(fingerprint = %fp, waiters = delivered, "In-flight request resolved");
                }
            });
        }

        match rx.await {
            Ok(outcome) => {
                guard.received = true;
                outcome
            }
            Err(_) => Err(GatewayError::Internal {
                reason: "in-flight prediction task dropped before completing".to_string(),
            }),
        }
    }

    /// Number of distinct fingerprints currently in flight
    pub fn in_flight(&self) -> usize {
        lock(&self.in_flight).len()
    }
}

impl Default for RequestCoalescer {
    fn default() -> Self {
        Self::new()
    }
}

fn lock(map: &Arc<Mutex<HashMap<Fingerprint, InFlight>>>) -> MutexGuard<'_, HashMap<Fingerprint, InFlight>> {
    match map.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Tracks one waiter's liveness for the cancellation flag
///
/// Dropping a waiter that never received its outcome decrements the live
/// count; the last departing waiter marks the entry cancelled. The
/// producer still runs to completion so the entry is only torn down once
/// the backend call actually returns.
struct WaiterGuard {
    live_waiters: Arc<AtomicUsize>,
    cancelled: Arc<AtomicBool>,
    received: bool,
}

impl WaiterGuard {
    fn new(live_waiters: &Arc<AtomicUsize>, cancelled: &Arc<AtomicBool>) -> Self {
        Self {
            live_waiters: Arc::clone(live_waiters),
            cancelled: Arc::clone(cancelled),
            received: false,
        }
    }
}

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        if !self.received && self.live_waiters.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.cancelled.store(true, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        EvaluationResult, QueryType, RawPrediction, ResultOrigin, Verdict,
    };
    use std::time::Duration;

    fn sample_result(fp: &Fingerprint, value: f64) -> PredictionResult {
        PredictionResult {
            fingerprint: fp.clone(),
            query_type: QueryType::General,
            prediction: RawPrediction {
                value,
                unit: None,
                narrative: None,
                model_confidence: None,
                model_version: "v1".to_string(),
            },
            evaluation: EvaluationResult {
                verdict: Verdict::Agree,
                confidence: 0.9,
                anomaly: None,
                explanation: "ok".to_string(),
                unvalidated: false,
            },
            origin: ResultOrigin::Backend("llm-primary".to_string()),
            generated_at: 0,
            latency_ms: 1,
        }
    }

    #[tokio::test]
    async fn test_concurrent_identical_requests_run_producer_once() {
        let coalescer = RequestCoalescer::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let fp = Fingerprint::from_hex("abc");

        let mut handles = Vec::new();
        for _ in 0..16 {
            let coalescer = coalescer.clone();
            let calls = Arc::clone(&calls);
            let fp = fp.clone();
            handles.push(tokio::spawn(async move {
                let producer_fp = fp.clone();
                coalescer
                    .coalesce(fp, async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(sample_result(&producer_fp, 42.0))
                    })
                    .await
            }));
        }

        for handle in handles {
            let result = handle.await.unwrap().unwrap();
            assert_eq!(result.prediction.value, 42.0);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(coalescer.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_producer_error_fans_out_to_all_waiters() {
        let coalescer = RequestCoalescer::new();
        let fp = Fingerprint::from_hex("err");

        let mut handles = Vec::new();
        for _ in 0..4 {
            let coalescer = coalescer.clone();
            let fp = fp.clone();
            handles.push(tokio::spawn(async move {
                coalescer
                    .coalesce(fp, async move {
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        Err(GatewayError::ValidationUnavailable {
                            reason: "budget".to_string(),
                        })
                    })
                    .await
            }));
        }

        for handle in handles {
            match handle.await.unwrap() {
                Err(GatewayError::ValidationUnavailable { reason }) => {
                    assert_eq!(reason, "budget");
                }
                other => panic!("expected the shared error, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_sequential_requests_are_not_coalesced() {
        let coalescer = RequestCoalescer::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let fp = Fingerprint::from_hex("seq");

        for _ in 0..2 {
            let calls = Arc::clone(&calls);
            let producer_fp = fp.clone();
            coalescer
                .coalesce(fp.clone(), async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(sample_result(&producer_fp, 1.0))
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancelled_waiter_does_not_cancel_shared_work() {
        let coalescer = RequestCoalescer::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let fp = Fingerprint::from_hex("cancel");

        // Leader whose task we abort mid-flight
        let leader = {
            let coalescer = coalescer.clone();
            let calls = Arc::clone(&calls);
            let fp = fp.clone();
            tokio::spawn(async move {
                let producer_fp = fp.clone();
                coalescer
                    .coalesce(fp, async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(60)).await;
                        Ok(sample_result(&producer_fp, 9.0))
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Second caller joins the same in-flight entry
        let joiner = {
            let coalescer = coalescer.clone();
            let calls = Arc::clone(&calls);
            let fp = fp.clone();
            tokio::spawn(async move {
                let producer_fp = fp.clone();
                coalescer
                    .coalesce(fp, async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(sample_result(&producer_fp, 0.0))
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        leader.abort();

        // The joiner still receives the leader-started producer's result
        let result = joiner.await.unwrap().unwrap();
        assert_eq!(result.prediction.value, 9.0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_entry_removed_even_when_all_waiters_cancel() {
        let coalescer = RequestCoalescer::new();
        let fp = Fingerprint::from_hex("allgone");

        let only = {
            let coalescer = coalescer.clone();
            let fp = fp.clone();
            tokio::spawn(async move {
                let producer_fp = fp.clone();
                coalescer
                    .coalesce(fp, async move {
                        tokio::time::sleep(Duration::from_millis(40)).await;
                        Ok(sample_result(&producer_fp, 1.0))
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        only.abort();

        // Producer completes and the entry is cleaned up regardless
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(coalescer.in_flight(), 0);
    }
}
