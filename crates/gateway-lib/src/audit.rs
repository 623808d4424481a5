//! Audit recording
//!
//! Every gateway transaction produces exactly one AuditRecord. Records
//! flow through a bounded channel into a background drain task that
//! appends them to the configured sink; a slow or failing sink can never
//! fail or delay the user-facing request.

use crate::models::AuditRecord;
use crate::observability::GatewayMetrics;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Default channel capacity before records are dropped
const CHANNEL_CAPACITY: usize = 256;

/// Destination for audit records (database, log stream, ...)
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, record: AuditRecord) -> Result<()>;
}

/// Sink that emits each record as a structured log event
pub struct LogSink;

#[async_trait]
impl AuditSink for LogSink {
    async fn append(&self, record: AuditRecord) -> Result<()> {
        info!(
            event = "audit_record",
            fingerprint = %record.fingerprint,
            cache = ?record.cache,
            route = ?record.route.as_ref().map(|r| &r.backend),
            outcome = ?record.outcome,
            latency_ms = record.latency_ms,
            "Gateway transaction recorded"
        );
        Ok(())
    }
}

/// In-memory sink for tests and local inspection
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<AuditRecord>> {
        match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[async_trait]
impl AuditSink for MemorySink {
    async fn append(&self, record: AuditRecord) -> Result<()> {
        self.lock().push(record);
        Ok(())
    }
}

/// Fire-and-forget front end over an [`AuditSink`]
///
/// Cloneable handle; the drain task runs for the lifetime of the
/// process. Records are dropped (and counted) rather than ever blocking
/// the request path.
#[derive(Clone)]
pub struct AuditRecorder {
    tx: mpsc::Sender<AuditRecord>,
    metrics: GatewayMetrics,
}

impl AuditRecorder {
    /// Create a recorder and spawn its drain task
    pub fn spawn(sink: Arc<dyn AuditSink>, metrics: GatewayMetrics) -> Self {
        let (tx, mut rx) = mpsc::channel::<AuditRecord>(CHANNEL_CAPACITY);
        tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                if let Err(e) = sink.append(record).await {
                    warn!(error = %e, "Audit sink append failed");
                }
            }
        });
        Self { tx, metrics }
    }

    /// Enqueue one record without waiting
    pub fn record(&self, record: AuditRecord) {
        if self.tx.try_send(record).is_err() {
            self.metrics.inc_audit_drops();
            warn!("Audit channel full or closed, record dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::Fingerprint;
    use crate::models::{CacheOutcome, RequestOutcome};
    use std::time::Duration;

    fn record(latency_ms: u64) -> AuditRecord {
        AuditRecord {
            fingerprint: Fingerprint::from_hex("aa"),
            cache: CacheOutcome::Miss,
            route: None,
            evaluation: None,
            outcome: RequestOutcome::Success,
            latency_ms,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    async fn wait_for_records(sink: &Arc<MemorySink>, expected: usize) {
        for _ in 0..100 {
            if sink.len() >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("expected {} audit records, got {}", expected, sink.len());
    }

    #[tokio::test]
    async fn test_records_reach_the_sink() {
        let sink = Arc::new(MemorySink::new());
        let recorder = AuditRecorder::spawn(sink.clone(), GatewayMetrics::new());

        recorder.record(record(5));
        recorder.record(record(7));
        wait_for_records(&sink, 2).await;

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].latency_ms, 5);
    }

    #[tokio::test]
    async fn test_failing_sink_does_not_propagate() {
        struct FailingSink;

        #[async_trait]
        impl AuditSink for FailingSink {
            async fn append(&self, _record: AuditRecord) -> Result<()> {
                anyhow::bail!("sink offline")
            }
        }

        let recorder = AuditRecorder::spawn(Arc::new(FailingSink), GatewayMetrics::new());
        // Must not panic or block
        recorder.record(record(1));
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
