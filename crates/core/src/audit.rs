//! Audit sink collaborator.
//!
//! The core emits [`AuditRecord`]s for every state-changing operation; the
//! host decides where they go. Delivery is strictly best-effort: a failing
//! sink is logged and never fails the primary operation.

use tracing::warn;

use crate::errors::AuditError;
use crate::models::AuditRecord;

/// Where audit records are delivered.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: AuditRecord) -> Result<(), AuditError>;
}

/// Deliver a record, swallowing (and logging) any sink failure.
pub fn record_best_effort(sink: &dyn AuditSink, record: AuditRecord) {
    let action = record.action.clone();
    if let Err(err) = sink.record(record) {
        warn!(action = %action, error = %err, "audit sink failed, continuing");
    }
}

/// Sink that discards every record.
#[derive(Debug, Default)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _record: AuditRecord) -> Result<(), AuditError> {
        Ok(())
    }
}

/// Sink that keeps records in memory, for tests.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: std::sync::Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: AuditRecord) -> Result<(), AuditError> {
        self.records
            .lock()
            .map_err(|_| AuditError::SinkUnavailable("poisoned lock".into()))?
            .push(record);
        Ok(())
    }
}

/// Sink that always fails, for exercising the best-effort path in tests.
#[derive(Debug, Default)]
pub struct FailingAuditSink;

impl AuditSink for FailingAuditSink {
    fn record(&self, _record: AuditRecord) -> Result<(), AuditError> {
        Err(AuditError::SinkUnavailable("always failing".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_collects_records() {
        let sink = MemoryAuditSink::new();
        record_best_effort(&sink, AuditRecord::success("u1", "create_version", "version", "v1"));
        record_best_effort(&sink, AuditRecord::failure("u2", "merge_branch", "branch", "b1"));

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert!(records[0].success);
        assert!(!records[1].success);
        assert_eq!(records[1].action, "merge_branch");
    }

    #[test]
    fn test_failing_sink_never_panics_or_propagates() {
        let sink = FailingAuditSink;
        record_best_effort(&sink, AuditRecord::success("u1", "noop", "none", "0"));
    }
}
