//! Development diagnostics for action runs.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};

/// One record per completed action run.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticRecord {
    pub key: String,
    pub from_fallback: bool,
    pub timestamp: DateTime<Utc>,
}

pub trait DiagnosticsSink: Send + Sync {
    fn record(&self, record: DiagnosticRecord);
}

/// Writes records to the log at debug level.
pub struct TracingDiagnostics;

impl DiagnosticsSink for TracingDiagnostics {
    fn record(&self, record: DiagnosticRecord) {
        tracing::debug!(
            key = %record.key,
            from_fallback = record.from_fallback,
            timestamp = %record.timestamp.to_rfc3339(),
            "action diagnostics"
        );
    }
}

/// Keeps records in memory.
#[derive(Default)]
pub struct MemoryDiagnostics {
    records: Mutex<Vec<DiagnosticRecord>>,
}

impl MemoryDiagnostics {
    pub fn records(&self) -> Vec<DiagnosticRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl DiagnosticsSink for MemoryDiagnostics {
    fn record(&self, record: DiagnosticRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }
}
