use crate::coordinator::RunReport;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing pipeline activity.
#[derive(Default)]
pub struct PipelineMetrics {
    runs: AtomicU64,
    failed_runs: AtomicU64,
    documents_ingested: AtomicU64,
    chunks_indexed: AtomicU64,
    parse_failures: AtomicU64,
}

impl PipelineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed run.
    pub fn record_run(&self, report: &RunReport) {
        self.runs.fetch_add(1, Ordering::Relaxed);
        self.documents_ingested
            .fetch_add(report.documents as u64, Ordering::Relaxed);
        self.chunks_indexed
            .fetch_add(report.chunks_indexed as u64, Ordering::Relaxed);
        self.parse_failures
            .fetch_add(report.parse_failures as u64, Ordering::Relaxed);
    }

    /// Record a run that stopped on an error.
    pub fn record_failure(&self) {
        self.runs.fetch_add(1, Ordering::Relaxed);
        self.failed_runs.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            runs: self.runs.load(Ordering::Relaxed),
            failed_runs: self.failed_runs.load(Ordering::Relaxed),
            documents_ingested: self.documents_ingested.load(Ordering::Relaxed),
            chunks_indexed: self.chunks_indexed.load(Ordering::Relaxed),
            parse_failures: self.parse_failures.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of pipeline counters used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Pipeline runs started since startup.
    pub runs: u64,
    /// Runs that ended in an error.
    pub failed_runs: u64,
    /// Documents submitted across all runs.
    pub documents_ingested: u64,
    /// Chunks indexed across all runs.
    pub chunks_indexed: u64,
    /// Documents whose parsing failed.
    pub parse_failures: u64,
}
