use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing block analysis activity for one run.
#[derive(Default)]
pub struct MiningMetrics {
    blocks_analyzed: AtomicU64,
    invocation_failures: AtomicU64,
    parse_failures: AtomicU64,
    partials_written: AtomicU64,
}

impl MiningMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one analyzed block, whatever its outcome.
    pub fn record_block(&self) {
        self.blocks_analyzed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a block whose provider call failed.
    pub fn record_invocation_failure(&self) {
        self.invocation_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a block whose response could not be decoded.
    pub fn record_parse_failure(&self) {
        self.parse_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a per-block record written to disk.
    pub fn record_partial_written(&self) {
        self.partials_written.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            blocks_analyzed: self.blocks_analyzed.load(Ordering::Relaxed),
            invocation_failures: self.invocation_failures.load(Ordering::Relaxed),
            parse_failures: self.parse_failures.load(Ordering::Relaxed),
            partials_written: self.partials_written.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of run counters used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Blocks that produced an analysis result.
    pub blocks_analyzed: u64,
    /// Blocks whose provider call failed.
    pub invocation_failures: u64,
    /// Blocks whose response was not decodable.
    pub parse_failures: u64,
    /// Per-block records persisted.
    pub partials_written: u64,
}

impl MetricsSnapshot {
    /// Blocks that decoded into usable data.
    pub fn succeeded(&self) -> u64 {
        self.blocks_analyzed
            .saturating_sub(self.invocation_failures + self.parse_failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_blocks_and_failures() {
        let metrics = MiningMetrics::new();
        metrics.record_block();
        metrics.record_block();
        metrics.record_block();
        metrics.record_invocation_failure();
        metrics.record_parse_failure();
        metrics.record_partial_written();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.blocks_analyzed, 3);
        assert_eq!(snapshot.invocation_failures, 1);
        assert_eq!(snapshot.parse_failures, 1);
        assert_eq!(snapshot.partials_written, 1);
        assert_eq!(snapshot.succeeded(), 1);
    }

    #[test]
    fn snapshot_is_consistent() {
        let metrics = MiningMetrics::new();
        assert_eq!(metrics.snapshot().blocks_analyzed, 0);
        assert_eq!(metrics.snapshot().succeeded(), 0);
    }
}
