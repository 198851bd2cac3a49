use hdrhistogram::Histogram;

/// Aggregate pass/fail counts for one named check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckStats {
    pub name: String,
    pub passed: u64,
    pub failed: u64,
}

impl CheckStats {
    pub fn total(&self) -> u64 {
        self.passed + self.failed
    }

    pub fn pass_rate(&self) -> f64 {
        if self.total() == 0 {
            1.0
        } else {
            self.passed as f64 / self.total() as f64
        }
    }
}

/// Aggregate metrics for a completed run, produced by [crate::Reporter::finalize].
#[derive(Debug, Clone)]
pub struct RunStats {
    total_operations: usize,
    checks: Vec<CheckStats>,
    latencies: Histogram<u64>,
}

impl RunStats {
    pub(crate) fn new(
        total_operations: usize,
        checks: Vec<CheckStats>,
        latencies: Histogram<u64>,
    ) -> Self {
        Self {
            total_operations,
            checks,
            latencies,
        }
    }

    pub fn total_operations(&self) -> usize {
        self.total_operations
    }

    pub fn checks(&self) -> &[CheckStats] {
        &self.checks
    }

    pub fn total_checks(&self) -> u64 {
        self.checks.iter().map(CheckStats::total).sum()
    }

    pub fn failed_checks(&self) -> u64 {
        self.checks.iter().map(|check| check.failed).sum()
    }

    /// Failed checks over total checks. 0.0 when nothing was checked.
    pub fn error_rate(&self) -> f64 {
        let total = self.total_checks();
        if total == 0 {
            0.0
        } else {
            self.failed_checks() as f64 / total as f64
        }
    }

    /// Operation latency at `quantile`, in milliseconds, across every recorded operation.
    pub fn latency_at_quantile_ms(&self, quantile: f64) -> f64 {
        self.latencies.value_at_quantile(quantile) as f64
    }
}
