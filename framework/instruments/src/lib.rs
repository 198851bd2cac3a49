mod report;
mod stats;
mod thresholds;

pub use report::{ReportConfig, Reporter};
pub use stats::{CheckStats, RunStats};
pub use thresholds::{ThresholdReport, ThresholdResult, Thresholds};

use std::time::{Duration, Instant};

/// A single timed operation against the system under test.
///
/// Create the record just before issuing the call, then [OperationRecord::finish] it with the
/// outcome and hand it to [Reporter::add_operation].
#[derive(Debug, Clone)]
pub struct OperationRecord {
    operation_id: String,
    started: Instant,
    elapsed: Option<Duration>,
    is_error: bool,
}

impl OperationRecord {
    pub fn new(operation_id: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            started: Instant::now(),
            elapsed: None,
            is_error: false,
        }
    }

    /// Capture the elapsed time and the outcome. `is_error` marks transport-level failures, not
    /// business-logic rejections.
    pub fn finish(mut self, is_error: bool) -> Self {
        self.elapsed = Some(self.started.elapsed());
        self.is_error = is_error;
        self
    }

    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    /// None until [OperationRecord::finish] has been called.
    pub fn duration(&self) -> Option<Duration> {
        self.elapsed
    }

    pub fn is_error(&self) -> bool {
        self.is_error
    }
}
