use std::fmt;

use crate::stats::RunStats;

/// Pass/fail conditions evaluated once against the aggregate metrics when a run completes.
///
/// A breached threshold marks the run failed. Evaluation happens after the last agent has
/// stopped, so a breach never aborts in-flight iterations.
#[derive(Debug, Clone, Default)]
pub struct Thresholds {
    rules: Vec<ThresholdRule>,
}

#[derive(Debug, Clone)]
enum ThresholdRule {
    ErrorRateBelow(f64),
    LatencyQuantileBelowMs { quantile: f64, limit_ms: f64 },
}

impl fmt::Display for ThresholdRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThresholdRule::ErrorRateBelow(rate) => {
                write!(f, "error rate < {:.2}%", rate * 100.0)
            }
            ThresholdRule::LatencyQuantileBelowMs { quantile, limit_ms } => {
                write!(f, "p({}) latency < {limit_ms} ms", quantile * 100.0)
            }
        }
    }
}

impl Thresholds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pass while the failed-check rate stays strictly below `rate`.
    pub fn error_rate_below(mut self, rate: f64) -> Self {
        self.rules.push(ThresholdRule::ErrorRateBelow(rate));
        self
    }

    /// Pass while the operation latency at `quantile` stays strictly below `limit_ms`.
    pub fn latency_quantile_below_ms(mut self, quantile: f64, limit_ms: f64) -> Self {
        self.rules
            .push(ThresholdRule::LatencyQuantileBelowMs { quantile, limit_ms });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn evaluate(&self, stats: &RunStats) -> ThresholdReport {
        let results = self
            .rules
            .iter()
            .map(|rule| {
                let (passed, observed) = match rule {
                    ThresholdRule::ErrorRateBelow(rate) => {
                        let observed = stats.error_rate();
                        (observed < *rate, format!("{:.2}%", observed * 100.0))
                    }
                    ThresholdRule::LatencyQuantileBelowMs { quantile, limit_ms } => {
                        let observed = stats.latency_at_quantile_ms(*quantile);
                        (observed < *limit_ms, format!("{observed} ms"))
                    }
                };

                ThresholdResult {
                    name: rule.to_string(),
                    passed,
                    observed,
                }
            })
            .collect();

        ThresholdReport { results }
    }
}

/// Outcome of evaluating every configured threshold against the run's stats.
#[derive(Debug, Clone)]
pub struct ThresholdReport {
    results: Vec<ThresholdResult>,
}

#[derive(Debug, Clone)]
pub struct ThresholdResult {
    pub name: String,
    pub passed: bool,
    pub observed: String,
}

impl ThresholdReport {
    pub fn passed(&self) -> bool {
        self.results.iter().all(|result| result.passed)
    }

    pub fn results(&self) -> &[ThresholdResult] {
        &self.results
    }
}
