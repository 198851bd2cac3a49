use std::collections::BTreeMap;
use std::fmt;

use hdrhistogram::Histogram;
use parking_lot::Mutex;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::stats::{CheckStats, RunStats};
use crate::OperationRecord;

/// Configuration for run reporting.
///
/// The end-of-run summary printout is opt-in so that tests and embedding code can collect stats
/// without writing to the console.
#[derive(Default)]
pub struct ReportConfig {
    summary: bool,
}

impl ReportConfig {
    pub fn enable_summary(mut self) -> Self {
        self.summary = true;
        self
    }

    pub fn init(self) -> Reporter {
        Reporter {
            print_summary: self.summary,
            collected: Mutex::new(Collected::new()),
        }
    }
}

#[derive(Default, Clone, Copy)]
struct CheckCounts {
    passed: u64,
    failed: u64,
}

struct Collected {
    operations: Vec<OperationRecord>,
    checks: BTreeMap<String, CheckCounts>,
    latencies: Histogram<u64>,
}

impl Collected {
    fn new() -> Self {
        Self {
            operations: Vec::new(),
            checks: BTreeMap::new(),
            // Three significant digits is plenty for millisecond latencies.
            latencies: Histogram::new(3).expect("Failed to create latency histogram"),
        }
    }
}

/// Collects operation and check records from every agent during a run.
///
/// The runner shares a single reporter behind an `Arc`; all methods take `&self` and can be
/// called from any agent thread.
pub struct Reporter {
    print_summary: bool,
    collected: Mutex<Collected>,
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("print_summary", &self.print_summary)
            .finish_non_exhaustive()
    }
}

impl Reporter {
    pub fn add_operation(&self, record: OperationRecord) {
        let mut collected = self.collected.lock();
        if let Some(duration) = record.duration() {
            let _ = collected.latencies.record(duration.as_millis() as u64);
        }
        collected.operations.push(record);
    }

    /// Record a named assertion outcome. Failed checks feed the run's error rate.
    pub fn add_check(&self, name: &str, passed: bool) {
        let mut collected = self.collected.lock();
        let counts = collected.checks.entry(name.to_string()).or_default();
        if passed {
            counts.passed += 1;
        } else {
            counts.failed += 1;
        }
    }

    /// Close out the run: compute the aggregate stats and, if enabled, print the summary tables.
    pub fn finalize(&self) -> RunStats {
        let collected = self.collected.lock();

        let checks = collected
            .checks
            .iter()
            .map(|(name, counts)| CheckStats {
                name: name.clone(),
                passed: counts.passed,
                failed: counts.failed,
            })
            .collect::<Vec<_>>();

        let stats = RunStats::new(
            collected.operations.len(),
            checks,
            collected.latencies.clone(),
        );

        if self.print_summary {
            print_summary_of_operations(&collected.operations);
            print_summary_of_checks(&stats);
        }

        stats
    }
}

#[derive(Tabled)]
struct OperationRow {
    #[tabled(rename = "operation")]
    operation_id: String,
    #[tabled(rename = "count")]
    total_operations: usize,
    #[tabled(rename = "errors")]
    errors: usize,
    #[tabled(rename = "avg (ms)")]
    avg_time_ms: f64,
    #[tabled(rename = "min (ms)")]
    min_time_ms: f64,
    #[tabled(rename = "max (ms)")]
    max_time_ms: f64,
}

fn print_summary_of_operations(operations: &[OperationRecord]) {
    println!("\nSummary of operations");
    let rows = operations
        .iter()
        .fold(
            BTreeMap::<String, Vec<&OperationRecord>>::new(),
            |mut acc, record| {
                acc.entry(record.operation_id().to_string())
                    .or_default()
                    .push(record);
                acc
            },
        )
        .into_iter()
        .map(|(operation_id, records)| {
            let durations = records
                .iter()
                .filter_map(|record| record.duration())
                .collect::<Vec<_>>();
            let total_micros = durations.iter().map(|d| d.as_micros()).sum::<u128>();

            OperationRow {
                operation_id,
                total_operations: records.len(),
                errors: records.iter().filter(|record| record.is_error()).count(),
                avg_time_ms: if durations.is_empty() {
                    0.0
                } else {
                    (total_micros as f64 / durations.len() as f64) / 1000.0
                },
                min_time_ms: durations
                    .iter()
                    .min()
                    .map(|d| d.as_micros() as f64 / 1000.0)
                    .unwrap_or(0.0),
                max_time_ms: durations
                    .iter()
                    .max()
                    .map(|d| d.as_micros() as f64 / 1000.0)
                    .unwrap_or(0.0),
            }
        })
        .collect::<Vec<_>>();

    let mut table = Table::new(rows);
    table.with(Style::modern());

    println!("{table}");
}

#[derive(Tabled)]
struct CheckRow {
    #[tabled(rename = "check")]
    name: String,
    #[tabled(rename = "passes")]
    passed: u64,
    #[tabled(rename = "failures")]
    failed: u64,
    #[tabled(rename = "pass rate")]
    pass_rate: String,
}

fn print_summary_of_checks(stats: &RunStats) {
    if stats.checks().is_empty() {
        return;
    }

    println!("\nChecks");
    let rows = stats
        .checks()
        .iter()
        .map(|check| CheckRow {
            name: check.name.clone(),
            passed: check.passed,
            failed: check.failed,
            pass_rate: format!("{:.2}%", check.pass_rate() * 100.0),
        })
        .collect::<Vec<_>>();

    let mut table = Table::new(rows);
    table.with(Style::modern());

    println!("{table}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reporter_accumulates_operations_and_checks() {
        let reporter = ReportConfig::default().init();

        reporter.add_operation(OperationRecord::new("login").finish(false));
        reporter.add_operation(OperationRecord::new("list_books").finish(false));
        reporter.add_operation(OperationRecord::new("list_books").finish(true));
        reporter.add_check("books status is 200", true);
        reporter.add_check("books status is 200", false);

        let stats = reporter.finalize();

        assert_eq!(3, stats.total_operations());
        assert_eq!(2, stats.total_checks());
        assert_eq!(1, stats.failed_checks());
        assert_eq!(0.5, stats.error_rate());
    }

    #[test]
    fn check_counts_keyed_by_name() {
        let reporter = ReportConfig::default().init();

        reporter.add_check("a", true);
        reporter.add_check("b", false);
        reporter.add_check("a", true);

        let stats = reporter.finalize();
        let names = stats
            .checks()
            .iter()
            .map(|check| (check.name.as_str(), check.passed, check.failed))
            .collect::<Vec<_>>();

        assert_eq!(vec![("a", 2, 0), ("b", 0, 1)], names);
    }
}
