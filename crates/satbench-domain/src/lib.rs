//! Domain logic for satbench.
//!
//! This crate is intentionally I/O-free: it classifies paths, judges solver
//! output and does the statistics.

mod aggregate;
mod classify;

pub use aggregate::{Aggregator, GroupKey, GroupStats};
pub use classify::{BenchmarkCase, CaseClass, classify};

use satbench_types::Category;
use statrs::statistics::Statistics;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("no samples to summarize")]
    NoSamples,

    #[error("cannot derive a size key from {0}")]
    NoSizeKey(PathBuf),
}

/// Result of one solver invocation for one case.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    /// Captured stdout (lossy UTF-8). Empty when the case timed out.
    pub output: String,

    /// Wall-clock time. Equal to the configured timeout when `timed_out`.
    pub duration: Duration,

    pub timed_out: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CaseVerdict {
    Correct,
    Incorrect,
    TimedOut,
}

/// Decide whether a solver answered a case of `category` correctly.
///
/// The expected marker only has to appear somewhere in the output; solvers are
/// free to print comments or a model around it.
pub fn judge(category: Category, outcome: &ExecutionOutcome) -> CaseVerdict {
    if outcome.timed_out {
        return CaseVerdict::TimedOut;
    }
    if outcome.output.contains(category.marker()) {
        CaseVerdict::Correct
    } else {
        CaseVerdict::Incorrect
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingSummary {
    pub mean: f64,
    pub median: f64,
}

pub fn summarize_times(values: &[f64]) -> Result<TimingSummary, DomainError> {
    if values.is_empty() {
        return Err(DomainError::NoSamples);
    }
    let mut v = values.to_vec();
    v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mean = v.iter().mean();
    let median = median_f64_sorted(&v);
    Ok(TimingSummary { mean, median })
}

fn median_f64_sorted(sorted: &[f64]) -> f64 {
    debug_assert!(!sorted.is_empty());
    let n = sorted.len();
    let mid = n / 2;
    if n % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}

/// Percentage of answered cases that were correct.
///
/// Timed-out cases are not answers, so they are left out of the denominator.
/// A group in which nothing was answered has accuracy `0`.
pub fn accuracy_pct(total: u64, correct: u64, timeouts: u64) -> f64 {
    let answered = total.saturating_sub(timeouts);
    if answered == 0 {
        return 0.0;
    }
    correct as f64 / answered as f64 * 100.0
}
