//! Run the solver over a whole corpus and aggregate the verdicts.

use crate::{Clock, SolverInvocation, describe, execute_case};
use anyhow::Context;
use crossbeam_queue::SegQueue;
use satbench_adapters::{AdapterError, ProcessRunner, discover_cases};
use satbench_domain::{Aggregator, BenchmarkCase, CaseVerdict, ExecutionOutcome, classify};
use satbench_types::{BenchReport, HostInfo, REPORT_SCHEMA_V1, RunMeta, SolverMeta, ToolInfo};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use tracing::{debug, info, warn};

/// Longest solver output excerpt quoted in an incorrect-verdict warning.
const EXCERPT_CHARS: usize = 200;

/// Per-case notification, called on the aggregating thread in completion order.
pub trait Progress {
    fn case_done(&self, case: &BenchmarkCase, verdict: CaseVerdict);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn case_done(&self, _case: &BenchmarkCase, _verdict: CaseVerdict) {}
}

#[derive(Debug, Clone)]
pub struct RunSuiteRequest {
    pub corpus_dir: PathBuf,
    pub solver: SolverInvocation,

    /// Worker threads; `0` and `1` both mean strictly sequential.
    pub jobs: u32,
}

#[derive(Debug, Clone)]
pub struct RunSuiteOutcome {
    pub report: BenchReport,

    /// Files that were left out of the report, with the reason.
    pub skipped: Vec<String>,
}

pub struct RunSuiteUseCase<R: ProcessRunner, C: Clock> {
    runner: R,
    clock: C,
    tool: ToolInfo,
}

impl<R: ProcessRunner + Sync, C: Clock> RunSuiteUseCase<R, C> {
    pub fn new(runner: R, clock: C, tool: ToolInfo) -> Self {
        Self {
            runner,
            clock,
            tool,
        }
    }

    /// Run every case under `req.corpus_dir`.
    ///
    /// Setting `cancel` stops workers from taking new cases; whatever has been
    /// recorded by then is still reported, with `interrupted` set.
    pub fn execute(
        &self,
        req: RunSuiteRequest,
        progress: &dyn Progress,
        cancel: &AtomicBool,
    ) -> anyhow::Result<RunSuiteOutcome> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = self.clock.now_rfc3339();

        let files = discover_cases(&req.corpus_dir)
            .with_context(|| format!("failed to scan corpus {}", req.corpus_dir.display()))?;

        let mut skipped = Vec::new();
        let cases = classify_all(&req.corpus_dir, files, &mut skipped);
        let total = cases.len();
        let workers = (req.jobs.max(1) as usize).min(total.max(1));

        info!(
            corpus = %req.corpus_dir.display(),
            cases = total,
            jobs = workers,
            timeout_secs = req.solver.timeout.as_secs_f64(),
            "starting run"
        );

        let mut aggregator = Aggregator::new();
        let drained = self.drive(
            cases,
            workers,
            &req.solver,
            cancel,
            &mut aggregator,
            &mut skipped,
            progress,
        )?;

        let recorded = aggregator.cases();
        let interrupted = !drained;
        if interrupted {
            warn!(recorded, total, "run interrupted, reporting partial results");
        }

        let ended_at = self.clock.now_rfc3339();

        let report = BenchReport {
            schema: REPORT_SCHEMA_V1.to_string(),
            tool: self.tool.clone(),
            run: RunMeta {
                id: run_id,
                started_at,
                ended_at,
                host: HostInfo {
                    os: std::env::consts::OS.to_string(),
                    arch: std::env::consts::ARCH.to_string(),
                },
            },
            solver: SolverMeta {
                command: req.solver.argv.clone(),
                cwd: req
                    .solver
                    .cwd
                    .as_ref()
                    .map(|p| p.to_string_lossy().to_string()),
                timeout_secs: req.solver.timeout.as_secs_f64(),
                jobs: workers as u32,
            },
            corpus: req.corpus_dir.to_string_lossy().to_string(),
            cases: recorded,
            interrupted,
            results: aggregator.finalize(),
        };

        Ok(RunSuiteOutcome { report, skipped })
    }

    /// Feed `cases` through `workers` threads into `aggregator`.
    ///
    /// The aggregator lives on the calling thread; workers only send outcomes.
    /// A structural error stops the pool from taking new cases and is returned
    /// once the in-flight ones have finished. Returns `false` if cancellation
    /// left cases unprocessed.
    #[allow(clippy::too_many_arguments)]
    fn drive(
        &self,
        cases: Vec<BenchmarkCase>,
        workers: usize,
        solver: &SolverInvocation,
        cancel: &AtomicBool,
        aggregator: &mut Aggregator,
        skipped: &mut Vec<String>,
        progress: &dyn Progress,
    ) -> anyhow::Result<bool> {
        let queue = SegQueue::new();
        for case in cases {
            queue.push(case);
        }

        let abort = AtomicBool::new(false);
        let (tx, rx) = mpsc::channel::<(BenchmarkCase, Result<ExecutionOutcome, AdapterError>)>();

        thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let queue = &queue;
                let abort = &abort;
                scope.spawn(move || {
                    while !cancel.load(Ordering::SeqCst) && !abort.load(Ordering::SeqCst) {
                        let Some(case) = queue.pop() else { break };
                        let result = execute_case(&self.runner, &case, solver);
                        if tx.send((case, result)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(tx);

            let mut fatal = None;
            for (case, result) in rx {
                match result {
                    Ok(outcome) => {
                        let verdict = aggregator.record(&case, &outcome);
                        log_verdict(&case, &outcome, verdict);
                        progress.case_done(&case, verdict);
                    }
                    Err(err @ AdapterError::CaseUnreadable { .. }) => {
                        let reason = describe(err);
                        warn!(reason = %reason, "skipping case");
                        skipped.push(reason);
                    }
                    Err(err) => {
                        abort.store(true, Ordering::SeqCst);
                        if fatal.is_none() {
                            fatal = Some(anyhow::Error::new(err).context(format!(
                                "failed to run solver {:?} on {}",
                                solver.argv,
                                case.path.display()
                            )));
                        }
                    }
                }
            }

            match fatal {
                Some(err) => Err(err),
                None => Ok(()),
            }
        })?;

        Ok(queue.is_empty())
    }
}

/// Classify discovered files by `<corpus name>/<path below the corpus>`.
fn classify_all(
    corpus_dir: &Path,
    files: Vec<PathBuf>,
    skipped: &mut Vec<String>,
) -> Vec<BenchmarkCase> {
    let corpus_name = corpus_name(corpus_dir);
    let mut cases = Vec::with_capacity(files.len());

    for path in files {
        let rel = path.strip_prefix(corpus_dir).unwrap_or(&path);
        let logical = Path::new(&corpus_name).join(rel);
        match classify(&logical) {
            Ok(class) => {
                debug!(
                    path = %path.display(),
                    size = %class.size_key,
                    category = %class.category,
                    "classified"
                );
                cases.push(BenchmarkCase::new(path, class));
            }
            Err(err) => {
                let reason = describe(err);
                warn!(reason = %reason, "skipping file");
                skipped.push(reason);
            }
        }
    }

    cases
}

fn corpus_name(corpus_dir: &Path) -> String {
    corpus_dir
        .canonicalize()
        .ok()
        .as_deref()
        .and_then(Path::file_name)
        .or_else(|| corpus_dir.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "benchmarks".to_string())
}

fn log_verdict(case: &BenchmarkCase, outcome: &ExecutionOutcome, verdict: CaseVerdict) {
    match verdict {
        CaseVerdict::Correct => debug!(
            path = %case.path.display(),
            secs = outcome.duration.as_secs_f64(),
            "correct"
        ),
        CaseVerdict::TimedOut => warn!(
            path = %case.path.display(),
            timeout_secs = outcome.duration.as_secs_f64(),
            "solver timed out"
        ),
        CaseVerdict::Incorrect => warn!(
            path = %case.path.display(),
            expected = case.category.marker(),
            actual = %excerpt(&outcome.output),
            "incorrect verdict"
        ),
    }
}

fn excerpt(output: &str) -> String {
    let trimmed = output.trim();
    let mut out: String = trimmed.chars().take(EXCERPT_CHARS).collect();
    if trimmed.chars().count() > EXCERPT_CHARS {
        out.push_str("...");
    }
    out
}
