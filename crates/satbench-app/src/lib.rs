//! Application layer for satbench.
//!
//! The app layer coordinates adapters and domain logic.
//! It does not parse CLI flags and it does not write reports.

mod fetch;
mod run;

pub use fetch::{FetchCorpusRequest, FetchCorpusUseCase, FetchOutcome};
pub use run::{NoProgress, Progress, RunSuiteOutcome, RunSuiteRequest, RunSuiteUseCase};

use satbench_adapters::{AdapterError, CommandSpec, ProcessRunner, read_case};
use satbench_domain::{BenchmarkCase, ExecutionOutcome};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

pub trait Clock: Send + Sync {
    fn now_rfc3339(&self) -> String;
}

#[derive(Debug, Default, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_rfc3339(&self) -> String {
        use time::format_description::well_known::Rfc3339;
        time::OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
    }
}

/// How to launch the solver for one case.
#[derive(Debug, Clone)]
pub struct SolverInvocation {
    /// argv vector (no shell parsing).
    pub argv: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    pub timeout: Duration,

    /// Per-stream capture limit; verdicts only see captured stdout.
    pub output_cap_bytes: Option<usize>,
}

/// Run the solver once on one case.
///
/// The case file is piped to the solver's stdin. A timed-out run reports empty
/// output and a duration of exactly `solver.timeout`. There are no retries.
pub fn execute_case<R: ProcessRunner + ?Sized>(
    runner: &R,
    case: &BenchmarkCase,
    solver: &SolverInvocation,
) -> Result<ExecutionOutcome, AdapterError> {
    let input = read_case(&case.path)?;

    let spec = CommandSpec {
        argv: solver.argv.clone(),
        cwd: solver.cwd.clone(),
        env: solver.env.clone(),
        stdin: Some(input),
        timeout: Some(solver.timeout),
        output_cap_bytes: solver.output_cap_bytes,
    };

    let run = runner.run(&spec)?;

    if !run.stderr.is_empty() {
        debug!(
            path = %case.path.display(),
            stderr = %String::from_utf8_lossy(&run.stderr).trim_end(),
            "solver stderr"
        );
    }

    if run.timed_out {
        return Ok(ExecutionOutcome {
            output: String::new(),
            duration: solver.timeout,
            timed_out: true,
        });
    }

    Ok(ExecutionOutcome {
        output: String::from_utf8_lossy(&run.stdout).into_owned(),
        duration: run.wall,
        timed_out: false,
    })
}

/// Render an error with its full source chain on one line.
pub(crate) fn describe<E>(err: E) -> String
where
    E: std::error::Error + Send + Sync + 'static,
{
    format!("{:#}", anyhow::Error::new(err))
}


#[cfg(test)]
mod tests {
    use super::fakes::ScriptedRunner;
    use super::*;
    use satbench_domain::{CaseVerdict, classify, judge};
    use satbench_types::Category;
    use std::fs;

    fn invocation(timeout_secs: u64) -> SolverInvocation {
        SolverInvocation {
            argv: vec!["solver".to_string()],
            cwd: None,
            env: vec![],
            timeout: Duration::from_secs(timeout_secs),
            output_cap_bytes: Some(4096),
        }
    }

    fn case_file(dir: &std::path::Path, rel: &str, body: &str) -> BenchmarkCase {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, body).unwrap();
        BenchmarkCase::new(path, classify(std::path::Path::new(rel)).unwrap())
    }

    #[test]
    fn case_contents_reach_solver_stdin() {
        let dir = tempfile::tempdir().unwrap();
        let case = case_file(dir.path(), "benchmarks/20_clauses/a.cnf", "p cnf 3 1\n1 2 3 0\n");
        let runner = ScriptedRunner::new(Duration::from_millis(30));

        let outcome = execute_case(&runner, &case, &invocation(60)).unwrap();

        let seen = runner.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].stdin.as_deref(), Some(&b"p cnf 3 1\n1 2 3 0\n"[..]));
        assert_eq!(seen[0].timeout, Some(Duration::from_secs(60)));
        assert!(!outcome.timed_out);
        assert_eq!(outcome.duration, Duration::from_millis(30));
        assert_eq!(judge(case.category, &outcome), CaseVerdict::Correct);
    }

    #[test]
    fn timeout_clamps_duration_and_blanks_output() {
        let dir = tempfile::tempdir().unwrap();
        let case = case_file(dir.path(), "benchmarks/500_clauses/slow.cnf", "c expect-timeout\n");
        let runner = ScriptedRunner::new(Duration::from_millis(30));

        let outcome = execute_case(&runner, &case, &invocation(5)).unwrap();

        assert!(outcome.timed_out);
        assert_eq!(outcome.duration.as_secs_f64(), 5.0);
        assert!(outcome.output.is_empty());
        assert_eq!(judge(case.category, &outcome), CaseVerdict::TimedOut);
    }

    #[test]
    fn unreadable_case_is_reported() {
        let runner = ScriptedRunner::default();
        let case = BenchmarkCase {
            path: "/nonexistent/benchmarks/1_clauses/x.cnf".into(),
            category: Category::Satisfiable,
            size_key: "1_clauses".into(),
        };
        let err = execute_case(&runner, &case, &invocation(1)).unwrap_err();
        assert!(matches!(err, AdapterError::CaseUnreadable { .. }));
        assert!(runner.seen.lock().unwrap().is_empty());
    }
}
