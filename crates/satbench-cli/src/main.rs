use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use satbench_adapters::{HttpArchiveSource, StdProcessRunner};
use satbench_app::{
    FetchCorpusRequest, FetchCorpusUseCase, Progress, RunSuiteRequest, RunSuiteUseCase,
    SolverInvocation, SystemClock,
};
use satbench_domain::{BenchmarkCase, CaseVerdict};
use satbench_types::{BenchReport, ConfigFile, Manifest, ToolInfo};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "satbench.toml";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_CORPUS: &str = "benchmarks";
const DEFAULT_OUT: &str = "benchmark_results.json";
const DEFAULT_MANIFEST: &str = "benchmarks.json";
const DEFAULT_SOLVER: [&str; 3] = ["cargo", "run", "--release"];

/// Exit status for a run stopped by Ctrl-C (128 + SIGINT).
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Debug, Parser)]
#[command(
    name = "satbench",
    version,
    about = "Score a SAT solver for speed and correctness on a labelled CNF corpus"
)]
struct Cli {
    /// TOML config file (defaults to ./satbench.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Diagnostic log format on stderr
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the solver on every case in the corpus and write a JSON report.
    Run {
        /// Per-case timeout: seconds ("60", "2.5") or a duration ("90s", "2m")
        #[arg(long)]
        timeout: Option<String>,

        /// Cases run in parallel
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        jobs: Option<u32>,

        /// Corpus root directory
        #[arg(long)]
        corpus: Option<PathBuf>,

        /// Report output path
        #[arg(long)]
        out: Option<PathBuf>,

        /// Max bytes kept from solver stdout/stderr per case (default: all)
        #[arg(long)]
        output_cap_bytes: Option<usize>,

        /// Environment variable for the solver (KEY=VALUE). Repeatable.
        #[arg(long, value_parser = parse_key_val_string)]
        env: Vec<(String, String)>,

        /// Working directory for the solver
        #[arg(long)]
        cwd: Option<PathBuf>,

        /// Write single-line JSON instead of indented
        #[arg(long, default_value_t = false)]
        compact: bool,

        /// Solver argv after `--` (default: cargo run --release)
        #[arg(last = true)]
        solver: Vec<String>,
    },

    /// Download and unpack the benchmark archives listed in a manifest.
    Fetch {
        /// Manifest JSON file
        #[arg(long)]
        manifest: Option<PathBuf>,

        /// Corpus root to populate
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Per-request HTTP timeout (e.g. "5m")
        #[arg(long, default_value = "300s")]
        http_timeout: String,
    },
}

fn main() -> ExitCode {
    match real_main() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(1)
        }
    }
}

fn real_main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    let config = load_config(cli.config.as_deref())?;
    let defaults = config.defaults;

    match cli.cmd {
        Command::Run {
            timeout,
            jobs,
            corpus,
            out,
            output_cap_bytes,
            env,
            cwd,
            compact,
            solver,
        } => {
            let timeout = match timeout.as_deref().or(defaults.timeout.as_deref()) {
                Some(s) => parse_timeout(s)?,
                None => DEFAULT_TIMEOUT,
            };
            let jobs = jobs.or(defaults.jobs).unwrap_or(1);
            if jobs == 0 {
                anyhow::bail!("jobs must be at least 1");
            }
            let corpus_dir = corpus
                .or(defaults.corpus_dir.map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CORPUS));
            let out = out
                .or(defaults.out.map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUT));
            let argv = if !solver.is_empty() {
                solver
            } else if let Some(argv) = defaults.solver.filter(|a| !a.is_empty()) {
                argv
            } else {
                DEFAULT_SOLVER.iter().map(|s| s.to_string()).collect()
            };

            let cancel = Arc::new(AtomicBool::new(false));
            {
                let cancel = Arc::clone(&cancel);
                ctrlc::set_handler(move || cancel.store(true, Ordering::SeqCst))
                    .context("install Ctrl-C handler")?;
            }

            let usecase = RunSuiteUseCase::new(StdProcessRunner, SystemClock, tool_info());
            let outcome = usecase.execute(
                RunSuiteRequest {
                    corpus_dir,
                    solver: SolverInvocation {
                        argv,
                        cwd,
                        env,
                        timeout,
                        output_cap_bytes: output_cap_bytes.or(defaults.output_cap_bytes),
                    },
                    jobs,
                },
                &DotProgress,
                &cancel,
            )?;
            eprintln!();

            write_json(&out, &outcome.report, !compact)?;
            info!(
                path = %out.display(),
                cases = outcome.report.cases,
                interrupted = outcome.report.interrupted,
                "report written"
            );
            print_summary(&outcome.report, &out);
            for reason in &outcome.skipped {
                eprintln!("skipped: {reason}");
            }

            if outcome.report.interrupted {
                return Ok(ExitCode::from(EXIT_INTERRUPTED));
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Fetch {
            manifest,
            out_dir,
            http_timeout,
        } => {
            let manifest_path = manifest
                .or(defaults.manifest.map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MANIFEST));
            let out_dir = out_dir
                .or(defaults.corpus_dir.map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CORPUS));

            let manifest: Manifest = read_json(&manifest_path)?;
            let source = HttpArchiveSource::new(parse_duration(&http_timeout)?)?;

            let outcome = FetchCorpusUseCase::new(source).execute(FetchCorpusRequest {
                manifest,
                out_dir: out_dir.clone(),
            })?;

            eprintln!(
                "fetched {} archive(s), {} file(s) into {} ({} set(s), {} problem(s))",
                outcome.archives_extracted,
                outcome.files_extracted,
                out_dir.display(),
                outcome.sets,
                outcome.failures.len()
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// One `.` per finished case.
struct DotProgress;

impl Progress for DotProgress {
    fn case_done(&self, _case: &BenchmarkCase, _verdict: CaseVerdict) {
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(b".");
        let _ = err.flush();
    }
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    // Only fails if a global subscriber is already installed.
    let _ = match format {
        LogFormat::Text => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

fn load_config(explicit: Option<&Path>) -> anyhow::Result<ConfigFile> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => {
            let p = PathBuf::from(DEFAULT_CONFIG);
            if !p.is_file() {
                return Ok(ConfigFile::default());
            }
            p
        }
    };

    let text =
        fs::read_to_string(&path).with_context(|| format!("read config {}", path.display()))?;
    let config: ConfigFile =
        toml::from_str(&text).with_context(|| format!("parse config {}", path.display()))?;
    Ok(config)
}

fn print_summary(report: &BenchReport, out: &Path) {
    for (size, groups) in &report.results {
        for (category, s) in groups {
            eprintln!(
                "{size:<16} {:<14} avg {:>8.3}s  median {:>8.3}s  accuracy {:>6.2}%  ({}/{} correct, {} timeout(s))",
                category.as_str(),
                s.average_time,
                s.median_time,
                s.accuracy,
                s.correct,
                s.total,
                s.timeouts,
            );
        }
    }
    eprintln!("{} case(s), report written to {}", report.cases, out.display());
    if report.interrupted {
        eprintln!("run was interrupted; report is partial");
    }
}

fn tool_info() -> ToolInfo {
    ToolInfo {
        name: "satbench".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

/// Plain seconds (`"60"`, `"2.5"`) or a humantime duration (`"90s"`).
fn parse_timeout(s: &str) -> anyhow::Result<Duration> {
    let d = match s.trim().parse::<f64>() {
        Ok(secs) if secs > 0.0 => Duration::try_from_secs_f64(secs)
            .with_context(|| format!("timeout out of range: {s}"))?,
        Ok(_) => anyhow::bail!("timeout must be a positive number of seconds: {s}"),
        Err(_) => parse_duration(s)?,
    };
    if d.is_zero() {
        anyhow::bail!("timeout must be positive: {s}");
    }
    Ok(d)
}

fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    let d = humantime::parse_duration(s).with_context(|| format!("invalid duration: {s}"))?;
    Ok(d)
}

fn parse_key_val_string(s: &str) -> Result<(String, String), String> {
    let (k, v) = s
        .split_once('=')
        .ok_or_else(|| "expected KEY=VALUE".to_string())?;
    Ok((k.to_string(), v.to_string()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let v =
        serde_json::from_slice(&bytes).with_context(|| format!("parse json {}", path.display()))?;
    Ok(v)
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T, pretty: bool) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }
    }

    let mut bytes = if pretty {
        serde_json::to_vec_pretty(value)?
    } else {
        serde_json::to_vec(value)?
    };
    bytes.push(b'\n');

    atomic_write(path, &bytes)
}

fn atomic_write(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp = parent.join(format!(".{}.tmp", uuid::Uuid::new_v4()));

    {
        let mut f =
            fs::File::create(&tmp).with_context(|| format!("create temp {}", tmp.display()))?;
        f.write_all(bytes)
            .with_context(|| format!("write temp {}", tmp.display()))?;
        f.sync_all().ok();
    }

    fs::rename(&tmp, path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}
