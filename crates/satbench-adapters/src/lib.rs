//! Std adapters for satbench.
//!
//! In clean-arch terms: this is where we touch the world.

mod corpus;
mod fetch;

pub use corpus::{discover_cases, read_case};
pub use fetch::{
    ArchiveSource, ExtractMode, ExtractStats, FetchError, HttpArchiveSource, stage_and_extract,
};

use anyhow::Context;
use std::io::Read;
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

/// How long reader threads get to see EOF after the process group is killed.
const KILL_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub argv: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,

    /// Bytes written to the child's stdin, which is closed afterwards.
    /// `None` connects stdin to the null device.
    pub stdin: Option<Vec<u8>>,

    pub timeout: Option<Duration>,

    /// Bytes kept from each of stdout and stderr; `None` keeps everything.
    /// The rest of the stream is still drained.
    pub output_cap_bytes: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct RunResult {
    /// Spawn to output capture, including process startup and teardown.
    pub wall: Duration,
    pub exit_code: i32,
    pub timed_out: bool,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("command argv must not be empty")]
    EmptyArgv,

    #[error("failed to spawn {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("corpus directory {path} is not readable")]
    CorpusUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read case {path}")]
    CaseUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub trait ProcessRunner {
    fn run(&self, spec: &CommandSpec) -> Result<RunResult, AdapterError>;
}

#[derive(Debug, Default, Clone)]
pub struct StdProcessRunner;

impl ProcessRunner for StdProcessRunner {
    fn run(&self, spec: &CommandSpec) -> Result<RunResult, AdapterError> {
        if spec.argv.is_empty() {
            return Err(AdapterError::EmptyArgv);
        }

        #[cfg(unix)]
        {
            run_unix(spec)
        }

        #[cfg(not(unix))]
        {
            run_portable(spec)
        }
    }
}

fn build_command(spec: &CommandSpec) -> std::process::Command {
    use std::process::{Command, Stdio};

    let mut cmd = Command::new(&spec.argv[0]);
    if spec.argv.len() > 1 {
        cmd.args(&spec.argv[1..]);
    }

    if let Some(cwd) = &spec.cwd {
        cmd.current_dir(cwd);
    }

    for (k, v) in &spec.env {
        cmd.env(k, v);
    }

    cmd.stdin(if spec.stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

#[derive(Debug, Default)]
struct Captured {
    stdout: Vec<u8>,
    stderr: Vec<u8>,

    /// The deadline passed before both streams reached EOF.
    expired: bool,
}

/// Child stdout/stderr, each drained on its own thread and handed back over a
/// channel so collection can be bounded by the case deadline.
struct PipeThreads {
    rx: mpsc::Receiver<(Stream, Vec<u8>)>,
}

impl PipeThreads {
    fn start(child: &mut std::process::Child, spec: &CommandSpec) -> Result<Self, AdapterError> {
        use std::io::Write;

        let mut stdout = child
            .stdout
            .take()
            .context("child stdout was not captured")?;
        let mut stderr = child
            .stderr
            .take()
            .context("child stderr was not captured")?;

        if let (Some(mut pipe), Some(bytes)) = (child.stdin.take(), spec.stdin.clone()) {
            // A solver may exit before reading everything; a broken pipe is fine.
            thread::spawn(move || {
                let _ = pipe.write_all(&bytes);
            });
        }

        let (tx, rx) = mpsc::channel();
        let cap = spec.output_cap_bytes.unwrap_or(usize::MAX);
        let tx_err = tx.clone();
        thread::spawn(move || {
            let _ = tx.send((Stream::Stdout, read_with_cap(&mut stdout, cap)));
        });
        thread::spawn(move || {
            let _ = tx_err.send((Stream::Stderr, read_with_cap(&mut stderr, cap)));
        });

        Ok(Self { rx })
    }

    /// Wait for both streams to reach EOF.
    ///
    /// Anything still holding a pipe open (a background child of the solver,
    /// say) must not stretch a case past its deadline. When `deadline` passes,
    /// `expire` is called once; it returns `true` if it killed the pipe holders,
    /// in which case the readers get [`KILL_GRACE`] to finish. Otherwise, or
    /// once the grace runs out, the readers are abandoned.
    fn finish(self, deadline: Option<Instant>, mut expire: impl FnMut() -> bool) -> Captured {
        let mut out = Captured::default();
        let mut deadline = deadline;
        let mut pending = 2;

        while pending > 0 {
            let received = match deadline {
                Some(at) => self
                    .rx
                    .recv_timeout(at.saturating_duration_since(Instant::now())),
                None => self.rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };

            match received {
                Ok((Stream::Stdout, bytes)) => out.stdout = bytes,
                Ok((Stream::Stderr, bytes)) => out.stderr = bytes,
                Err(RecvTimeoutError::Timeout) => {
                    if out.expired || !expire() {
                        out.expired = true;
                        break;
                    }
                    out.expired = true;
                    deadline = Instant::now().checked_add(KILL_GRACE);
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
            pending -= 1;
        }

        out
    }
}

fn spawn_error(spec: &CommandSpec, source: std::io::Error) -> AdapterError {
    AdapterError::Spawn {
        program: spec.argv[0].clone(),
        source,
    }
}

#[cfg(not(unix))]
fn run_portable(spec: &CommandSpec) -> Result<RunResult, AdapterError> {
    let mut cmd = build_command(spec);

    let start = Instant::now();
    let deadline = spec.timeout.and_then(|t| start.checked_add(t));
    let mut child = cmd.spawn().map_err(|e| spawn_error(spec, e))?;
    let pipes = PipeThreads::start(&mut child, spec)?;

    let mut killed = false;
    let status = loop {
        if let Some(status) = child
            .try_wait()
            .with_context(|| format!("failed to wait for {:?}", spec.argv))?
        {
            break status;
        }
        if deadline.is_some_and(|at| Instant::now() >= at) {
            killed = true;
            let _ = child.kill();
            break child
                .wait()
                .with_context(|| format!("failed to reap {:?}", spec.argv))?;
        }
        thread::sleep(Duration::from_millis(10));
    };

    // Descendants cannot be reached from here, so leftover pipe holders are
    // abandoned at the deadline.
    let captured = pipes.finish(deadline, || false);
    let wall = start.elapsed();

    Ok(RunResult {
        wall,
        exit_code: status.code().unwrap_or(-1),
        timed_out: killed || captured.expired,
        stdout: captured.stdout,
        stderr: captured.stderr,
    })
}

#[cfg(unix)]
fn run_unix(spec: &CommandSpec) -> Result<RunResult, AdapterError> {
    use std::os::unix::process::{CommandExt, ExitStatusExt};

    let mut cmd = build_command(spec);
    // Own process group, so a timeout also takes down anything the solver forked
    // (e.g. `cargo run` and the binary it launches).
    cmd.process_group(0);

    let start = Instant::now();
    let deadline = spec.timeout.and_then(|t| start.checked_add(t));
    let mut child = cmd.spawn().map_err(|e| spawn_error(spec, e))?;

    let pid = child.id() as libc::pid_t;
    let pipes = PipeThreads::start(&mut child, spec)?;

    let (status_raw, killed) = wait_until(pid, deadline)?;

    // Safety: we have reaped the child via waitpid; drop the Child handle without waiting.
    drop(child);

    let captured = pipes.finish(deadline, || {
        kill_group(pid);
        true
    });
    // Nothing the solver started may outlive its case.
    kill_group(pid);
    let wall = start.elapsed();

    let exit_status = std::process::ExitStatus::from_raw(status_raw);
    let exit_code = exit_status.code().unwrap_or(-1);

    Ok(RunResult {
        wall,
        exit_code,
        timed_out: killed || captured.expired,
        stdout: captured.stdout,
        stderr: captured.stderr,
    })
}

/// SIGKILL every process left in group `pgid`. A group that is already empty
/// is not an error.
#[cfg(unix)]
fn kill_group(pgid: libc::pid_t) {
    unsafe {
        libc::kill(-pgid, libc::SIGKILL);
    }
}

fn read_with_cap<R: Read>(reader: &mut R, cap: usize) -> Vec<u8> {
    let mut buf: Vec<u8> = Vec::new();
    let mut tmp = [0u8; 8192];

    loop {
        match reader.read(&mut tmp) {
            Ok(0) => break,
            Ok(n) => {
                if buf.len() < cap {
                    let remaining = cap - buf.len();
                    let take = remaining.min(n);
                    buf.extend_from_slice(&tmp[..take]);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }

    buf
}

/// Reap `pid`, killing its process group if `deadline` passes first.
#[cfg(unix)]
fn wait_until(
    pid: libc::pid_t,
    deadline: Option<Instant>,
) -> Result<(libc::c_int, bool), AdapterError> {
    let mut status: libc::c_int = 0;
    let mut killed = false;

    loop {
        let options = if deadline.is_some() { libc::WNOHANG } else { 0 };

        let res = unsafe { libc::waitpid(pid, &mut status as *mut libc::c_int, options) };

        if res == pid {
            break;
        }

        if res == 0 {
            // still running
            if deadline.is_some_and(|at| Instant::now() >= at) {
                killed = true;
                kill_group(pid);
                // Reap it.
                let res2 = unsafe { libc::waitpid(pid, &mut status as *mut libc::c_int, 0) };
                if res2 != pid {
                    return Err(AdapterError::Other(anyhow::anyhow!(
                        "waitpid after kill failed: {:?}",
                        std::io::Error::last_os_error()
                    )));
                }
                break;
            }
            thread::sleep(Duration::from_millis(10));
            continue;
        }

        if res == -1 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            return Err(AdapterError::Other(anyhow::anyhow!("waitpid failed: {err}")));
        }

        // Any other pid is unexpected.
        return Err(AdapterError::Other(anyhow::anyhow!(
            "waitpid returned unexpected pid: {res}"
        )));
    }

    Ok((status, killed))
}
