//! Std adapters for qorgate.
//!
//! In clean-arch terms: this is where we touch the world.

pub mod fs;
mod tree;

pub use tree::descendants_of;

use anyhow::Context;
use qorgate_types::{CommandResult, DEFAULT_TIMEOUT_SECS};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

/// One shell command line plus the environment it runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Interpreted by `/bin/sh -c` (`cmd /C` on Windows).
    pub command_line: String,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new(command_line: impl Into<String>) -> Self {
        Self {
            command_line: command_line.into(),
            cwd: None,
            env: Vec::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn cwd(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("command line must not be empty")]
    EmptyCommand,

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Runs one command to completion or until its timeout.
///
/// A non-zero exit code is data, not an error; only failing to start the
/// command (or to wait on it) is.
pub trait ProcessRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandResult, AdapterError>;
}

impl<R: ProcessRunner + ?Sized> ProcessRunner for &R {
    fn run(&self, spec: &CommandSpec) -> Result<CommandResult, AdapterError> {
        (**self).run(spec)
    }
}

#[derive(Debug, Default, Clone)]
pub struct StdProcessRunner;

impl ProcessRunner for StdProcessRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandResult, AdapterError> {
        if spec.command_line.trim().is_empty() {
            return Err(AdapterError::EmptyCommand);
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

/// Number of workers used when the config does not say.
pub fn default_jobs() -> usize {
    num_cpus::get().max(1)
}

/// Resolve an external tool on `PATH`.
pub fn locate_tool(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

fn timed_out_result(start: Instant) -> CommandResult {
    CommandResult {
        stdout: String::new(),
        stderr: String::new(),
        exit_code: -1,
        wall_us: start.elapsed().as_micros() as u64,
        timed_out: true,
    }
}

fn decode(bytes: Vec<u8>) -> String {
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(not(unix))]
fn run_portable(spec: &CommandSpec) -> Result<CommandResult, AdapterError> {
    use std::process::{Command, Stdio};

    let start = Instant::now();
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(&spec.command_line);

    if let Some(cwd) = &spec.cwd {
        cmd.current_dir(cwd);
    }
    for (k, v) in &spec.env {
        cmd.env(k, v);
    }
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|source| AdapterError::Spawn {
        command: spec.command_line.clone(),
        source,
    })?;

    let deadline = start + spec.timeout;
    let out_rx = spawn_reader(child.stdout.take());
    let err_rx = spawn_reader(child.stderr.take());

    loop {
        if let Some(status) = child
            .try_wait()
            .with_context(|| format!("failed to wait for `{}`", spec.command_line))?
        {
            let Some((stdout, stderr)) = collect_until(out_rx, deadline)
                .and_then(|o| collect_until(err_rx, deadline).map(|e| (o, e)))
            else {
                return Ok(timed_out_result(start));
            };
            return Ok(CommandResult {
                stdout,
                stderr,
                exit_code: status.code().unwrap_or(-1),
                wall_us: start.elapsed().as_micros() as u64,
                timed_out: false,
            });
        }
        if Instant::now() >= deadline {
            // No process tree on this platform; only the direct child is killed.
            let _ = child.kill();
            let _ = child.wait();
            return Ok(timed_out_result(start));
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

/// Drains `stream` on its own thread; the bytes arrive once it hits EOF.
fn spawn_reader<R>(stream: Option<R>) -> Option<Receiver<Vec<u8>>>
where
    R: std::io::Read + Send + 'static,
{
    let mut stream = stream?;
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stream.read_to_end(&mut buf);
        let _ = tx.send(buf);
    });
    Some(rx)
}

/// `None` when the pipe is still open at `deadline`: something that outlived
/// the shell holds it.
fn collect_until(reader: Option<Receiver<Vec<u8>>>, deadline: Instant) -> Option<String> {
    let Some(rx) = reader else {
        return Some(String::new());
    };
    let budget = deadline.saturating_duration_since(Instant::now());
    match rx.recv_timeout(budget) {
        Ok(bytes) => Some(decode(bytes)),
        Err(RecvTimeoutError::Disconnected) => Some(String::new()),
        Err(RecvTimeoutError::Timeout) => None,
    }
}

#[cfg(unix)]
fn run_unix(spec: &CommandSpec) -> Result<CommandResult, AdapterError> {
    use std::os::unix::process::{CommandExt, ExitStatusExt};
    use std::process::{Command, Stdio};

    let start = Instant::now();

    let mut cmd = Command::new("/bin/sh");
    cmd.arg("-c").arg(&spec.command_line);

    if let Some(cwd) = &spec.cwd {
        cmd.current_dir(cwd);
    }

    for (k, v) in &spec.env {
        cmd.env(k, v);
    }

    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    // New process group: the whole subtree can be signalled at once.
    cmd.process_group(0);

    let mut child = cmd.spawn().map_err(|source| AdapterError::Spawn {
        command: spec.command_line.clone(),
        source,
    })?;

    let pid = child.id() as libc::pid_t;

    let deadline = start + spec.timeout;
    let out_rx = spawn_reader(child.stdout.take());
    let err_rx = spawn_reader(child.stderr.take());

    let waited = wait_until(pid, deadline)?;

    // Safety: the child has been reaped by waitpid; drop the handle without waiting.
    drop(child);

    if let Waited::Exited(status_raw) = waited {
        // The shell is gone, but a background job can still hold its pipes.
        let output = collect_until(out_rx, deadline)
            .and_then(|o| collect_until(err_rx, deadline).map(|e| (o, e)));
        if let Some((stdout, stderr)) = output {
            let exit_status = std::process::ExitStatus::from_raw(status_raw);
            return Ok(CommandResult {
                stdout,
                stderr,
                exit_code: exit_status.code().unwrap_or(-1),
                wall_us: start.elapsed().as_micros() as u64,
                timed_out: false,
            });
        }
        tree::kill_group(pid);
    }

    tracing::warn!(
        command = %spec.command_line,
        timeout = ?spec.timeout,
        "command timed out; process tree killed"
    );
    // Readers finish once the killed tree closes its pipes; the output of a
    // timed-out command is discarded, so nobody waits for them.
    Ok(timed_out_result(start))
}

#[cfg(unix)]
enum Waited {
    Exited(libc::c_int),
    TimedOut,
}

#[cfg(unix)]
fn wait_until(pid: libc::pid_t, deadline: Instant) -> Result<Waited, AdapterError> {
    let mut status: libc::c_int = 0;

    loop {
        let res = unsafe { libc::waitpid(pid, &mut status as *mut libc::c_int, libc::WNOHANG) };

        if res == pid {
            return Ok(Waited::Exited(status));
        }

        if res == 0 {
            // still running
            if Instant::now() >= deadline {
                tree::kill_tree(pid);
                // Reap it.
                let res2 = unsafe { libc::waitpid(pid, &mut status as *mut libc::c_int, 0) };
                if res2 != pid {
                    return Err(AdapterError::Other(anyhow::anyhow!(
                        "waitpid after kill failed: {:?}",
                        std::io::Error::last_os_error()
                    )));
                }
                return Ok(Waited::TimedOut);
            }
            std::thread::sleep(Duration::from_millis(10));
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
}
