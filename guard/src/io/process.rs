//! Shell execution with timeouts and bounded output.

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Limits applied to every review/judge command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandLimits {
    /// Maximum time before the child is killed.
    pub timeout: Duration,
    /// Maximum bytes kept from each of stdout/stderr.
    pub output_limit_bytes: usize,
}

/// Captured child process output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the child was killed by a signal (including timeout) or never ran.
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// Output for a command that could not be started at all.
    pub fn spawn_failure(message: impl Into<String>) -> Self {
        Self {
            stderr: message.into().into_bytes(),
            ..Self::default()
        }
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// One-line description of how the command ended.
    pub fn exit_summary(&self, limits: &CommandLimits) -> String {
        if self.timed_out {
            format!("timed out after {}s", limits.timeout.as_secs())
        } else {
            match self.exit_code {
                Some(code) => format!("exit code {code}"),
                None => "terminated without exit code".to_string(),
            }
        }
    }
}

/// How long output readers may keep draining after the child is reaped.
const READER_GRACE: Duration = Duration::from_millis(500);
const READER_POLL: Duration = Duration::from_millis(10);

/// Run `shell... command` in `workdir`, capturing output without risking pipe deadlocks.
///
/// Output is drained concurrently while the child runs; bytes past
/// `output_limit_bytes` are counted but discarded. The child leads its own
/// process group, so on timeout everything it forked is killed with it and
/// whatever was buffered is returned with `timed_out = true`.
#[instrument(skip_all, fields(timeout_secs = limits.timeout.as_secs()))]
pub fn run_shell(
    shell: &[String],
    command: &str,
    workdir: &Path,
    limits: &CommandLimits,
) -> Result<CommandOutput> {
    let (program, shell_args) = shell
        .split_first()
        .ok_or_else(|| anyhow!("shell must name a program"))?;
    let mut cmd = Command::new(program);
    cmd.args(shell_args)
        .arg(command)
        .current_dir(workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    debug!(command, "spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).with_context(|| format!("spawn {program}"));
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let limit = limits.output_limit_bytes;
    let started = Instant::now();
    let stdout_reader = StreamReader::spawn(stdout, limit);
    let stderr_reader = StreamReader::spawn(stderr, limit);

    let mut timed_out = false;
    let status = match child.wait_timeout(limits.timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(
                timeout_secs = limits.timeout.as_secs(),
                "command timed out, killing"
            );
            timed_out = true;
            kill_process_group(child.id());
            child.kill().context("kill command")?;
            child.wait().context("wait command after kill")?
        }
    };

    // A background process can outlive the shell and hold the pipes open.
    let deadline = if timed_out {
        Instant::now() + READER_GRACE
    } else {
        (started + limits.timeout).max(Instant::now()) + READER_GRACE
    };
    let (stdout, stdout_truncated) = stdout_reader.finish(deadline).context("drain stdout")?;
    let (stderr, stderr_truncated) = stderr_reader.finish(deadline).context("drain stderr")?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        exit_code: if timed_out { None } else { status.code() },
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

#[cfg(unix)]
fn kill_process_group(pgid: u32) {
    let status = Command::new("kill")
        .args(["-KILL", "--", &format!("-{pgid}")])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match status {
        Ok(status) if status.success() => debug!(pgid, "killed process group"),
        Ok(status) => warn!(pgid, %status, "could not kill process group"),
        Err(err) => warn!(pgid, err = %err, "could not kill process group"),
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: u32) {}

/// Bytes kept from one stream and the count discarded past the limit.
#[derive(Debug, Default)]
struct Captured {
    buf: Vec<u8>,
    truncated: usize,
}

/// Background reader filling a shared [`Captured`] buffer until EOF.
struct StreamReader {
    captured: Arc<Mutex<Captured>>,
    handle: thread::JoinHandle<Result<()>>,
}

impl StreamReader {
    fn spawn<R: Read + Send + 'static>(reader: R, limit: usize) -> Self {
        let captured = Arc::new(Mutex::new(Captured::default()));
        let sink = Arc::clone(&captured);
        let handle = thread::spawn(move || read_stream_limited(reader, limit, &sink));
        Self { captured, handle }
    }

    /// Wait for EOF until `deadline`, then take what was read.
    ///
    /// A reader still blocked at the deadline is left detached; it exits on
    /// its own once the last writer closes the pipe.
    fn finish(self, deadline: Instant) -> Result<(Vec<u8>, usize)> {
        while !self.handle.is_finished() && Instant::now() < deadline {
            thread::sleep(READER_POLL);
        }
        if self.handle.is_finished() {
            match self.handle.join() {
                Ok(result) => result?,
                Err(_) => bail!("output reader thread panicked"),
            }
        } else {
            warn!("output pipe still open after the command ended, not waiting further");
        }
        let mut captured = self
            .captured
            .lock()
            .map_err(|_| anyhow!("output buffer poisoned"))?;
        Ok((std::mem::take(&mut captured.buf), captured.truncated))
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize, sink: &Mutex<Captured>) -> Result<()> {
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            return Ok(());
        }
        let mut captured = sink.lock().map_err(|_| anyhow!("output buffer poisoned"))?;
        let remaining = limit.saturating_sub(captured.buf.len());
        let keep = n.min(remaining);
        captured.buf.extend_from_slice(&chunk[..keep]);
        captured.truncated += n - keep;
    }
}
