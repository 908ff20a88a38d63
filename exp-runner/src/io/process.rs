//! Helpers for running one child process to completion.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

use crate::core::types::{CapturedOutput, StreamMode};

/// How long to keep draining pipes after a timed-out child was killed.
///
/// A descendant of the killed child can hold the pipes open indefinitely;
/// past this point its remaining output is dropped.
pub const DRAIN_GRACE: Duration = Duration::from_millis(500);

type StreamResult = Result<(Vec<u8>, usize)>;

/// Outcome of a finished child process.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    /// Present only for [`StreamMode::Capture`].
    pub captured: Option<CapturedOutput>,
    pub timed_out: bool,
    pub elapsed: Duration,
}

/// Spawn `cmd` and block until it exits.
///
/// With [`StreamMode::Capture`], stdout and stderr are drained on reader threads
/// while the child runs so a chatty child can never deadlock on a full pipe.
/// With `timeout` set, a child that outlives it is killed and reaped, and the
/// readers get [`DRAIN_GRACE`] to finish before the output is given up.
#[instrument(skip_all, fields(timeout_secs = timeout.map(|t| t.as_secs()), capture = matches!(mode, StreamMode::Capture { .. })))]
pub fn run_command(
    mut cmd: Command,
    mode: StreamMode,
    timeout: Option<Duration>,
) -> Result<CommandOutput> {
    if let StreamMode::Capture { .. } = mode {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
    }

    debug!("spawning child process");
    let started = Instant::now();
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let output = match mode {
        StreamMode::Inherit => {
            let (status, timed_out) = wait_child(&mut child, timeout)?;
            CommandOutput {
                status,
                captured: None,
                timed_out,
                elapsed: started.elapsed(),
            }
        }
        StreamMode::Capture { limit_bytes } => {
            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| anyhow!("stdout was not piped"))?;
            let stderr = child
                .stderr
                .take()
                .ok_or_else(|| anyhow!("stderr was not piped"))?;

            let stdout_rx = spawn_reader(stdout, limit_bytes);
            let stderr_rx = spawn_reader(stderr, limit_bytes);

            let (status, timed_out) = wait_child(&mut child, timeout)?;
            let drain_deadline = timed_out.then(|| Instant::now() + DRAIN_GRACE);

            let (stdout, stdout_truncated) = collect_output(&stdout_rx, drain_deadline, "stdout")?;
            let (stderr, stderr_truncated) = collect_output(&stderr_rx, drain_deadline, "stderr")?;
            if stdout_truncated > 0 || stderr_truncated > 0 {
                warn!(stdout_truncated, stderr_truncated, "output truncated");
            }

            CommandOutput {
                status,
                captured: Some(CapturedOutput {
                    stdout,
                    stderr,
                    stdout_truncated,
                    stderr_truncated,
                }),
                timed_out,
                elapsed: started.elapsed(),
            }
        }
    };

    debug!(exit_code = ?output.status.code(), timed_out = output.timed_out, "command finished");
    Ok(output)
}

fn wait_child(child: &mut Child, timeout: Option<Duration>) -> Result<(ExitStatus, bool)> {
    let Some(timeout) = timeout else {
        let status = child.wait().context("wait for command")?;
        return Ok((status, false));
    };
    match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => Ok((status, false)),
        None => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "command timed out, killing"
            );
            child.kill().context("kill command")?;
            let status = child.wait().context("wait command after kill")?;
            Ok((status, true))
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(reader: R, limit: usize) -> Receiver<StreamResult> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        // Receiver is gone when the driver stopped waiting for this stream.
        let _ = tx.send(read_stream_limited(reader, limit));
    });
    rx
}

/// Wait for a reader thread's result, until `deadline` when set.
///
/// On expiry the reader is left detached and the stream reported as empty
/// with nothing counted as truncated.
fn collect_output(
    rx: &Receiver<StreamResult>,
    deadline: Option<Instant>,
    label: &str,
) -> Result<(Vec<u8>, usize)> {
    let result = match deadline {
        None => rx.recv().map_err(|_| anyhow!("{label} reader thread panicked"))?,
        Some(deadline) => {
            match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                Ok(result) => result,
                Err(RecvTimeoutError::Timeout) => {
                    warn!(stream = label, "pipe still held open after kill, dropping output");
                    return Ok((Vec::new(), 0));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(anyhow!("{label} reader thread panicked"));
                }
            }
        }
    };
    result.with_context(|| format!("read {label}"))
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}
