//! Blocking subprocess execution with a deadline.
//!
//! Both external collaborators (the TTS program and ffmpeg) are driven as
//! child processes. Inference and encode latency is unbounded, so every call
//! goes through [`run_with_timeout`], which kills the child once the deadline
//! passes.

use std::ffi::OsStr;
use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{GreetError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Captured result of a finished child process.
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Run `program` with `args`, waiting at most `timeout`.
///
/// `what` names the operation in timeout errors and logs. Output pipes are
/// drained on background threads so a chatty child cannot block on a full
/// pipe while we poll.
pub fn run_with_timeout<P, I, S>(
    program: P,
    args: I,
    timeout: Option<Duration>,
    what: &str,
) -> Result<ProcessOutput>
where
    P: AsRef<OsStr>,
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut child = Command::new(program.as_ref())
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout_reader = child.stdout.take().map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    });
    let stderr_reader = child.stderr.take().map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    });

    let started = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if let Some(limit) = timeout {
            if started.elapsed() >= limit {
                log::warn!("{} timed out after {:?}, killing process", what, limit);
                let _ = child.kill();
                let _ = child.wait();
                return Err(GreetError::Timeout {
                    what: what.to_string(),
                    secs: limit.as_secs(),
                });
            }
        }
        thread::sleep(POLL_INTERVAL);
    };

    let stdout = stdout_reader
        .and_then(|h| h.join().ok())
        .unwrap_or_default();
    let stderr = stderr_reader
        .and_then(|h| h.join().ok())
        .map(|b| String::from_utf8_lossy(&b).into_owned())
        .unwrap_or_default();

    log::debug!("{} finished in {:.2}s ({})", what, started.elapsed().as_secs_f64(), status);

    Ok(ProcessOutput {
        status,
        stdout,
        stderr,
    })
}

/// Last `max_lines` lines of stderr, for error messages.
pub fn stderr_tail(stderr: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}
