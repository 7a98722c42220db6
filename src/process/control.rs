//! Spawning helpers shared by the probe, the log aggregator and the launcher.

use std::collections::VecDeque;
use std::fs::File;
use std::path::Path;
use std::process::{ExitStatus, Output, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt as _, AsyncRead, AsyncReadExt as _, AsyncWriteExt as _, BufReader};
use tokio::process::{Child, Command};

use crate::error::{AppError, Result};

/// Run a short-lived command to completion, capturing stdout and stderr.
///
/// The timeout is a hard cap: the child is killed when it is exceeded.
pub async fn run_with_timeout(mut cmd: Command, label: &str, timeout: Duration) -> Result<Output> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd
        .spawn()
        .map_err(|e| AppError::io(format!("Failed to spawn {}: {}", label, e)))?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(AppError::io(format!("Failed to wait for {}: {}", label, e))),
        Err(_) => {
            log::warn!("{} timed out after {}s", label, timeout.as_secs());
            Err(AppError::timeout(label, timeout.as_secs()))
        }
    }
}

/// Most stderr kept from a windowed command; the rest is drained and dropped.
const STDERR_CAP: usize = 64 * 1024;

/// Exit status and the bounded output of [`run_tail_window`].
#[derive(Debug)]
pub struct TailOutput {
    pub status: ExitStatus,
    /// Last lines of stdout, newline-terminated.
    pub tail: String,
    pub stderr: String,
}

/// Run a command whose stdout may be arbitrarily large and keep only its
/// last `lines` lines.
///
/// stdout is consumed as it streams, so memory stays bounded by the window
/// rather than by the command's output. Same timeout rules as
/// [`run_with_timeout`].
pub async fn run_tail_window(
    mut cmd: Command,
    label: &str,
    timeout: Duration,
    lines: usize,
) -> Result<TailOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .map_err(|e| AppError::io(format!("Failed to spawn {}: {}", label, e)))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::io(format!("Missing stdout pipe for {}", label)))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::io(format!("Missing stderr pipe for {}", label)))?;

    let collect = async {
        let (tail, stderr, status) = tokio::join!(
            read_tail(stdout, lines),
            read_capped(stderr, STDERR_CAP),
            child.wait()
        );
        Ok::<_, std::io::Error>(TailOutput {
            status: status?,
            tail: tail?,
            stderr: String::from_utf8_lossy(&stderr?).into_owned(),
        })
    };

    match tokio::time::timeout(timeout, collect).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(AppError::io(format!("Failed to read {} output: {}", label, e))),
        Err(_) => {
            log::warn!("{} timed out after {}s", label, timeout.as_secs());
            Err(AppError::timeout(label, timeout.as_secs()))
        }
    }
}

async fn read_tail<R: AsyncRead + Unpin>(reader: R, lines: usize) -> std::io::Result<String> {
    let mut reader = BufReader::new(reader);
    let mut window: VecDeque<String> = VecDeque::with_capacity(lines);
    let mut line = Vec::new();

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            break;
        }
        if lines == 0 {
            continue;
        }
        if window.len() == lines {
            window.pop_front();
        }
        let text = String::from_utf8_lossy(&line);
        window.push_back(text.trim_end_matches('\n').to_string());
    }

    let mut out = Vec::from(window).join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    Ok(out)
}

async fn read_capped<R: AsyncRead + Unpin>(mut reader: R, max_bytes: usize) -> std::io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let keep = max_bytes.saturating_sub(buffer.len()).min(n);
        buffer.extend_from_slice(&chunk[..keep]);
    }
    Ok(buffer)
}

/// Make the child a session leader so it outlives the launcher.
#[cfg(unix)]
pub fn apply_new_session(cmd: &mut Command) {
    // SAFETY: setsid(2) is async-signal-safe and only touches the child.
    unsafe {
        cmd.pre_exec(|| {
            nix::unistd::setsid()
                .map(|_| ())
                .map_err(std::io::Error::from)
        });
    }
}

#[cfg(not(unix))]
pub fn apply_new_session(_cmd: &mut Command) {}

/// Truncate/create an operation log and return it as (stdout, stderr) handles
/// pointing at the same open file.
pub fn open_operation_log(path: &Path) -> Result<(Stdio, Stdio)> {
    let file = File::create(path)
        .map_err(|e| AppError::io(format!("Failed to open log {}: {}", path.display(), e)))?;
    let err_file = file
        .try_clone()
        .map_err(|e| AppError::io(format!("Failed to clone log handle {}: {}", path.display(), e)))?;
    Ok((Stdio::from(file), Stdio::from(err_file)))
}

/// Write the whole answer script in one go, then close stdin.
///
/// A child that exits before reading its input closes the pipe; that is
/// logged, not treated as a launch failure.
pub async fn feed_stdin(child: &mut Child, input: &[u8]) -> Result<()> {
    let Some(mut stdin) = child.stdin.take() else {
        return Ok(());
    };

    match stdin.write_all(input).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
            log::warn!("Child closed stdin before reading its answers");
        }
        Err(e) => return Err(AppError::io(format!("Failed to write answers: {}", e))),
    }

    if let Err(e) = stdin.shutdown().await {
        log::debug!("stdin shutdown: {}", e);
    }
    drop(stdin);
    Ok(())
}

/// Read back an operation log for inclusion in an error payload.
pub fn read_log_lossy(path: &Path) -> String {
    match std::fs::read(path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => format!("Failed to read log {}: {}", path.display(), e),
    }
}

/// Keep the last `lines` lines of `text`.
pub fn tail_lines(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(lines);
    let mut out = all[start..].join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}
