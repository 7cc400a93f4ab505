//! Spawning external tools and streaming their output into the harness log

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::info;

use crate::error::{HarnessError, HarnessResult};

/// Handle to a long-running tool process (dev and preview servers).
///
/// The child is killed on drop as a backstop; callers should prefer
/// [`ToolHandle::stop`] so the process gets a chance to exit cleanly.
pub struct ToolHandle {
    tool: &'static str,
    dir: PathBuf,
    child: Child,
}

impl ToolHandle {
    /// Spawn `program args..` in `dir` with every stdout/stderr line
    /// forwarded to the log, prefixed with the tool name.
    pub fn spawn(
        tool: &'static str,
        program: &str,
        args: &[&str],
        dir: &Path,
    ) -> HarnessResult<Self> {
        let mut child = Command::new(program)
            .args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(out) = child.stdout.take() {
            forward_lines(tool, out);
        }
        if let Some(err) = child.stderr.take() {
            forward_lines(tool, err);
        }

        Ok(Self {
            tool,
            dir: dir.to_path_buf(),
            child,
        })
    }

    /// Wait for the process to exit; a non-zero status is an error.
    pub async fn wait(&mut self) -> HarnessResult<()> {
        let status = self.child.wait().await?;
        check_status(self.tool, status, &self.dir)
    }

    /// Terminate the process: SIGTERM first, then a hard kill.
    pub async fn stop(mut self) {
        #[cfg(unix)]
        if let Some(pid) = self.child.id() {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok() {
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }

        let _ = self.child.kill().await;
        let _ = self.child.wait().await;
    }
}

/// Spawn a tool, stream its output, and wait for it to exit successfully.
pub async fn run_logged(
    tool: &'static str,
    program: &str,
    args: &[&str],
    dir: &Path,
) -> HarnessResult<()> {
    info!("[{}] $ {} {}", tool, program, args.join(" "));
    let mut handle = ToolHandle::spawn(tool, program, args, dir)?;
    handle.wait().await
}

/// Run a tool to completion and capture its stdout verbatim.
///
/// stderr is inherited so tool diagnostics still reach the console;
/// stdout must stay clean because the caller parses or compares it.
pub async fn run_captured(
    tool: &'static str,
    program: &str,
    args: &[&str],
    dir: &Path,
) -> HarnessResult<Vec<u8>> {
    let output = Command::new(program)
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .output()
        .await?;

    check_status(tool, output.status, dir)?;
    Ok(output.stdout)
}

fn forward_lines(tool: &'static str, reader: impl AsyncRead + Unpin + Send + 'static) {
    let mut lines = BufReader::new(reader).lines();
    tokio::spawn(async move {
        // next_line also yields a trailing partial line at EOF, so nothing
        // is lost when a tool exits mid-line.
        while let Ok(Some(line)) = lines.next_line().await {
            info!("[{}] {}", tool, line);
        }
    });
}

fn check_status(tool: &'static str, status: ExitStatus, dir: &Path) -> HarnessResult<()> {
    if status.success() {
        return Ok(());
    }
    match status.code() {
        Some(code) => Err(HarnessError::ToolFailed {
            tool,
            status: code,
            dir: dir.to_path_buf(),
        }),
        None => Err(HarnessError::ToolKilled {
            tool,
            dir: dir.to_path_buf(),
        }),
    }
}
