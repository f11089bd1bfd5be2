//! Async process execution with a deadline, cooperative cancellation, and a
//! terminate-then-kill grace period.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::Child;
use tokio::sync::Mutex;

use sf_adapter_api::CancellationToken;

use crate::command_spec::CommandSpec;
use crate::error::RunnerError;

/// Grace period between a gentle terminate signal and a forceful kill.
pub const TERMINATE_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Output from a process execution. `timed_out` is set when the deadline (or
/// an external cancellation) was hit before the process exited on its own;
/// `stdout`/`stderr` then hold whatever was captured before termination, for
/// adapters whose tool supports streaming partial output.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

impl ProcessOutput {
    #[must_use]
    pub fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    #[must_use]
    pub fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }

    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0) && !self.timed_out
    }
}

/// Process execution, abstracted so adapters can be tested against a mock
/// runner instead of spawning real binaries.
///
/// Implementations MUST use argv-style APIs only — [`CommandSpec`] makes
/// shell-string evaluation impossible to construct in the first place.
#[async_trait]
pub trait AsyncProcessRunner: Send + Sync {
    async fn run(
        &self,
        cmd: &CommandSpec,
        timeout: Duration,
        cancellation: &CancellationToken,
    ) -> Result<ProcessOutput, RunnerError>;
}

/// Default runner: spawns via `tokio::process`, races completion against the
/// deadline and the cancellation token, and on either firing sends a gentle
/// terminate followed by a forceful kill after [`TERMINATE_GRACE_PERIOD`].
pub struct TokioProcessRunner;

impl Default for TokioProcessRunner {
    fn default() -> Self {
        Self
    }
}

#[async_trait]
impl AsyncProcessRunner for TokioProcessRunner {
    async fn run(
        &self,
        cmd: &CommandSpec,
        timeout: Duration,
        cancellation: &CancellationToken,
    ) -> Result<ProcessOutput, RunnerError> {
        let mut child = cmd
            .to_tokio_command()
            .spawn()
            .map_err(|e| RunnerError::SpawnFailed { reason: e.to_string() })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdout_buf = Arc::new(Mutex::new(Vec::new()));
        let stderr_buf = Arc::new(Mutex::new(Vec::new()));

        let stdout_task = spawn_drain(stdout, Arc::clone(&stdout_buf));
        let stderr_task = spawn_drain(stderr, Arc::clone(&stderr_buf));

        tokio::select! {
            status = child.wait() => {
                let status = status?;
                if let Some(task) = stdout_task { let _ = task.await; }
                if let Some(task) = stderr_task { let _ = task.await; }
                Ok(ProcessOutput {
                    stdout: stdout_buf.lock().await.clone(),
                    stderr: stderr_buf.lock().await.clone(),
                    exit_code: status.code(),
                    timed_out: false,
                })
            }
            () = tokio::time::sleep(timeout) => {
                terminate_then_kill(&mut child).await;
                Ok(ProcessOutput {
                    stdout: stdout_buf.lock().await.clone(),
                    stderr: stderr_buf.lock().await.clone(),
                    exit_code: None,
                    timed_out: true,
                })
            }
            () = cancellation.canceled() => {
                terminate_then_kill(&mut child).await;
                Ok(ProcessOutput {
                    stdout: stdout_buf.lock().await.clone(),
                    stderr: stderr_buf.lock().await.clone(),
                    exit_code: None,
                    timed_out: true,
                })
            }
        }
    }
}

fn spawn_drain<R>(
    reader: Option<R>,
    buf: Arc<Mutex<Vec<u8>>>,
) -> Option<tokio::task::JoinHandle<()>>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    let reader = reader?;
    Some(tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut chunk = [0u8; 4096];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => buf.lock().await.extend_from_slice(&chunk[..n]),
            }
        }
    }))
}

#[cfg(unix)]
async fn terminate_then_kill(child: &mut Child) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    if let Some(pid) = child.id() {
        let pid = Pid::from_raw(pid as i32);
        let _ = kill(pid, Signal::SIGTERM);
    }

    let graceful = tokio::time::timeout(TERMINATE_GRACE_PERIOD, child.wait()).await;
    if graceful.is_err() {
        let _ = child.start_kill();
        let _ = child.wait().await;
    }
}

#[cfg(windows)]
async fn terminate_then_kill(child: &mut Child) {
    // tokio's `Child::start_kill` maps to TerminateProcess on Windows; there
    // is no portable "gentle" signal, so the grace period only bounds how
    // long we wait for the OS to report exit before giving up.
    let _ = child.start_kill();
    let _ = tokio::time::timeout(TERMINATE_GRACE_PERIOD, child.wait()).await;
}

#[cfg(not(any(unix, windows)))]
async fn terminate_then_kill(child: &mut Child) {
    let _ = child.start_kill();
    let _ = child.wait().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn successful_short_command_completes_without_timeout() {
        let cmd = CommandSpec::new("echo").arg("hello");
        let runner = TokioProcessRunner;
        let cancellation = CancellationToken::new();
        let output = runner
            .run(&cmd, Duration::from_secs(5), &cancellation)
            .await
            .unwrap();
        assert!(!output.timed_out);
        assert!(output.success());
        assert_eq!(output.stdout_string().trim(), "hello");
    }

    #[tokio::test]
    async fn deadline_breach_marks_timed_out() {
        let cmd = CommandSpec::new("sleep").arg("30");
        let runner = TokioProcessRunner;
        let cancellation = CancellationToken::new();
        let output = runner
            .run(&cmd, Duration::from_millis(50), &cancellation)
            .await
            .unwrap();
        assert!(output.timed_out);
        assert_eq!(output.exit_code, None);
    }

    #[tokio::test]
    async fn external_cancellation_marks_timed_out() {
        let cmd = CommandSpec::new("sleep").arg("30");
        let runner = TokioProcessRunner;
        let cancellation = CancellationToken::new();
        let cancel_clone = cancellation.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel_clone.cancel();
        });
        let output = runner
            .run(&cmd, Duration::from_secs(30), &cancellation)
            .await
            .unwrap();
        assert!(output.timed_out);
    }
}
