//! Server process supervision.
//!
//! [`ProcessSupervisor::launch`] spawns the server and returns immediately.
//! A dedicated task then owns the child: it forwards console output to the
//! log, publishes [`ProcessState`] changes, applies the [`RestartPolicy`] and
//! performs the graceful stop when shutdown is requested.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::{RestartPolicy, ServerConfig};
use crate::error::{QuickError, Result};
use crate::health::ServiceMetrics;
use crate::utils::shutdown;

/// Log target for forwarded server console output.
pub const CONSOLE_TARGET: &str = "minecraft";

/// Console command that makes the server save and exit.
const STOP_COMMAND: &[u8] = b"stop\n";

/// Double `current_ms`, capped at `max_ms`.
pub fn compute_backoff(current_ms: u64, max_ms: u64) -> u64 {
    current_ms.saturating_mul(2).min(max_ms)
}

// ============================================================================
// ProcessState
// ============================================================================

/// Observable state of the supervised server process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessState {
    NotStarted,
    Running { pid: Option<u32> },
    /// Exited on its own; `None` when terminated by a signal
    Exited { code: Option<i32> },
    /// Stopped because shutdown was requested
    Stopped,
    Failed { reason: String },
}

impl ProcessState {
    pub fn is_running(&self) -> bool {
        matches!(self, ProcessState::Running { .. })
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProcessState::NotStarted | ProcessState::Running { .. })
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessState::NotStarted => write!(f, "not started"),
            ProcessState::Running { pid: Some(pid) } => write!(f, "running (pid {})", pid),
            ProcessState::Running { pid: None } => write!(f, "running"),
            ProcessState::Exited { code: Some(code) } => write!(f, "exited with code {}", code),
            ProcessState::Exited { code: None } => write!(f, "terminated by signal"),
            ProcessState::Stopped => write!(f, "stopped"),
            ProcessState::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}

// ============================================================================
// LaunchSpec
// ============================================================================

/// Program, arguments and working directory of the server process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,
    pub dir: PathBuf,
}

impl LaunchSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args,
            dir: dir.into(),
        }
    }

    /// `{java} -Xms{heap} -Xmx{heap} [jvm_args..] -jar {jar} --nogui`, run in `server.dir`.
    ///
    /// The jar is passed relative to the working directory when it lives there.
    pub fn java(server: &ServerConfig, jar: &Path) -> Self {
        let jar_arg = jar
            .strip_prefix(&server.dir)
            .unwrap_or(jar)
            .display()
            .to_string();
        let mut args = vec![
            format!("-Xms{}", server.heap),
            format!("-Xmx{}", server.heap),
        ];
        args.extend(server.jvm_args.iter().cloned());
        args.extend(["-jar".to_string(), jar_arg, "--nogui".to_string()]);
        Self::new(server.java.clone(), args, server.dir.clone())
    }

    /// Human-readable command line for logs and errors.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn spawn(&self) -> Result<Child> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| QuickError::Launch {
                command: self.command_line(),
                source,
            })?;

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, false));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, true));
        }
        Ok(child)
    }
}

async fn forward_lines<R: AsyncRead + Unpin>(reader: R, is_stderr: bool) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if is_stderr => warn!(target: CONSOLE_TARGET, "{}", line),
            Ok(Some(line)) => info!(target: CONSOLE_TARGET, "{}", line),
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Server console stream closed");
                break;
            }
        }
    }
}

// ============================================================================
// ProcessSupervisor
// ============================================================================

/// Handle to a launched, supervised server process.
pub struct ProcessSupervisor {
    state: watch::Receiver<ProcessState>,
    task: tokio::task::JoinHandle<ProcessState>,
}

impl ProcessSupervisor {
    /// Spawn the server and hand it to a supervisor task.
    ///
    /// Returns once the first process is spawned.
    ///
    /// # Errors
    ///
    /// [`QuickError::Cancelled`] without spawning anything if shutdown was
    /// already requested. [`QuickError::Launch`] if the first spawn fails.
    /// Spawn failures on restart are reported as [`ProcessState::Failed`] instead.
    pub fn launch(
        spec: LaunchSpec,
        policy: RestartPolicy,
        stop_timeout: Duration,
        metrics: Arc<ServiceMetrics>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self> {
        if *shutdown.borrow() {
            return Err(QuickError::Cancelled(format!(
                "shutdown requested before launching {}",
                spec.program
            )));
        }
        let child = spec.spawn()?;
        let pid = child.id();
        info!(command = %spec.command_line(), dir = %spec.dir.display(), pid, "Server process started");
        metrics.set_running(true);

        let (state_tx, state_rx) = watch::channel(ProcessState::Running { pid });
        let task = tokio::spawn(
            Supervision {
                spec,
                policy,
                stop_timeout,
                metrics,
                state: state_tx,
                shutdown,
            }
            .run(child),
        );

        Ok(Self {
            state: state_rx,
            task,
        })
    }

    pub fn state(&self) -> ProcessState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProcessState> {
        self.state.clone()
    }

    /// Wait for the supervisor task to finish and return the terminal state.
    pub async fn wait(self) -> ProcessState {
        match self.task.await {
            Ok(state) => state,
            Err(e) => ProcessState::Failed {
                reason: format!("supervisor task ended abnormally: {}", e),
            },
        }
    }
}

struct Supervision {
    spec: LaunchSpec,
    policy: RestartPolicy,
    stop_timeout: Duration,
    metrics: Arc<ServiceMetrics>,
    state: watch::Sender<ProcessState>,
    shutdown: watch::Receiver<bool>,
}

impl Supervision {
    fn publish(&self, state: ProcessState) -> ProcessState {
        self.state.send_replace(state.clone());
        state
    }

    async fn run(mut self, mut child: Child) -> ProcessState {
        let mut restarts = 0u32;
        let mut backoff_ms = self.policy.initial_backoff_ms;

        loop {
            let exited = tokio::select! {
                status = child.wait() => Some(status),
                _ = shutdown::requested(&mut self.shutdown) => None,
            };

            let last = match exited {
                None => {
                    self.stop(&mut child).await;
                    return self.publish(ProcessState::Stopped);
                }
                Some(Ok(status)) => {
                    let code = status.code();
                    self.metrics.record_exit(code);
                    info!(code, "Server process exited");
                    self.publish(ProcessState::Exited { code })
                }
                Some(Err(e)) => {
                    self.metrics.record_exit(None);
                    error!(error = %e, "Lost track of server process");
                    return self.publish(ProcessState::Failed {
                        reason: e.to_string(),
                    });
                }
            };

            if restarts >= self.policy.max_restarts {
                return last;
            }
            restarts += 1;
            warn!(
                "Restarting server in {}ms (attempt {}/{})",
                backoff_ms, restarts, self.policy.max_restarts
            );

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(backoff_ms)) => {}
                _ = shutdown::requested(&mut self.shutdown) => return last,
            }
            backoff_ms = compute_backoff(backoff_ms, self.policy.max_backoff_ms);

            child = match self.spec.spawn() {
                Ok(child) => child,
                Err(e) => {
                    error!(error = %e, "Server restart failed");
                    return self.publish(ProcessState::Failed {
                        reason: e.to_string(),
                    });
                }
            };
            self.metrics.record_restart();
            self.metrics.set_running(true);
            let pid = child.id();
            info!(pid, attempt = restarts, "Server process restarted");
            self.publish(ProcessState::Running { pid });
        }
    }

    /// Send the console stop command, then kill after the grace period.
    async fn stop(&self, child: &mut Child) {
        let sent = match child.stdin.take() {
            Some(mut stdin) => {
                let written = stdin.write_all(STOP_COMMAND).await.and(stdin.flush().await);
                if let Err(e) = &written {
                    warn!(error = %e, "Could not send stop command");
                }
                written.is_ok()
            }
            None => false,
        };

        if sent {
            info!(timeout_secs = self.stop_timeout.as_secs(), "Stop command sent, waiting for server");
            match tokio::time::timeout(self.stop_timeout, child.wait()).await {
                Ok(Ok(status)) => {
                    self.metrics.record_exit(status.code());
                    info!(code = status.code(), "Server stopped");
                    return;
                }
                Ok(Err(e)) => warn!(error = %e, "Error waiting for server"),
                Err(_) => warn!("Server did not stop in time, killing"),
            }
        }

        if let Err(e) = child.kill().await {
            warn!(error = %e, "Failed to kill server process");
        }
        self.metrics.record_exit(None);
    }
}
