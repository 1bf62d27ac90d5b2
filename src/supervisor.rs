//! Shared-fate supervision of the child pair.
//!
//! Lifecycle: `Idle → Running → Draining → Stopped`, one-directional. Both
//! children are spawned up front; one monitor task per child owns the
//! `tokio::process::Child`, awaits it, and reports into a single mpsc fan-in.
//! The supervising task blocks on the first notification, then drains the
//! survivor. Restart policy belongs to whatever launched the warden, which is
//! why supervision always ends with a non-zero exit code.

use crate::config::{ChildSpec, SHUTDOWN_GRACE};
use crate::error::WardenError;
use crate::logging::{debug, info, warn};
use crate::platform;
use crate::signal;
use std::io;
use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};

/// Exit code handed to the outer orchestrator after every drain, signalling
/// "abnormal termination, consider restart".
pub const SUPERVISOR_EXIT_CODE: i32 = 1;

/// Lifecycle phases; transitions are one-directional and irreversible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Running,
    Draining,
    Stopped,
}

/// Notification from a monitor task: one child is gone.
#[derive(Debug)]
pub struct ChildExit {
    pub index: usize,
    pub name: String,
    /// `None` when the underlying wait itself failed.
    pub status: Option<ExitStatus>,
}

struct ChildMonitor {
    name: String,
    pid: u32,
    reaped: bool,
    monitor: JoinHandle<()>,
}

pub struct Supervisor {
    state: SupervisorState,
    children: Vec<ChildMonitor>,
    exits: mpsc::Receiver<ChildExit>,
    _signal_guard: signal::SignalGuard,
}

impl Supervisor {
    /// Launch every child concurrently (spawn is non-blocking).
    ///
    /// On any lookup or spawn failure the already-started siblings are
    /// terminated and reaped before the error surfaces, so a partial launch
    /// never leaves an orphan behind.
    pub async fn start(specs: Vec<ChildSpec>) -> Result<Self, WardenError> {
        let mut started: Vec<(String, u32, Child)> = Vec::with_capacity(specs.len());

        for spec in &specs {
            let mut child = match spawn_child(spec) {
                Ok(child) => child,
                Err(err) => {
                    warn(format!("launch phase failed: {}; cleaning up siblings", err));
                    teardown(started).await;
                    return Err(err);
                }
            };

            let pid = match child.id() {
                Some(pid) => pid,
                None => {
                    let _ = child.wait().await;
                    teardown(started).await;
                    return Err(WardenError::Io(io::Error::other(format!(
                        "{}: pid unavailable right after spawn",
                        spec.name
                    ))));
                }
            };

            info(format!(
                "started {} (pid={}): {}",
                spec.name,
                pid,
                spec.command_line()
            ));
            started.push((spec.name.clone(), pid, child));
        }

        let pids: Vec<u32> = started.iter().map(|(_, pid, _)| *pid).collect();
        let signal_guard = match signal::install(&pids) {
            Ok(guard) => guard,
            Err(err) => {
                teardown(started).await;
                return Err(err.into());
            }
        };

        let (tx, exits) = mpsc::channel(started.len().max(1));
        let mut children = Vec::with_capacity(started.len());
        for (index, (name, pid, mut child)) in started.into_iter().enumerate() {
            let tx = tx.clone();
            let task_name = name.clone();
            let monitor = tokio::spawn(async move {
                let status = match child.wait().await {
                    Ok(status) => Some(status),
                    Err(err) => {
                        warn(format!("wait for {} failed: {}", task_name, err));
                        None
                    }
                };
                let _ = tx.send(ChildExit {
                    index,
                    name: task_name,
                    status,
                })
                .await;
            });
            children.push(ChildMonitor {
                name,
                pid,
                reaped: false,
                monitor,
            });
        }
        drop(tx);

        info("supervisor running; blocking until first child exit");
        Ok(Self {
            state: SupervisorState::Running,
            children,
            exits,
            _signal_guard: signal_guard,
        })
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn pids(&self) -> Vec<u32> {
        self.children.iter().map(|child| child.pid).collect()
    }

    /// Block until the first child terminates, by any cause.
    ///
    /// Exactly one exit is reported; simultaneous exits report whichever
    /// notification lands first and leave the other queued for the drain.
    /// Returns `None` once every child has already been reaped.
    pub async fn wait_any(&mut self) -> Option<ChildExit> {
        let exit = self.exits.recv().await?;
        if let Some(child) = self.children.get_mut(exit.index) {
            child.reaped = true;
        }
        self.state = SupervisorState::Draining;
        info(format!(
            "{} exited ({}); entering drain",
            exit.name,
            describe_exit(exit.status)
        ));
        Some(exit)
    }

    /// Best-effort termination request for one child. Already-exited
    /// children are a silent no-op; failures never surface.
    pub fn terminate(&self, index: usize) {
        if let Some(child) = self.children.get(index) {
            if child.reaped {
                return;
            }
            debug(format!(
                "termination requested for {} (pid={})",
                child.name, child.pid
            ));
            platform::terminate_process(child.pid);
        }
    }

    /// Terminate every still-alive child, then wait until all monitors have
    /// confirmed the reap or the drain grace elapses.
    pub async fn shutdown(&mut self) {
        if self.state == SupervisorState::Stopped {
            return;
        }
        self.state = SupervisorState::Draining;
        info("shutdown initiated; terminating remaining children");

        let pending: Vec<usize> = self
            .children
            .iter()
            .enumerate()
            .filter(|(_, child)| !child.reaped)
            .map(|(index, _)| index)
            .collect();
        for index in pending {
            self.terminate(index);
        }

        let deadline = Instant::now() + SHUTDOWN_GRACE;
        while self.children.iter().any(|child| !child.reaped) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn("drain grace elapsed with children still unreaped");
                break;
            }
            match timeout(remaining, self.exits.recv()).await {
                Ok(Some(exit)) => {
                    if let Some(child) = self.children.get_mut(exit.index) {
                        child.reaped = true;
                    }
                    debug(format!(
                        "{} reaped during drain ({})",
                        exit.name,
                        describe_exit(exit.status)
                    ));
                }
                // Channel closed: every monitor has already reported.
                Ok(None) => break,
                Err(_) => {
                    warn("drain grace elapsed while waiting for reap confirmation");
                    break;
                }
            }
        }

        for child in &self.children {
            if !child.reaped {
                child.monitor.abort();
            }
        }

        self.state = SupervisorState::Stopped;
        info("supervisor stopped");
    }
}

/// The full lifecycle: start, wait for the first exit, drain the survivor.
/// Always yields the non-zero supervisor exit code once the drain is done.
pub async fn supervise(specs: Vec<ChildSpec>) -> Result<i32, WardenError> {
    let mut supervisor = Supervisor::start(specs).await?;
    if supervisor.wait_any().await.is_none() {
        warn("no children left to wait for");
    }
    supervisor.shutdown().await;
    Ok(SUPERVISOR_EXIT_CODE)
}

fn spawn_child(spec: &ChildSpec) -> Result<Child, WardenError> {
    let program = which::which(&spec.program).map_err(|_| {
        WardenError::launch(
            &spec.name,
            format!("'{}' not found in PATH", spec.program),
            None,
        )
    })?;

    let mut command = Command::new(program);
    command.args(&spec.args);
    for (key, value) in &spec.env {
        command.env(key, value);
    }
    command.stdin(Stdio::null());
    // The children talk to the outside world on their own; their output goes
    // straight to the warden's stdio.
    command.stdout(Stdio::inherit());
    command.stderr(Stdio::inherit());

    platform::prepare_command(&mut command)?;

    command.spawn().map_err(|err| {
        let message = format!("spawn failed: {}", err);
        WardenError::launch(&spec.name, message, Some(err))
    })
}

/// Kill and reap children that were started before a launch failure.
async fn teardown(children: Vec<(String, u32, Child)>) {
    for (name, pid, mut child) in children {
        debug(format!(
            "cleaning up partially started {} (pid={})",
            name, pid
        ));
        platform::terminate_process(pid);
        let _ = child.wait().await;
    }
}

fn describe_exit(status: Option<ExitStatus>) -> String {
    match status {
        Some(status) => {
            if let Some(code) = status.code() {
                return format!("exit code {}", code);
            }
            #[cfg(unix)]
            {
                use std::os::unix::process::ExitStatusExt;
                if let Some(signal) = status.signal() {
                    return format!("signal {}", signal);
                }
            }
            status.to_string()
        }
        None => "status unavailable".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn describe_exit_reports_codes_and_signals() {
        use std::os::unix::process::ExitStatusExt;

        assert_eq!(
            describe_exit(Some(ExitStatus::from_raw(0))),
            "exit code 0"
        );
        // Raw wait status 15 is "killed by SIGTERM".
        assert_eq!(
            describe_exit(Some(ExitStatus::from_raw(15))),
            "signal 15"
        );
        assert_eq!(describe_exit(None), "status unavailable");
    }
}
