#![cfg(unix)]

use botwarden::config::{ChildSpec, SupervisorConfig, PORT_ENV};
use botwarden::error::ErrorCategory;
use botwarden::platform;
use botwarden::supervisor::{supervise, Supervisor, SupervisorState, SUPERVISOR_EXIT_CODE};
use serial_test::serial;
use std::env;
use std::time::{Duration, Instant};
use tempfile::TempDir;

struct EnvGuard {
    key: String,
    original: Option<String>,
}

impl EnvGuard {
    fn set(key: &str, value: &str) -> Self {
        let original = env::var(key).ok();
        env::set_var(key, value);
        Self {
            key: key.to_string(),
            original,
        }
    }

    fn unset(key: &str) -> Self {
        let original = env::var(key).ok();
        env::remove_var(key);
        Self {
            key: key.to_string(),
            original,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match &self.original {
            Some(val) => env::set_var(&self.key, val),
            None => env::remove_var(&self.key),
        }
    }
}

fn sleep_spec(name: &str, duration: &str) -> ChildSpec {
    ChildSpec::new(name, "sleep", vec![duration.to_string()])
}

#[cfg(target_os = "linux")]
fn cmdline_running(needle: &str) -> bool {
    let my_pid = std::process::id().to_string();
    let entries = match std::fs::read_dir("/proc") {
        Ok(entries) => entries,
        Err(_) => return false,
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let pid = name.to_string_lossy().to_string();
        if !pid.chars().all(|c| c.is_ascii_digit()) || pid == my_pid {
            continue;
        }
        if let Ok(raw) = std::fs::read(format!("/proc/{}/cmdline", pid)) {
            let cmdline = raw
                .split(|b| *b == 0)
                .map(String::from_utf8_lossy)
                .collect::<Vec<_>>()
                .join(" ");
            if cmdline.contains(needle) {
                return true;
            }
        }
    }
    false
}

#[tokio::test]
async fn wait_any_reports_exactly_one_exit() {
    let specs = vec![sleep_spec("short", "0.2"), sleep_spec("long", "30")];
    let mut supervisor = Supervisor::start(specs).await.expect("both should launch");
    assert_eq!(supervisor.state(), SupervisorState::Running);

    let exit = supervisor.wait_any().await.expect("one exit expected");
    assert_eq!(exit.name, "short");
    assert_eq!(supervisor.state(), SupervisorState::Draining);

    let survivor_pid = supervisor.pids()[1];
    supervisor.shutdown().await;
    assert_eq!(supervisor.state(), SupervisorState::Stopped);
    assert!(!platform::process_alive(survivor_pid));
}

#[tokio::test]
async fn child_env_entries_are_applied() {
    let coded = ChildSpec::new(
        "coded",
        "sh",
        vec!["-c".to_string(), "exit \"$WARDEN_TEST_CODE\"".to_string()],
    )
    .with_env("WARDEN_TEST_CODE", "7");
    let specs = vec![coded, sleep_spec("bystander", "30")];

    let mut supervisor = Supervisor::start(specs).await.expect("start");
    let exit = supervisor.wait_any().await.expect("coded exits first");
    assert_eq!(exit.name, "coded");
    assert_eq!(exit.status.and_then(|status| status.code()), Some(7));
    supervisor.shutdown().await;
}

#[tokio::test]
async fn terminate_on_exited_child_is_idempotent() {
    let specs = vec![sleep_spec("quick", "0.1"), sleep_spec("slow", "30")];
    let mut supervisor = Supervisor::start(specs).await.expect("start");

    let exit = supervisor.wait_any().await.expect("quick exits first");
    // Twice on the same dead handle: no error, no hang.
    supervisor.terminate(exit.index);
    supervisor.terminate(exit.index);

    supervisor.shutdown().await;
}

#[test]
#[serial]
fn missing_port_fails_before_any_launch() {
    let _guard = EnvGuard::unset(PORT_ENV);
    let err = SupervisorConfig::from_env().expect_err("PORT is required");
    assert_eq!(err.category(), ErrorCategory::Config);
}

#[test]
#[serial]
fn unparsable_port_is_a_config_error() {
    let _guard = EnvGuard::set(PORT_ENV, "not-a-port");
    let err = SupervisorConfig::from_env().expect_err("garbage port must be rejected");
    assert_eq!(err.category(), ErrorCategory::Config);
    assert!(err.user_message().contains(PORT_ENV));
}

#[test]
#[serial]
fn from_env_reads_port_and_defaults() {
    let _port = EnvGuard::set(PORT_ENV, "8123");
    let _workers = EnvGuard::unset("RENDER_WORKERS");
    let _timeout = EnvGuard::unset("RENDER_TIMEOUT_SEC");

    let config = SupervisorConfig::from_env().expect("valid environment");
    assert_eq!(config.port, 8123);
    assert_eq!(config.render_workers, 1);
    assert_eq!(config.render_timeout, Duration::from_secs(60));
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn launch_failure_leaves_no_orphan_sibling() {
    // Distinctive argument so the /proc scan cannot match anything else.
    let marker = "sleep 43612";
    let scratch = TempDir::new().expect("temp dir");
    let missing = scratch.path().join("definitely-not-a-binary");

    let specs = vec![
        ChildSpec::new("sleeper", "sleep", vec!["43612".to_string()]),
        ChildSpec::new("broken", missing.to_string_lossy().to_string(), Vec::new()),
    ];

    let err = match Supervisor::start(specs).await {
        Ok(_) => panic!("second child must fail to launch"),
        Err(err) => err,
    };
    assert_eq!(err.category(), ErrorCategory::Launch);
    assert!(
        !cmdline_running(marker),
        "sibling started before the failure must be cleaned up"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn end_to_end_drain_finishes_under_the_grace_budget() {
    let specs = vec![sleep_spec("first", "100"), sleep_spec("second", "200")];
    let started_at = Instant::now();

    let mut supervisor = Supervisor::start(specs).await.expect("start");
    let pids = supervisor.pids();

    // Simulate the first child dying on its own after roughly a second.
    let victim = pids[0];
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        unsafe {
            libc::kill(victim as libc::pid_t, libc::SIGTERM);
        }
    });

    let exit = supervisor.wait_any().await.expect("first child exit");
    assert_eq!(exit.name, "first");

    supervisor.shutdown().await;
    assert!(
        started_at.elapsed() < Duration::from_secs(5),
        "detect + drain must stay within the grace budget"
    );
    assert!(!platform::process_alive(pids[1]));
}

#[tokio::test]
async fn supervise_returns_the_restart_exit_code() {
    let specs = vec![sleep_spec("blink", "0.1"), sleep_spec("lingering", "30")];
    let code = supervise(specs).await.expect("clean drain");
    assert_eq!(code, SUPERVISOR_EXIT_CODE);
}
