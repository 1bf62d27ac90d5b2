use crate::logging::debug;
use std::io;
use std::thread;
use std::time::Duration;
use tokio::process::Command;

/// Grace between the cooperative SIGTERM and the SIGKILL escalation.
const TERM_GRACE: Duration = Duration::from_millis(500);

/// Prepare the execution environment for a supervised child.
///
/// Each child gets its own process group so termination reaches helper
/// processes it forks (gunicorn workers), and on Linux a parent-death signal
/// so children cannot outlive a crashed supervisor.
pub fn prepare_command(cmd: &mut Command) -> io::Result<()> {
    #[cfg(unix)]
    {
        unsafe {
            cmd.pre_exec(|| {
                if set_process_group() != 0 {
                    return Err(io::Error::last_os_error());
                }

                #[cfg(target_os = "linux")]
                {
                    if set_parent_death_signal() != 0 {
                        return Err(io::Error::last_os_error());
                    }
                }

                Ok(())
            });
        }
    }

    Ok(())
}

/// Check if process is alive
pub fn process_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        let c_pid = pid as libc::pid_t;
        match send_signal(c_pid, 0) {
            Ok(_) => true,                      // Signal sent successfully, process exists
            Err(errno) => errno == libc::EPERM, // EPERM means process exists but no permission
        }
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        false // Fallback implementation for non-Unix systems
    }
}

/// Terminate a child process and everything it forked.
///
/// First try graceful termination (SIGTERM), force termination (SIGKILL) if
/// it does not exit within the grace interval. Signals target the child's
/// process group, falling back to the leader pid when the group is already
/// gone. Already-dead processes are a silent no-op.
pub fn terminate_process(pid: u32) {
    #[cfg(unix)]
    {
        let c_pid = pid as libc::pid_t;

        if !process_alive(pid) {
            return;
        }

        // Graceful termination
        if signal_group(c_pid, libc::SIGTERM).is_ok() {
            thread::sleep(TERM_GRACE);

            if !process_alive(pid) {
                return;
            }
        }

        // Force termination
        if signal_group(c_pid, libc::SIGKILL).is_ok() {
            debug(format!("pid={} sent SIGKILL", pid));
        }
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
    }
}

/// Signal the child's process group, or just the leader if the group id is
/// no longer valid.
#[cfg(unix)]
fn signal_group(pid: libc::pid_t, signal: libc::c_int) -> Result<(), libc::c_int> {
    match send_signal(-pid, signal) {
        Ok(()) => Ok(()),
        Err(_) => send_signal(pid, signal),
    }
}

/// Safely set process group ID
#[cfg(unix)]
unsafe fn set_process_group() -> libc::c_int {
    unsafe { libc::setpgid(0, 0) }
}

/// Safely set parent death signal
#[cfg(target_os = "linux")]
unsafe fn set_parent_death_signal() -> libc::c_int {
    unsafe { libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM) }
}

/// Safely send signal
///
/// Encapsulates the unsafe kill call and returns Result instead of a raw
/// error code.
#[cfg(unix)]
fn send_signal(pid: libc::pid_t, signal: libc::c_int) -> Result<(), libc::c_int> {
    let result = unsafe { libc::kill(pid, signal) };
    if result == 0 {
        Ok(())
    } else {
        Err(get_last_errno())
    }
}

/// Get last error code
#[cfg(unix)]
fn get_last_errno() -> libc::c_int {
    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        unsafe { *libc::__errno_location() }
    }

    #[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
    {
        unsafe { *libc::__error() }
    }

    #[cfg(not(any(
        target_os = "linux",
        target_os = "android",
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd"
    )))]
    {
        0
    }
}
