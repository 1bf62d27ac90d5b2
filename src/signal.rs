use crate::platform;
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};

/// The warden supervises exactly two children today; the pid parking slots
/// are sized for that.
const MAX_SUPERVISED: usize = 2;

static CHILD_PIDS: [AtomicU32; MAX_SUPERVISED] = [AtomicU32::new(0), AtomicU32::new(0)];

/// Disarms signal forwarding on drop.
pub struct SignalGuard;

impl Drop for SignalGuard {
    fn drop(&mut self) {
        for slot in &CHILD_PIDS {
            slot.store(0, Ordering::SeqCst);
        }
    }
}

/// Install SIGINT/SIGTERM forwarding: a signal delivered to the warden is
/// turned into termination requests for every parked child pid, so the pair
/// goes down together when the outer orchestrator asks us to stop.
pub fn install(pids: &[u32]) -> io::Result<SignalGuard> {
    for (slot, pid) in CHILD_PIDS.iter().zip(pids) {
        slot.store(*pid, Ordering::SeqCst);
    }

    #[cfg(unix)]
    {
        setup_unix_signal_handlers()?;
    }

    Ok(SignalGuard)
}

#[cfg(unix)]
fn setup_unix_signal_handlers() -> io::Result<()> {
    use std::sync::Once;

    static INIT: Once = Once::new();

    INIT.call_once(|| {
        unsafe {
            setup_signal_handlers_safe();
        }
    });

    Ok(())
}

#[cfg(unix)]
/// Signal handling setup; all the unsafe sigaction plumbing lives here.
unsafe fn setup_signal_handlers_safe() {
    extern "C" fn handler(signum: libc::c_int) {
        handle_unix_signal(signum);
    }

    // sigaction rather than signal(), with SA_RESTART so the supervisor's
    // blocking wait is not torn by the interrupt.
    unsafe {
        let mut sigint_action: libc::sigaction = std::mem::zeroed();
        let mut sigterm_action: libc::sigaction = std::mem::zeroed();

        sigint_action.sa_flags = libc::SA_RESTART;
        sigterm_action.sa_flags = libc::SA_RESTART;

        sigint_action.sa_sigaction = handler as usize;
        sigterm_action.sa_sigaction = handler as usize;

        let mut empty_set: libc::sigset_t = std::mem::zeroed();
        libc::sigemptyset(&mut empty_set as *mut libc::sigset_t);
        sigint_action.sa_mask = empty_set;
        sigterm_action.sa_mask = empty_set;

        libc::sigaction(libc::SIGINT, &sigint_action, std::ptr::null_mut());
        libc::sigaction(libc::SIGTERM, &sigterm_action, std::ptr::null_mut());
    }
}

#[cfg(unix)]
fn handle_unix_signal(signum: libc::c_int) {
    match signum {
        libc::SIGINT | libc::SIGTERM => {
            for slot in &CHILD_PIDS {
                let pid = slot.load(Ordering::SeqCst);
                if pid != 0 {
                    platform::terminate_process(pid);
                }
            }
        }
        _ => {}
    }
}
