//! Cooperative shutdown for the process tree.
//!
//! Every process in the tree shares the same handler: `SIGTERM`, `SIGINT` and
//! `SIGALRM` raise a process-wide flag. The handler is installed without
//! `SA_RESTART`, so a blocked `waitpid`/`wait`/`pause` returns `EINTR` and the
//! surrounding loop gets a chance to look at the flag.
//!
//! A signal can land between a loop checking the flag and the loop entering
//! its next blocking call. To cover that window the handler re-arms a one
//! second alarm, so a process stuck in a blocking call keeps being interrupted
//! until it notices the request.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::unistd::alarm;

use crate::error::{HarnessError, HarnessResult};

static REQUESTED: AtomicBool = AtomicBool::new(false);

const NUDGE_SECS: libc::c_uint = 1;

extern "C" fn on_shutdown_signal(_: libc::c_int) {
    REQUESTED.store(true, Ordering::SeqCst);
    // alarm(2) is async-signal-safe
    unsafe {
        libc::alarm(NUDGE_SECS);
    }
}

/// Installs the shutdown handler for this process. Children created by fork
/// inherit the disposition, but roles call this again on entry so a process
/// never depends on how its parent was set up.
pub fn install() -> HarnessResult<()> {
    let action = SigAction::new(
        SigHandler::Handler(on_shutdown_signal),
        SaFlags::empty(),
        SigSet::empty(),
    );
    for signal in [Signal::SIGTERM, Signal::SIGINT, Signal::SIGALRM] {
        unsafe { sigaction(signal, &action) }.map_err(|errno| {
            HarnessError::setup(format!("installing {signal} handler: {errno}"))
        })?;
    }
    Ok(())
}

/// Whether shutdown has been requested for this process.
pub fn requested() -> bool {
    REQUESTED.load(Ordering::SeqCst)
}

/// Arms a run window. When it elapses `SIGALRM` requests shutdown.
/// A zero duration means run until signalled.
pub fn schedule(window: Duration) {
    if window.is_zero() {
        return;
    }
    let secs = window.as_secs().clamp(1, u64::from(libc::c_uint::MAX)) as libc::c_uint;
    alarm::set(secs);
}
