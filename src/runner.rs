use tracing::debug;

use crate::process::ProcessControl;

/// Idles until shutdown is requested, waking only when a signal is handled.
///
/// STOP and CONTINUE do not wake it; the kernel suspends and resumes it
/// around the `pause`. Returns the number of handled-signal wakeups.
pub fn run<P: ProcessControl>(processes: &mut P) -> u64 {
    debug!("Runner waiting for signals");
    let mut wakeups = 0;
    while !processes.shutdown_requested() {
        processes.suspend();
        wakeups += 1;
    }
    debug!(wakeups, "Runner exiting");
    wakeups
}
