//! The wait/reap event loop run by every lineage's worker.
//!
//! Each pass issues a targeted `waitpid` on the runner with stop/continue
//! notification, then an untargeted `wait` that only reports exits. The
//! targeted call surfaces the transitions the killer generates; the
//! untargeted one collects any child that does exit so nothing lingers as a
//! zombie. Transition flags do not mix with waiting on arbitrary children,
//! hence two calls instead of one.
//!
//! While runner and killer are alive the loop has no exit. It ends when both
//! calls of the same pass report that no children remain, or when either
//! reports an error other than `EINTR`/`ECHILD`.

use nix::sys::signal::Signal;
use nix::sys::wait::WaitPidFlag;
use nix::unistd::Pid;
use tracing::{debug, info, trace, warn};

use crate::error::{HarnessError, HarnessResult};
use crate::process::{ProcessControl, WaitOutcome};

/// Tally of what the loop observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapStats {
    pub passes: u64,
    pub stops: u64,
    pub continues: u64,
    pub exits: u64,
    pub signaled: u64,
    pub interruptions: u64,
}

impl ReapStats {
    fn record(&mut self, outcome: &WaitOutcome) {
        match outcome {
            WaitOutcome::Stopped { pid, signal } => {
                trace!(pid = %pid, "stopped by {signal}");
                self.stops += 1;
            }
            WaitOutcome::Continued { pid } => {
                trace!(pid = %pid, "continued");
                self.continues += 1;
            }
            WaitOutcome::Exited { pid, code } => {
                debug!(pid = %pid, code, "child exited");
                self.exits += 1;
            }
            WaitOutcome::Signaled { pid, signal } => {
                debug!(pid = %pid, "child killed by {signal}");
                self.signaled += 1;
            }
            WaitOutcome::Interrupted => self.interruptions += 1,
            WaitOutcome::NoChildren | WaitOutcome::OtherError(_) => {}
        }
    }
}

pub struct WaitReaper {
    target: Pid,
    flags: WaitPidFlag,
}

impl WaitReaper {
    /// Watches `target` for stops and continues on top of exits.
    pub fn new(target: Pid) -> Self {
        Self {
            target,
            flags: WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED,
        }
    }

    /// Runs the loop until no children remain or a wait fails.
    ///
    /// Once shutdown is requested the loop tears the lineage down a single
    /// time, then keeps reaping until the children are gone. A stop reported
    /// for the target after teardown is answered with `SIGCONT`; a STOP that
    /// lands after the teardown `SIGCONT` would otherwise park the runner with
    /// its `SIGTERM` pending.
    pub fn run<P: ProcessControl>(&self, processes: &mut P) -> HarnessResult<ReapStats> {
        let mut stats = ReapStats::default();
        let mut torn_down = false;

        loop {
            if !torn_down && processes.shutdown_requested() {
                info!(runner = %self.target, "Shutdown requested, tearing down lineage");
                if let Err(err) = processes.terminate_children() {
                    warn!(runner = %self.target, "teardown incomplete: {err}");
                }
                torn_down = true;
            }
            stats.passes += 1;

            let targeted = processes.wait_for(self.target, self.flags);
            stats.record(&targeted);
            if let WaitOutcome::OtherError(source) = targeted {
                return Err(HarnessError::Wait {
                    pid: Some(self.target),
                    source,
                });
            }
            if torn_down {
                if let WaitOutcome::Stopped { pid, .. } = targeted {
                    let _ = processes.signal(pid, Some(Signal::SIGCONT));
                }
            }

            let untargeted = processes.wait_any();
            stats.record(&untargeted);
            if let WaitOutcome::OtherError(source) = untargeted {
                return Err(HarnessError::Wait { pid: None, source });
            }

            if targeted.is_no_children() && untargeted.is_no_children() {
                debug!(runner = %self.target, ?stats, "No children remain");
                return Ok(stats);
            }
        }
    }
}
