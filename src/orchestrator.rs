//! Top of the stress tree: fans out the lineages and reaps them.

use tracing::{debug, error, info, warn};

use crate::error::{HarnessError, HarnessResult};
use crate::process::{ProcessControl, Role, WaitOutcome};

/// Result of a complete run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub spawned: usize,
    pub reaped: usize,
    /// Lineages whose worker exited non-zero or was killed.
    pub failed_lineages: usize,
    /// Zombie children still in the process table after reaping.
    pub zombies: usize,
}

pub struct Orchestrator<P> {
    processes: P,
    workers: usize,
}

impl<P: ProcessControl> Orchestrator<P> {
    pub fn new(processes: P, workers: usize) -> Self {
        Self { processes, workers }
    }

    pub fn processes(&self) -> &P {
        &self.processes
    }

    /// Spawns every lineage, then blocks until each has been reaped.
    ///
    /// Partial fan-out is not supported: a failed spawn tears down the
    /// lineages already started and fails the run.
    pub fn run(&mut self) -> HarnessResult<RunSummary> {
        info!("Spawning {} stress lineages", self.workers);
        for lineage in 0..self.workers {
            if let Err(err) = self.processes.spawn(Role::Worker { lineage }) {
                error!(lineage, "{err}");
                self.abort();
                return Err(err);
            }
        }

        let mut summary = self.reap(self.workers)?;
        summary.zombies = self.processes.zombie_children();
        info!(
            reaped = summary.reaped,
            failed_lineages = summary.failed_lineages,
            zombies = summary.zombies,
            "All child processes have exited"
        );
        Ok(summary)
    }

    /// One untargeted wait per expected lineage. Interruptions are retried
    /// without counting; the first one after shutdown is requested forwards
    /// the request to the workers.
    fn reap(&mut self, expected: usize) -> HarnessResult<RunSummary> {
        let mut summary = RunSummary {
            spawned: expected,
            ..RunSummary::default()
        };
        let mut forwarded = false;

        while summary.reaped < expected {
            if !forwarded && self.processes.shutdown_requested() {
                info!("Shutdown requested, stopping {} lineages", self.processes.children().len());
                if let Err(err) = self.processes.terminate_children() {
                    warn!("shutdown not delivered to every lineage: {err}");
                }
                forwarded = true;
            }

            debug!("Waiting for lineages to exit ({}/{} reaped)", summary.reaped, expected);
            match self.processes.wait_any() {
                WaitOutcome::Exited { pid, code } => {
                    summary.reaped += 1;
                    if code == 0 {
                        info!(pid = %pid, "Worker exited");
                    } else {
                        summary.failed_lineages += 1;
                        warn!(pid = %pid, code, "Worker exited with failure");
                    }
                }
                WaitOutcome::Signaled { pid, signal } => {
                    summary.reaped += 1;
                    summary.failed_lineages += 1;
                    warn!(pid = %pid, "Worker killed by {signal}");
                }
                WaitOutcome::Interrupted
                | WaitOutcome::Stopped { .. }
                | WaitOutcome::Continued { .. } => {}
                WaitOutcome::NoChildren => {
                    warn!(
                        "No children left after reaping {}/{} lineages",
                        summary.reaped, expected
                    );
                    break;
                }
                WaitOutcome::OtherError(source) => {
                    return Err(HarnessError::Wait { pid: None, source });
                }
            }
        }
        Ok(summary)
    }

    /// Stops and reaps whatever was spawned before a failed spawn.
    fn abort(&mut self) {
        let started = self.processes.children().len();
        if started == 0 {
            return;
        }
        warn!("Aborting run, tearing down {started} started lineages");
        if let Err(err) = self.processes.terminate_children() {
            warn!("teardown incomplete: {err}");
        }
        loop {
            match self.processes.wait_any() {
                WaitOutcome::NoChildren => break,
                WaitOutcome::OtherError(source) => {
                    error!("reaping aborted lineages failed: {source}");
                    break;
                }
                _ => {}
            }
        }
    }
}
