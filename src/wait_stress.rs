use tracing::{error, info};

use crate::error::HarnessResult;
use crate::process::{ProcessControl, Role};
use crate::wait_reaper::{ReapStats, WaitReaper};

/// One lineage: a runner, a killer aimed at it, and the reaper loop.
pub struct StressWorker<'a, P> {
    processes: &'a mut P,
}

impl<'a, P: ProcessControl> StressWorker<'a, P> {
    pub fn new(processes: &'a mut P) -> Self {
        Self { processes }
    }

    /// Builds the lineage and reaps it until the loop ends.
    ///
    /// A runner that cannot be spawned aborts the lineage. A killer that
    /// cannot be spawned leaves a degraded lineage: the reaper still runs and
    /// the spawn error is returned once it finishes.
    pub fn run(&mut self, lineage: usize) -> HarnessResult<ReapStats> {
        let runner = self.processes.spawn(Role::Runner)?;

        let killer = self.processes.spawn(Role::Killer { target: runner.pid });
        match &killer {
            Ok(handle) => {
                info!(lineage, runner = %runner.pid, killer = %handle.pid, "Lineage started");
            }
            Err(err) => {
                error!(lineage, runner = %runner.pid, "{err}, reaping without a killer");
            }
        }

        let reaped = WaitReaper::new(runner.pid).run(self.processes);
        match killer {
            Err(spawn_err) => {
                if let Err(wait_err) = &reaped {
                    error!(lineage, "{wait_err}");
                }
                Err(spawn_err)
            }
            Ok(_) => reaped,
        }
    }
}
