use std::time::Duration;

/// Lineage count used when none is given on the command line.
pub const DEFAULT_WORKERS: usize = 52;

/// Settings shared by every process in the stress tree.
///
/// The orchestrator builds this once from the command line; forked children
/// receive their own copy through the fork.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StressConfig {
    /// Number of independent worker lineages.
    pub workers: usize,
    /// Run window. Zero runs until the tree is signalled.
    pub duration: Duration,
    /// Killer probes the runner before each STOP and stops once it is gone.
    pub verify_target: bool,
    /// Orchestrator spawn call (0-based) forced to fail.
    pub fail_spawn: Option<usize>,
}

impl StressConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_verify_target(mut self, verify_target: bool) -> Self {
        self.verify_target = verify_target;
        self
    }

    pub fn with_fail_spawn(mut self, fail_spawn: Option<usize>) -> Self {
        self.fail_spawn = fail_spawn;
        self
    }

    pub fn indefinite(&self) -> bool {
        self.duration.is_zero()
    }
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            duration: Duration::ZERO,
            verify_target: false,
            fail_spawn: None,
        }
    }
}
