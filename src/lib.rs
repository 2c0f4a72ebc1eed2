//! Stress harness for the kernel's wait/stop/continue notification path.
//!
//! The orchestrator forks a number of worker lineages. Each worker forks a
//! runner that idles in `pause` and a killer that hammers the runner with
//! `SIGSTOP`/`SIGCONT`, then sits in a `waitpid`/`wait` loop observing the
//! runner's transitions. The tree runs until it is signalled or its run
//! window elapses.

pub mod config;
pub mod error;
pub mod fault;
pub mod killer;
pub mod logging;
pub mod orchestrator;
pub mod process;
pub mod process_table;
pub mod runner;
pub mod shutdown;
pub mod wait_reaper;
pub mod wait_stress;

#[cfg(test)]
mod fake;

pub use config::StressConfig;
pub use error::{HarnessError, HarnessResult};
pub use orchestrator::{Orchestrator, RunSummary};
pub use process::{ProcessControl, ProcessHandle, Role, RoleTag, SystemProcesses, WaitOutcome};
pub use wait_reaper::{ReapStats, WaitReaper};
pub use wait_stress::StressWorker;
