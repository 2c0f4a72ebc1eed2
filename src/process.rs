//! Process creation, signalling and wait primitives.
//!
//! Everything the stress tree does to the operating system goes through
//! [`ProcessControl`]. [`SystemProcesses`] is the real implementation built on
//! `fork`, `kill` and `waitpid`; tests drive the same logic with a scripted
//! fake.

use std::fmt;

use nix::errno::Errno;
use nix::sched::sched_yield;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{wait, waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{fork, getpid, getppid, pause, ForkResult, Pid};
use tracing::{debug, error, info, warn};

use crate::config::StressConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::wait_stress::StressWorker;
use crate::{killer, process_table, runner, shutdown};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleTag {
    Worker,
    Runner,
    Killer,
}

impl fmt::Display for RoleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoleTag::Worker => "worker",
            RoleTag::Runner => "runner",
            RoleTag::Killer => "killer",
        };
        f.write_str(name)
    }
}

/// What a freshly forked process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// One stress lineage: runner, killer and the reaper loop.
    Worker { lineage: usize },
    /// Passive signal target.
    Runner,
    /// STOP/CONTINUE generator aimed at `target`.
    Killer { target: Pid },
}

impl Role {
    pub fn tag(&self) -> RoleTag {
        match self {
            Role::Worker { .. } => RoleTag::Worker,
            Role::Runner => RoleTag::Runner,
            Role::Killer { .. } => RoleTag::Killer,
        }
    }

    /// Runs the role inside the forked child and returns its exit code.
    pub fn enter(self, parent: Pid, config: StressConfig) -> i32 {
        if let Err(err) = prepare_child(parent) {
            error!(pid = %getpid(), "{err}");
            return 1;
        }
        if shutdown::requested() {
            return 0;
        }

        let mut processes = SystemProcesses::new(config);
        match self {
            Role::Worker { lineage } => {
                info!(pid = %getpid(), lineage, "Worker started");
                match StressWorker::new(&mut processes).run(lineage) {
                    Ok(stats) => {
                        info!(pid = %getpid(), lineage, ?stats, "Worker finished");
                        0
                    }
                    Err(err) => {
                        error!(pid = %getpid(), lineage, "Worker failed: {err}");
                        1
                    }
                }
            }
            Role::Runner => {
                runner::run(&mut processes);
                0
            }
            Role::Killer { target } => {
                killer::run(&mut processes, target, config.verify_target);
                0
            }
        }
    }
}

/// Links the child's lifetime to its parent and installs the shutdown handler.
///
/// The death signal is `SIGKILL` rather than `SIGTERM`: a runner left stopped
/// by its killer could never act on a `SIGTERM`.
fn prepare_child(parent: Pid) -> HarnessResult<()> {
    shutdown::install()?;

    #[cfg(target_os = "linux")]
    {
        let rc = unsafe {
            libc::prctl(
                libc::PR_SET_PDEATHSIG,
                libc::SIGKILL as libc::c_ulong,
                0 as libc::c_ulong,
                0 as libc::c_ulong,
                0 as libc::c_ulong,
            )
        };
        if rc == -1 {
            return Err(HarnessError::setup(format!(
                "PR_SET_PDEATHSIG: {}",
                Errno::last()
            )));
        }
    }

    // parent died before the death signal was armed
    if getppid() != parent {
        let _ = kill(getpid(), Signal::SIGKILL);
    }
    Ok(())
}

/// A child created through [`ProcessControl::spawn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessHandle {
    pub pid: Pid,
    pub role: RoleTag,
}

/// Classified result of a single wait call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Exited { pid: Pid, code: i32 },
    Signaled { pid: Pid, signal: Signal },
    Stopped { pid: Pid, signal: Signal },
    Continued { pid: Pid },
    Interrupted,
    NoChildren,
    OtherError(Errno),
}

impl WaitOutcome {
    pub fn from_wait(result: nix::Result<WaitStatus>) -> Self {
        match result {
            Ok(WaitStatus::Exited(pid, code)) => WaitOutcome::Exited { pid, code },
            Ok(WaitStatus::Signaled(pid, signal, _)) => WaitOutcome::Signaled { pid, signal },
            Ok(WaitStatus::Stopped(pid, signal)) => WaitOutcome::Stopped { pid, signal },
            Ok(WaitStatus::Continued(pid)) => WaitOutcome::Continued { pid },
            // StillAlive needs WNOHANG and ptrace stops need a tracer; neither is used
            Ok(status) => {
                warn!(?status, "unexpected wait status");
                WaitOutcome::OtherError(Errno::EINVAL)
            }
            Err(Errno::EINTR) => WaitOutcome::Interrupted,
            Err(Errno::ECHILD) => WaitOutcome::NoChildren,
            Err(errno) => WaitOutcome::OtherError(errno),
        }
    }

    /// Pid of a child this call collected, if it terminated.
    pub fn reaped(&self) -> Option<Pid> {
        match self {
            WaitOutcome::Exited { pid, .. } | WaitOutcome::Signaled { pid, .. } => Some(*pid),
            _ => None,
        }
    }

    pub fn is_no_children(&self) -> bool {
        matches!(self, WaitOutcome::NoChildren)
    }
}

/// OS surface used by the stress tree.
pub trait ProcessControl {
    /// Creates a child running `role`. The child never returns here.
    fn spawn(&mut self, role: Role) -> HarnessResult<ProcessHandle>;

    /// Waits on one child with extra notification flags.
    fn wait_for(&mut self, target: Pid, flags: WaitPidFlag) -> WaitOutcome;

    /// Waits on any child for exit or termination only.
    fn wait_any(&mut self) -> WaitOutcome;

    /// Sends `signal` to `pid`; `None` only probes for existence.
    fn signal(&mut self, pid: Pid, signal: Option<Signal>) -> nix::Result<()>;

    /// Blocks until a signal is delivered.
    fn suspend(&mut self);

    /// Gives up the CPU once.
    fn yield_now(&mut self);

    fn shutdown_requested(&self) -> bool;

    /// Children spawned by this process that have not been reaped yet.
    fn children(&self) -> &[ProcessHandle];

    /// Zombie children of this process still present in the process table.
    fn zombie_children(&mut self) -> usize;

    /// Asks every live child to shut down: `SIGTERM`, then `SIGCONT` so a
    /// stopped child can act on it. Newest children go first.
    fn terminate_children(&mut self) -> HarnessResult<()> {
        let children: Vec<ProcessHandle> = self.children().iter().rev().copied().collect();
        let mut first_error = None;
        for child in children {
            for signal in [Signal::SIGTERM, Signal::SIGCONT] {
                match self.signal(child.pid, Some(signal)) {
                    Ok(()) | Err(Errno::ESRCH) => {}
                    Err(source) => {
                        warn!(pid = %child.pid, role = %child.role, "could not send {signal}: {source}");
                        first_error.get_or_insert(HarnessError::Signal {
                            pid: child.pid,
                            signal,
                            source,
                        });
                    }
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// [`ProcessControl`] backed by the operating system.
pub struct SystemProcesses {
    config: StressConfig,
    children: Vec<ProcessHandle>,
}

impl SystemProcesses {
    pub fn new(config: StressConfig) -> Self {
        Self {
            config,
            children: Vec::new(),
        }
    }

    fn forget(&mut self, outcome: &WaitOutcome) {
        if let Some(pid) = outcome.reaped() {
            self.children.retain(|child| child.pid != pid);
        }
    }
}

impl ProcessControl for SystemProcesses {
    fn spawn(&mut self, role: Role) -> HarnessResult<ProcessHandle> {
        let parent = getpid();
        match unsafe { fork() } {
            Ok(ForkResult::Parent { child }) => {
                let handle = ProcessHandle {
                    pid: child,
                    role: role.tag(),
                };
                self.children.push(handle);
                info!(parent = %parent, pid = %child, "Spawned {} process", handle.role);
                Ok(handle)
            }
            Ok(ForkResult::Child) => {
                let code = role.enter(parent, self.config);
                unsafe { libc::_exit(code) }
            }
            Err(source) => Err(HarnessError::spawn(role.tag(), source)),
        }
    }

    fn wait_for(&mut self, target: Pid, flags: WaitPidFlag) -> WaitOutcome {
        let outcome = WaitOutcome::from_wait(waitpid(target, Some(flags)));
        self.forget(&outcome);
        outcome
    }

    fn wait_any(&mut self) -> WaitOutcome {
        let outcome = WaitOutcome::from_wait(wait());
        self.forget(&outcome);
        outcome
    }

    fn signal(&mut self, pid: Pid, signal: Option<Signal>) -> nix::Result<()> {
        kill(pid, signal)
    }

    fn suspend(&mut self) {
        pause();
    }

    fn yield_now(&mut self) {
        if let Err(errno) = sched_yield() {
            debug!("sched_yield failed: {errno}");
        }
    }

    fn shutdown_requested(&self) -> bool {
        shutdown::requested()
    }

    fn children(&self) -> &[ProcessHandle] {
        &self.children
    }

    fn zombie_children(&mut self) -> usize {
        process_table::zombie_children(getpid())
    }
}
