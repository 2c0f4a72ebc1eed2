//! Spawn fault injection.

use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::sys::wait::WaitPidFlag;
use nix::unistd::Pid;
use tracing::warn;

use crate::error::{HarnessError, HarnessResult};
use crate::process::{ProcessControl, ProcessHandle, Role, WaitOutcome};

/// Wraps a [`ProcessControl`] and makes one spawn call fail with `EAGAIN`,
/// the error fork reports when the process table is exhausted.
pub struct FaultyProcesses<P> {
    inner: P,
    fail_at: usize,
    spawn_calls: usize,
}

impl<P: ProcessControl> FaultyProcesses<P> {
    pub fn new(inner: P, fail_at: usize) -> Self {
        Self {
            inner,
            fail_at,
            spawn_calls: 0,
        }
    }
}

impl<P: ProcessControl> ProcessControl for FaultyProcesses<P> {
    fn spawn(&mut self, role: Role) -> HarnessResult<ProcessHandle> {
        let call = self.spawn_calls;
        self.spawn_calls += 1;
        if call == self.fail_at {
            warn!(call, "Injecting spawn failure for {} process", role.tag());
            return Err(HarnessError::spawn(role.tag(), Errno::EAGAIN));
        }
        self.inner.spawn(role)
    }

    fn wait_for(&mut self, target: Pid, flags: WaitPidFlag) -> WaitOutcome {
        self.inner.wait_for(target, flags)
    }

    fn wait_any(&mut self) -> WaitOutcome {
        self.inner.wait_any()
    }

    fn signal(&mut self, pid: Pid, signal: Option<Signal>) -> nix::Result<()> {
        self.inner.signal(pid, signal)
    }

    fn suspend(&mut self) {
        self.inner.suspend()
    }

    fn yield_now(&mut self) {
        self.inner.yield_now()
    }

    fn shutdown_requested(&self) -> bool {
        self.inner.shutdown_requested()
    }

    fn children(&self) -> &[ProcessHandle] {
        self.inner.children()
    }

    fn zombie_children(&mut self) -> usize {
        self.inner.zombie_children()
    }
}
