//! Scripted [`ProcessControl`] for unit tests. Nothing here forks.

use std::collections::{HashSet, VecDeque};

use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::sys::wait::WaitPidFlag;
use nix::unistd::Pid;

use crate::error::{HarnessError, HarnessResult};
use crate::process::{ProcessControl, ProcessHandle, Role, RoleTag, WaitOutcome};

/// Guards tests against a reaper that never terminates.
const MAX_WAIT_CALLS: usize = 10_000;

pub(crate) struct FakeProcesses {
    next_pid: i32,
    children: Vec<ProcessHandle>,
    terminated: HashSet<Pid>,
    /// Every spawn call, including failed ones, in order.
    pub spawn_attempts: Vec<RoleTag>,
    pub fail_spawn_at: Option<usize>,
    pub fail_role: Option<RoleTag>,
    /// Pids that report "no such process" to every signal.
    pub vanished: HashSet<Pid>,
    pub targeted: VecDeque<WaitOutcome>,
    pub untargeted: VecDeque<WaitOutcome>,
    pub targeted_calls: usize,
    pub untargeted_calls: usize,
    pub signals: Vec<(Pid, Option<Signal>)>,
    pub suspends: usize,
    pub yields: usize,
    pub zombies: usize,
    ops: usize,
    shutdown_after: Option<usize>,
}

impl FakeProcesses {
    pub fn new() -> Self {
        Self {
            next_pid: 100,
            children: Vec::new(),
            terminated: HashSet::new(),
            spawn_attempts: Vec::new(),
            fail_spawn_at: None,
            fail_role: None,
            vanished: HashSet::new(),
            targeted: VecDeque::new(),
            untargeted: VecDeque::new(),
            targeted_calls: 0,
            untargeted_calls: 0,
            signals: Vec::new(),
            suspends: 0,
            yields: 0,
            zombies: 0,
            ops: 0,
            shutdown_after: None,
        }
    }

    /// Shutdown reads as requested once this many waits, signals, suspends
    /// and yields have happened.
    pub fn shutdown_after(mut self, ops: usize) -> Self {
        self.shutdown_after = Some(ops);
        self
    }

    pub fn signals_to(&self, pid: Pid) -> Vec<Option<Signal>> {
        self.signals
            .iter()
            .filter(|(to, _)| *to == pid)
            .map(|(_, signal)| *signal)
            .collect()
    }

    fn tick(&mut self) {
        self.ops += 1;
    }

    fn remove_child(&mut self, pid: Pid) {
        self.children.retain(|child| child.pid != pid);
    }

    fn take_reaped(&mut self, outcome: WaitOutcome) -> WaitOutcome {
        if let Some(pid) = outcome.reaped() {
            self.remove_child(pid);
        }
        outcome
    }

    fn guard(&self) {
        assert!(
            self.targeted_calls + self.untargeted_calls < MAX_WAIT_CALLS,
            "wait loop did not terminate"
        );
    }
}

impl ProcessControl for FakeProcesses {
    fn spawn(&mut self, role: Role) -> HarnessResult<ProcessHandle> {
        let call = self.spawn_attempts.len();
        self.spawn_attempts.push(role.tag());
        if self.fail_spawn_at == Some(call) || self.fail_role == Some(role.tag()) {
            return Err(HarnessError::spawn(role.tag(), Errno::EAGAIN));
        }
        let handle = ProcessHandle {
            pid: Pid::from_raw(self.next_pid),
            role: role.tag(),
        };
        self.next_pid += 1;
        self.children.push(handle);
        Ok(handle)
    }

    /// Scripted outcomes first. Then a terminated target is reaped, a live
    /// one reports a continue, and a missing one reports no children.
    fn wait_for(&mut self, target: Pid, _flags: WaitPidFlag) -> WaitOutcome {
        self.guard();
        self.tick();
        self.targeted_calls += 1;
        if let Some(outcome) = self.targeted.pop_front() {
            return self.take_reaped(outcome);
        }
        if !self.children.iter().any(|child| child.pid == target) {
            return WaitOutcome::NoChildren;
        }
        if self.terminated.contains(&target) {
            return self.take_reaped(WaitOutcome::Exited {
                pid: target,
                code: 0,
            });
        }
        WaitOutcome::Continued { pid: target }
    }

    /// Scripted outcomes first. Then a terminated child is reaped before any
    /// other, otherwise the oldest child exits cleanly.
    fn wait_any(&mut self) -> WaitOutcome {
        self.guard();
        self.tick();
        self.untargeted_calls += 1;
        if let Some(outcome) = self.untargeted.pop_front() {
            return self.take_reaped(outcome);
        }
        let next = self
            .children
            .iter()
            .find(|child| self.terminated.contains(&child.pid))
            .or_else(|| self.children.first())
            .map(|child| child.pid);
        match next {
            Some(pid) => self.take_reaped(WaitOutcome::Exited { pid, code: 0 }),
            None => WaitOutcome::NoChildren,
        }
    }

    fn signal(&mut self, pid: Pid, signal: Option<Signal>) -> nix::Result<()> {
        self.tick();
        self.signals.push((pid, signal));
        if self.vanished.contains(&pid) {
            return Err(Errno::ESRCH);
        }
        if signal == Some(Signal::SIGTERM) {
            self.terminated.insert(pid);
        }
        Ok(())
    }

    fn suspend(&mut self) {
        self.tick();
        self.suspends += 1;
    }

    fn yield_now(&mut self) {
        self.tick();
        self.yields += 1;
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown_after.is_some_and(|after| self.ops >= after)
    }

    fn children(&self) -> &[ProcessHandle] {
        &self.children
    }

    fn zombie_children(&mut self) -> usize {
        self.zombies
    }
}
