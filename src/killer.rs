use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use tracing::{debug, info};

use crate::process::ProcessControl;

/// Toggles `target` between stopped and running until shutdown is requested.
///
/// Send errors are ignored and the target is not checked beforehand, so a
/// recycled pid would be signalled too. With `verify_target` the killer
/// probes the target before every STOP and leaves once it is gone; a pid
/// recycled between the probe and the STOP is still hit.
///
/// Returns the number of completed STOP/CONTINUE cycles.
pub fn run<P: ProcessControl>(processes: &mut P, target: Pid, verify_target: bool) -> u64 {
    info!(target = %target, verify_target, "Killer toggling runner");
    let mut cycles = 0;
    while !processes.shutdown_requested() {
        if verify_target && processes.signal(target, None) == Err(Errno::ESRCH) {
            info!(target = %target, cycles, "Runner is gone, killer exiting");
            return cycles;
        }
        let _ = processes.signal(target, Some(Signal::SIGSTOP));
        processes.yield_now();
        let _ = processes.signal(target, Some(Signal::SIGCONT));
        cycles += 1;
    }
    debug!(target = %target, cycles, "Killer exiting");
    cycles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeProcesses;

    #[test]
    fn stop_is_always_followed_by_continue() {
        let target = Pid::from_raw(500);
        // stop, yield and continue make three operations per cycle
        let mut processes = FakeProcesses::new().shutdown_after(9);

        assert_eq!(run(&mut processes, target, false), 3);
        assert_eq!(processes.yields, 3);
        assert_eq!(
            processes.signals_to(target),
            [Signal::SIGSTOP, Signal::SIGCONT]
                .repeat(3)
                .into_iter()
                .map(Some)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn keeps_signalling_a_vanished_target_by_default() {
        let target = Pid::from_raw(501);
        let mut processes = FakeProcesses::new().shutdown_after(6);
        processes.vanished.insert(target);

        assert_eq!(run(&mut processes, target, false), 2);
        assert_eq!(processes.signals.len(), 4);
    }

    #[test]
    fn verified_target_stops_once_runner_is_gone() {
        let target = Pid::from_raw(502);
        let mut processes = FakeProcesses::new().shutdown_after(100);
        processes.vanished.insert(target);

        assert_eq!(run(&mut processes, target, true), 0);
        assert_eq!(processes.signals_to(target), vec![None]);
    }

    #[test]
    fn verified_target_probes_before_each_stop() {
        let target = Pid::from_raw(503);
        // probe, stop, yield and continue
        let mut processes = FakeProcesses::new().shutdown_after(8);

        assert_eq!(run(&mut processes, target, true), 2);
        assert_eq!(
            processes.signals_to(target),
            vec![
                None,
                Some(Signal::SIGSTOP),
                Some(Signal::SIGCONT),
                None,
                Some(Signal::SIGSTOP),
                Some(Signal::SIGCONT),
            ]
        );
    }
}
