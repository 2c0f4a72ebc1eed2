use nix::unistd::Pid;
use sysinfo::{Pid as SysPid, ProcessStatus, ProcessesToUpdate, System};

/// Counts zombie processes whose parent is `parent`.
pub fn zombie_children(parent: Pid) -> usize {
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::All, true);

    let parent = SysPid::from_u32(parent.as_raw() as u32);
    sys.processes()
        .values()
        .filter(|process| process.parent() == Some(parent))
        .filter(|process| process.status() == ProcessStatus::Zombie)
        .count()
}
