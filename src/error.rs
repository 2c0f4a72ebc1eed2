//! Error types for the wait stressor

use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use thiserror::Error;

use crate::process::RoleTag;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("failed to spawn {role} process: {source}")]
    Spawn { role: RoleTag, source: Errno },

    #[error("wait on {} failed: {source}", describe_target(.pid))]
    Wait { pid: Option<Pid>, source: Errno },

    #[error("failed to deliver {signal} to pid {pid}: {source}")]
    Signal {
        pid: Pid,
        signal: Signal,
        source: Errno,
    },

    #[error("setup failed: {0}")]
    Setup(String),
}

impl HarnessError {
    pub fn spawn(role: RoleTag, source: Errno) -> Self {
        Self::Spawn { role, source }
    }

    pub fn setup<S: Into<String>>(message: S) -> Self {
        Self::Setup(message.into())
    }
}

fn describe_target(pid: &Option<Pid>) -> String {
    match pid {
        Some(pid) => format!("pid {pid}"),
        None => "any child".to_string(),
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;
