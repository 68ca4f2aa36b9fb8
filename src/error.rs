use std::ffi::NulError;

use nix::errno::Errno;

use crate::ptracer::Pid;


pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Could not single-step tracee = {pid}")]
    Step { pid: Pid, source: Errno },

    #[error("Could not wait on tracee = {pid}")]
    Wait { pid: Pid, source: Errno },

    #[error("Could not detach from tracee = {pid}")]
    Detach { pid: Pid, source: Errno },
}

/// Failures observable by the parent while creating a tracee.
///
/// `PTRACE_TRACEME` and `execve()` failures happen in the child, after `fork()`, and
/// are only seen as an early exit status. See [`crate::cmd::TRACEME_FAILED_STATUS`]
/// and [`crate::cmd::EXEC_FAILED_STATUS`].
#[derive(thiserror::Error, Debug)]
pub enum LaunchError {
    #[error("Command exe required")]
    EmptyArgv,

    #[error("Argument or environment entry contains an interior NUL byte")]
    Nul(#[from] NulError),

    #[error("Error forking: {}", .0.desc())]
    Fork(Errno),
}

#[derive(thiserror::Error, Debug)]
pub enum InspectError {
    #[error("Error fetching registers from child process: {}", .source.desc())]
    RegisterRead { pid: Pid, source: Errno },
}

impl InspectError {
    /// `true` if the register read failed because the tracee no longer exists.
    ///
    /// Only useful for logging. Any register read failure ends the step loop.
    pub fn tracee_died(&self) -> bool {
        match self {
            InspectError::RegisterRead { source, .. } => *source == Errno::ESRCH,
        }
    }
}
