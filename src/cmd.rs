use std::env;
use std::ffi::{CStr, CString, OsString};
use std::os::unix::ffi::OsStringExt;

use nix::{
    sys::ptrace,
    unistd::{fork, ForkResult},
};
use tracing::{debug, info};

use crate::error::LaunchError;
use crate::ptracer::TracedProcess;


/// Exit status of a child which could not request `PTRACE_TRACEME`.
pub const TRACEME_FAILED_STATUS: i32 = 125;

/// Exit status of a traced child whose `execve()` failed.
pub const EXEC_FAILED_STATUS: i32 = 127;

const TRACEME_FAILED_MSG: &[u8] = b"Error setting TRACEME\n";
const EXEC_FAILED_MSG: &[u8] = b"Error executing target\n";

/// Command to spawn as a child process to be traced.
#[derive(Clone, Debug)]
pub struct Command {
    /// Argument vector to pass to `execve()`. The first entry is also the exe path.
    argv: Vec<CString>,

    /// Environment to pass to `execve()`, as `NAME=VALUE` entries.
    env: Vec<CString>,
}

impl Command {
    pub fn new<A, E>(
        argv: impl IntoIterator<Item = A>,
        env: impl IntoIterator<Item = E>,
    ) -> Result<Self, LaunchError>
    where
        A: Into<Vec<u8>>,
        E: Into<Vec<u8>>,
    {
        // Ensure we own NUL-terminated strings for the foreign exec call.
        //
        // We're heap-allocating, so always do this before forking.
        let argv = argv
            .into_iter()
            .map(CString::new)
            .collect::<Result<Vec<_>, _>>()?;

        if argv.is_empty() {
            return Err(LaunchError::EmptyArgv);
        }

        let env = env
            .into_iter()
            .map(CString::new)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { argv, env })
    }

    /// Command for `args`, inheriting the environment of the current process.
    pub fn from_args(args: impl IntoIterator<Item = OsString>) -> Result<Self, LaunchError> {
        let argv = args.into_iter().map(OsString::into_vec);
        let env = env::vars_os().map(|(name, value)| {
            let mut entry = name.into_vec();
            entry.push(b'=');
            entry.extend(value.into_vec());
            entry
        });

        Self::new(argv, env)
    }

    /// Path of the executable, which is also `argv[0]` of the tracee.
    pub fn path(&self) -> &CStr {
        &self.argv[0]
    }

    pub fn args(&self) -> &[CString] {
        &self.argv
    }

    /// Fork and exec a child process determined by `self.argv`.
    ///
    /// The child requests `PTRACE_TRACEME` before exec, so it will report a `SIGTRAP`
    /// stop when the new image is loaded, before running any of its instructions.
    ///
    /// If either request fails in the child, it exits immediately with
    /// [`TRACEME_FAILED_STATUS`] or [`EXEC_FAILED_STATUS`]. The parent only sees this
    /// as an early exit of the returned tracee.
    pub fn fork_exec(self) -> Result<TracedProcess, LaunchError> {
        // Heap-allocates, must occur pre-fork.
        let argv = nul_terminated(&self.argv);
        let envp = nul_terminated(&self.env);

        debug!(path = ?self.path(), argc = self.argv.len(), "forking tracee");

        // SAFETY: the child branch only makes async-signal-safe calls, and never returns.
        match unsafe { fork() } {
            Ok(ForkResult::Child) => {
                // No `?`, logging, or panics post-fork: each may allocate.
                if ptrace::traceme().is_err() {
                    child_exit(TRACEME_FAILED_MSG, TRACEME_FAILED_STATUS);
                }

                // Use `libc::execve`, because the `nix` wrapper heap-allocates internally.
                unsafe {
                    libc::execve(argv[0], argv.as_ptr(), envp.as_ptr());
                }

                // Only reached if `execve()` failed.
                child_exit(EXEC_FAILED_MSG, EXEC_FAILED_STATUS)
            },
            Ok(ForkResult::Parent { child }) => {
                info!(pid = child.as_raw(), "spawned tracee");

                Ok(TracedProcess::new(child))
            },
            Err(errno) => {
                Err(LaunchError::Fork(errno))
            },
        }
    }
}

// Construct a NUL-terminated pointer array for `execve`. We heap-allocate to return a
// `Vec`, and so must do this before calling `fork()`.
fn nul_terminated(strings: &[CString]) -> Vec<*const libc::c_char> {
    let mut ptrs: Vec<_> = strings
        .iter()
        .map(|s| s.as_ptr())
        .collect();
    ptrs.push(std::ptr::null());
    ptrs
}

// Post-fork exit of the child, using only async-signal-safe calls.
fn child_exit(msg: &[u8], status: i32) -> ! {
    unsafe {
        libc::write(libc::STDERR_FILENO, msg.as_ptr().cast(), msg.len());
        libc::_exit(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_argv() {
        let argv: Vec<&str> = vec![];
        let env: Vec<&str> = vec![];

        let err = Command::new(argv, env).unwrap_err();
        assert!(matches!(err, LaunchError::EmptyArgv));
    }

    #[test]
    fn test_interior_nul() {
        let err = Command::new(vec!["/bin/t\0rue"], Vec::<&str>::new()).unwrap_err();
        assert!(matches!(err, LaunchError::Nul(..)));

        let err = Command::new(vec!["/bin/true"], vec!["A=\0"]).unwrap_err();
        assert!(matches!(err, LaunchError::Nul(..)));
    }

    #[test]
    fn test_path_is_argv0() {
        let args = vec![OsString::from("/bin/echo"), OsString::from("-n"), OsString::from("hi")];
        let cmd = Command::from_args(args).unwrap();

        assert_eq!(cmd.path().to_bytes(), b"/bin/echo");
        assert_eq!(cmd.args().len(), 3);
        assert_eq!(cmd.args()[1].to_bytes(), b"-n");
    }

    #[test]
    fn test_nul_terminated() {
        let strings = vec![CString::new("a").unwrap(), CString::new("b").unwrap()];
        let ptrs = nul_terminated(&strings);

        assert_eq!(ptrs.len(), 3);
        assert!(ptrs[2].is_null());
        assert_eq!(ptrs[0], strings[0].as_ptr());
    }
}
