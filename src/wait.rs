//! Classification of `waitpid(2)` status words.

use std::convert::TryFrom;
use std::fmt;
use std::io::{self, Write};

use nix::sys::signal::Signal;


/// Undecoded status word written by `waitpid(2)`.
///
/// Each predicate is evaluated independently, exactly as the `W*` macros of
/// `<sys/wait.h>` do. Use [`decode()`] to get a single classification.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RawStatus(pub libc::c_int);

impl RawStatus {
    pub fn is_stopped(self) -> bool {
        libc::WIFSTOPPED(self.0)
    }

    pub fn stop_signal(self) -> i32 {
        libc::WSTOPSIG(self.0)
    }

    pub fn is_exited(self) -> bool {
        libc::WIFEXITED(self.0)
    }

    pub fn exit_code(self) -> i32 {
        libc::WEXITSTATUS(self.0)
    }

    pub fn is_signaled(self) -> bool {
        libc::WIFSIGNALED(self.0)
    }

    pub fn term_signal(self) -> i32 {
        libc::WTERMSIG(self.0)
    }

    pub fn core_dumped(self) -> bool {
        libc::WCOREDUMP(self.0)
    }

    /// Write one line per satisfied predicate.
    ///
    /// A status word could satisfy more than one predicate under some encodings, so
    /// no precedence is applied here. Every applicable line is printed.
    pub fn report(self, out: &mut impl Write) -> io::Result<()> {
        if self.is_stopped() {
            writeln!(out, "Child stopped: {}", self.stop_signal())?;
        }

        if self.is_exited() {
            writeln!(out, "Child exited: {}", self.exit_code())?;
        }

        if self.is_signaled() {
            writeln!(out, "Child signaled: {}", self.term_signal())?;
        }

        if self.core_dumped() {
            writeln!(out, "Core dumped.")?;
        }

        Ok(())
    }
}

/// Classified outcome of waiting on a tracee.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WaitEvent {
    /// Tracee is in a ptrace-stop, and will accept further ptrace requests.
    Stopped { signal: i32 },

    /// Tracee terminated normally.
    Exited { exit_code: i32 },

    /// Tracee was terminated by a signal.
    Signaled { signal: i32, core_dumped: bool },
}

impl WaitEvent {
    /// The stopping or terminating signal as a known POSIX [`Signal`], if any.
    ///
    /// Real-time signals have no [`Signal`] variant, and yield `None`.
    pub fn signal(&self) -> Option<Signal> {
        match *self {
            WaitEvent::Stopped { signal } |
            WaitEvent::Signaled { signal, .. } => Signal::try_from(signal).ok(),
            WaitEvent::Exited { .. } => None,
        }
    }
}

impl fmt::Display for WaitEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            WaitEvent::Stopped { signal } =>
                write!(f, "stopped: {}", signal),
            WaitEvent::Exited { exit_code } =>
                write!(f, "exited: {}", exit_code),
            WaitEvent::Signaled { signal, core_dumped: false } =>
                write!(f, "signaled: {}", signal),
            WaitEvent::Signaled { signal, core_dumped: true } =>
                write!(f, "signaled: {} (core dumped)", signal),
        }
    }
}

/// Classify a raw wait status.
///
/// Total over all `c_int` values. The stopped predicate is checked first, since a
/// stop encoding can also look like a termination under legacy layouts. Anything
/// that is neither stopped nor a normal exit is a signaled termination, which also
/// absorbs encodings `waitpid()` never reports without `WCONTINUED`.
pub fn decode(status: RawStatus) -> WaitEvent {
    if status.is_stopped() {
        WaitEvent::Stopped { signal: status.stop_signal() }
    } else if status.is_exited() {
        WaitEvent::Exited { exit_code: status.exit_code() }
    } else {
        WaitEvent::Signaled {
            signal: status.term_signal(),
            core_dumped: status.core_dumped(),
        }
    }
}
