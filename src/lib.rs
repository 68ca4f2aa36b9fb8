//! Launch a program under `ptrace(2)` and single-step it to termination, reporting the
//! instruction pointer at every stop.

pub mod cmd;
pub mod controller;
pub mod error;
pub mod ptracer;
pub mod wait;

#[cfg(target_arch = "aarch64")]
#[allow(non_camel_case_types)]
mod aarch64;

pub use cmd::Command;
pub use controller::{State, Trace, TraceController};
pub use error::{Error, InspectError, LaunchError};
pub use ptracer::{InstructionPointer, Pid, Ptracer, RegisterInspector, Signal, TraceOps, TracedProcess};
pub use wait::{decode, RawStatus, WaitEvent};
