//! The OS trace facility: waiting on, single-stepping, inspecting, and detaching from a
//! tracee.
//!
//! The [`TraceOps`] and [`RegisterInspector`] traits are the seam between the trace
//! controller and `ptrace(2)`. [`Ptracer`] is the real implementation.

use std::fmt;
use std::marker::PhantomData;

use nix::{
    errno::Errno,
    sys::ptrace,
};
use tracing::trace;

use crate::controller::State;
use crate::error::{Error, InspectError, Result};
use crate::wait::RawStatus;

#[cfg(target_arch = "aarch64")]
use crate::aarch64;

pub use nix::unistd::Pid;

/// POSIX signal.
pub use nix::sys::signal::Signal;

/// Register state of a tracee.
#[cfg(target_arch = "aarch64")]
pub type Registers = aarch64::user_pt_regs;

/// Register state of a tracee.
#[cfg(target_arch = "x86_64")]
pub type Registers = libc::user_regs_struct;

/// Address of the next instruction a stopped tracee will execute.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct InstructionPointer(pub u64);

impl InstructionPointer {
    pub fn addr(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstructionPointer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A child process traced via `PTRACE_TRACEME`, and its place in the trace lifecycle.
///
/// **Warning:** the underlying process is not guaranteed to exist, and operations on
/// it may fail between waits.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TracedProcess {
    pid: Pid,
    pub(crate) state: State,

    #[doc(hidden)]
    _not_send: PhantomData<*const ()>,
}

impl TracedProcess {
    pub fn new(pid: Pid) -> Self {
        let state = State::Launching;
        let _not_send = PhantomData;

        Self { pid, state, _not_send }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn state(&self) -> State {
        self.state
    }
}

/// Reads the instruction pointer of a stopped tracee.
///
/// Callers must only ask while the tracee is in a ptrace-stop. This is not checked.
pub trait RegisterInspector {
    fn read_instruction_pointer(&self, pid: Pid) -> std::result::Result<InstructionPointer, InspectError>;
}

/// Blocking requests to the OS trace facility.
pub trait TraceOps: RegisterInspector {
    /// Block until `pid` changes state, returning its raw wait status.
    fn wait(&mut self, pid: Pid) -> Result<RawStatus>;

    /// Resume the stopped tracee for exactly one instruction, delivering `signal`.
    fn step(&mut self, pid: Pid, signal: Option<Signal>) -> Result<()>;

    /// Release the tracee, letting it run untraced if it is still alive.
    fn detach(&mut self, pid: Pid) -> Result<()>;
}

impl<T: RegisterInspector + ?Sized> RegisterInspector for &mut T {
    fn read_instruction_pointer(&self, pid: Pid) -> std::result::Result<InstructionPointer, InspectError> {
        (**self).read_instruction_pointer(pid)
    }
}

impl<T: TraceOps + ?Sized> TraceOps for &mut T {
    fn wait(&mut self, pid: Pid) -> Result<RawStatus> {
        (**self).wait(pid)
    }

    fn step(&mut self, pid: Pid, signal: Option<Signal>) -> Result<()> {
        (**self).step(pid, signal)
    }

    fn detach(&mut self, pid: Pid) -> Result<()> {
        (**self).detach(pid)
    }
}

/// Tracer for a single Linux process, using `ptrace(2)` and `waitpid(2)` directly.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Ptracer {
    _not_send: PhantomData<*const ()>,
}

impl Ptracer {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(target_arch = "x86_64")]
    pub fn registers(&self, pid: Pid) -> nix::Result<Registers> {
        ptrace::getregs(pid)
    }

    #[cfg(target_arch = "aarch64")]
    pub fn registers(&self, pid: Pid) -> nix::Result<Registers> {
        let mut data = std::mem::MaybeUninit::<Registers>::uninit();
        let mut rv = libc::iovec {
            iov_base: data.as_mut_ptr() as *mut libc::c_void,
            iov_len: std::mem::size_of::<Registers>(),
        };

        let res = unsafe {
            libc::ptrace(
                aarch64::PTRACE_GETREGSET,
                pid.as_raw(),
                aarch64::NT_PRSTATUS,
                &mut rv as *mut _ as *mut libc::c_void,
            )
        };

        Errno::result(res)?;

        Ok(unsafe { data.assume_init() })
    }
}

impl RegisterInspector for Ptracer {
    #[cfg(target_arch = "x86_64")]
    fn read_instruction_pointer(&self, pid: Pid) -> std::result::Result<InstructionPointer, InspectError> {
        let regs = self.registers(pid)
            .map_err(|source| InspectError::RegisterRead { pid, source })?;

        Ok(InstructionPointer(regs.rip))
    }

    #[cfg(target_arch = "aarch64")]
    fn read_instruction_pointer(&self, pid: Pid) -> std::result::Result<InstructionPointer, InspectError> {
        let regs = self.registers(pid)
            .map_err(|source| InspectError::RegisterRead { pid, source })?;

        Ok(InstructionPointer(regs.pc))
    }
}

impl TraceOps for Ptracer {
    fn wait(&mut self, pid: Pid) -> Result<RawStatus> {
        // Use `libc::waitpid`, since the `nix` wrapper only returns an already-decoded
        // status.
        let mut status: libc::c_int = 0;
        let res = unsafe { libc::waitpid(pid.as_raw(), &mut status, 0) };

        Errno::result(res).map_err(|source| Error::Wait { pid, source })?;

        trace!(pid = pid.as_raw(), status, "waited on tracee");

        Ok(RawStatus(status))
    }

    fn step(&mut self, pid: Pid, signal: Option<Signal>) -> Result<()> {
        ptrace::step(pid, signal).map_err(|source| Error::Step { pid, source })
    }

    fn detach(&mut self, pid: Pid) -> Result<()> {
        ptrace::detach(pid, None::<Signal>).map_err(|source| Error::Detach { pid, source })
    }
}
