//! The single-step trace loop.

use std::convert::TryFrom;
use std::fmt;
use std::io::Write;

use tracing::{debug, trace, warn};

use crate::ptracer::{Pid, Signal, TraceOps, TracedProcess};
use crate::wait::{decode, RawStatus, WaitEvent};


/// Lifecycle of a [`TracedProcess`] under a [`TraceController`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum State {
    // Forked, not yet waited on.
    Launching,

    // Blocked until the tracee reports its post-exec stop.
    WaitingInitialStop,

    // In a ptrace-stop, ready to be inspected and stepped.
    Stopped { signal: i32 },

    Exited { exit_code: i32 },

    Signaled { signal: i32, core_dumped: bool },

    // Registers could not be read from a stopped tracee.
    InspectFailed,

    // A single-step request, or the wait for its completion, failed.
    StepFailed,

    // The wait for the initial stop failed.
    WaitFailed,
}

impl State {
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            State::Launching | State::WaitingInitialStop | State::Stopped { .. }
        )
    }

    /// Signal to deliver when restarting from this state.
    ///
    /// `SIGTRAP` stops are our own single-step and post-exec traps, and are suppressed.
    /// Any other stop is a signal-delivery-stop, whose signal must reach the tracee.
    /// Real-time signals have no [`Signal`] variant, and are not delivered.
    pub fn pending_signal(&self) -> Option<Signal> {
        match *self {
            State::Stopped { signal } if signal != libc::SIGTRAP =>
                Signal::try_from(signal).ok(),
            _ => None,
        }
    }
}

impl From<WaitEvent> for State {
    fn from(event: WaitEvent) -> Self {
        match event {
            WaitEvent::Stopped { signal } =>
                State::Stopped { signal },
            WaitEvent::Exited { exit_code } =>
                State::Exited { exit_code },
            WaitEvent::Signaled { signal, core_dumped } =>
                State::Signaled { signal, core_dumped },
        }
    }
}

/// Summary of a completed [`TraceController::run()`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Trace {
    pub pid: Pid,

    /// Number of instruction pointers read and reported.
    pub steps: u64,

    /// Terminal state that ended the loop.
    pub state: State,

    /// Most recent wait event, if any wait succeeded.
    pub last_event: Option<WaitEvent>,
}

/// Drives a tracee from its initial stop to termination, one instruction at a time.
///
/// Diagnostic lines are written to `out`. Write failures are logged and otherwise
/// ignored, since they must not leave the tracee attached.
pub struct TraceController<T, W> {
    ops: T,
    out: W,
    process: TracedProcess,
    last_status: Option<RawStatus>,
    steps: u64,
}

impl<T: TraceOps, W: Write> TraceController<T, W> {
    pub fn new(ops: T, out: W, process: TracedProcess) -> Self {
        Self {
            ops,
            out,
            process,
            last_status: None,
            steps: 0,
        }
    }

    /// Run the trace loop to a terminal state, then report and detach.
    ///
    /// Blocks for as long as the tracee runs. Detach is requested exactly once.
    pub fn run(mut self) -> Trace {
        let pid = self.pid();

        self.set_state(State::WaitingInitialStop);

        let state = match self.ops.wait(pid) {
            Ok(status) => {
                self.last_status = Some(status);
                self.report_status(status);
                decode(status).into()
            },
            Err(err) => {
                warn!(%err, "could not wait for initial stop");
                State::WaitFailed
            },
        };
        self.set_state(state);

        while let State::Stopped { .. } = self.process.state {
            let next = self.step();
            self.set_state(next);
        }

        self.finish()
    }

    fn pid(&self) -> Pid {
        self.process.pid()
    }

    // One iteration of the loop. Only called in the `Stopped` state.
    fn step(&mut self) -> State {
        let pid = self.pid();

        let ip = match self.ops.read_instruction_pointer(pid) {
            Ok(ip) => ip,
            Err(err) => {
                warn!(tracee_died = err.tracee_died(), "register read failed, ending trace");
                self.emit(format_args!("{}", err));
                return State::InspectFailed;
            },
        };

        self.steps += 1;
        trace!(pid = pid.as_raw(), %ip, steps = self.steps, "stepping");
        self.emit(format_args!("EIP: {}", ip));

        let pending = self.process.state.pending_signal();
        if let Some(signal) = pending {
            debug!(pid = pid.as_raw(), %signal, "delivering signal on step");
        }

        if let Err(err) = self.ops.step(pid, pending) {
            warn!(%err, "single-step failed, ending trace");
            return State::StepFailed;
        }

        match self.ops.wait(pid) {
            Ok(status) => {
                self.last_status = Some(status);
                decode(status).into()
            },
            Err(err) => {
                warn!(%err, "wait after single-step failed, ending trace");
                State::StepFailed
            },
        }
    }

    fn finish(mut self) -> Trace {
        let pid = self.pid();

        if let Some(status) = self.last_status {
            self.report_status(status);
        }

        self.emit(format_args!("Detaching"));

        // Expected to fail with `ESRCH` if the tracee has already been reaped.
        if let Err(err) = self.ops.detach(pid) {
            debug!(%err, "detach failed");
        } else {
            debug!(pid = pid.as_raw(), "detached");
        }

        Trace {
            pid,
            steps: self.steps,
            state: self.process.state,
            last_event: self.last_status.map(decode),
        }
    }

    fn set_state(&mut self, state: State) {
        debug!(pid = self.pid().as_raw(), ?state, "setting tracee state");

        self.process.state = state;
    }

    fn report_status(&mut self, status: RawStatus) {
        if let Err(err) = status.report(&mut self.out) {
            debug!(%err, "could not write wait status");
        }
    }

    fn emit(&mut self, line: fmt::Arguments) {
        if let Err(err) = writeln!(self.out, "{}", line) {
            debug!(%err, "could not write diagnostic line");
        }
    }
}
