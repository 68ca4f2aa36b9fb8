use std::ffi::OsString;
use std::io::{self, Write};

use singlestep::{Command, Ptracer, Trace, TraceController, TracedProcess};

/// Diagnostic sink that keeps the non-`EIP` lines, and counts the `EIP` lines.
///
/// Single-stepping even a trivial program reports a very large number of
/// instruction pointers, so we don't buffer them.
#[derive(Default)]
pub struct Diagnostics {
    pub ips: u64,
    pub lines: Vec<String>,
    partial: Vec<u8>,
}

impl Write for Diagnostics {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for &byte in buf {
            if byte != b'\n' {
                self.partial.push(byte);
                continue;
            }

            let line = String::from_utf8_lossy(&self.partial).into_owned();
            self.partial.clear();

            if line.starts_with("EIP: 0x") {
                self.ips += 1;
            } else {
                self.lines.push(line);
            }
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn launch(argv: &[&str]) -> anyhow::Result<TracedProcess> {
    let args = argv.iter().map(|arg| OsString::from(*arg));
    let process = Command::from_args(args)?.fork_exec()?;

    Ok(process)
}

pub fn trace(process: TracedProcess) -> (Trace, Diagnostics) {
    let mut out = Diagnostics::default();
    let trace = TraceController::new(Ptracer::new(), &mut out, process).run();

    (trace, out)
}
