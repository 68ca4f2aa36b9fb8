use std::env;
use std::ffi::OsString;
use std::io;
use std::process::ExitCode;

use tracing::info;
use tracing_subscriber::EnvFilter;

use singlestep::{Command, Ptracer, TraceController};

/// Exit status for usage and launch failures, matching `exit(-1)`.
const FAILURE: u8 = 255;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_env_var("SINGLESTEP_LOG")
                .from_env_lossy(),
        )
        .with_writer(io::stderr)
        .init();

    let args: Vec<OsString> = env::args_os().collect();

    if args.len() < 2 {
        let name = args
            .first()
            .map(|arg0| arg0.to_string_lossy().into_owned())
            .unwrap_or_else(|| "tracer".into());
        eprintln!("Usage: {} elffile arg0 arg1 ...", name);

        return ExitCode::from(FAILURE);
    }

    // `argv[1]` is both the exe path and the tracee's `argv[0]`.
    let cmd = match Command::from_args(args.into_iter().skip(1)) {
        Ok(cmd) => cmd,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::from(FAILURE);
        },
    };

    let process = match cmd.fork_exec() {
        Ok(process) => process,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::from(FAILURE);
        },
    };

    let trace = TraceController::new(Ptracer::new(), io::stderr(), process).run();

    info!(
        pid = trace.pid.as_raw(),
        steps = trace.steps,
        state = ?trace.state,
        "trace finished"
    );

    ExitCode::SUCCESS
}
