use anyhow::Result;
use ntest::timeout;
use pretty_assertions::assert_eq;
use singlestep::cmd::EXEC_FAILED_STATUS;
use singlestep::{Command, LaunchError, State, WaitEvent};

mod support;
use support::*;

#[test]
#[timeout(2000)]
fn test_nonexistent_exe() -> Result<()> {
    let process = launch(&["/nonexistent/singlestep/target"])?;
    let (trace, out) = trace(process);

    // The child exits before reaching any ptrace-stop.
    assert_eq!(trace.steps, 0);
    assert_eq!(out.ips, 0);
    assert_eq!(trace.state, State::Exited { exit_code: EXEC_FAILED_STATUS });
    assert_eq!(trace.last_event, Some(WaitEvent::Exited { exit_code: 127 }));

    assert_eq!(out.lines, vec![
        "Child exited: 127".to_owned(),
        "Child exited: 127".to_owned(),
        "Detaching".to_owned(),
    ]);

    Ok(())
}

#[test]
#[timeout(2000)]
fn test_non_executable_exe() -> Result<()> {
    let process = launch(&["/etc/passwd"])?;
    let (trace, _) = trace(process);

    assert_eq!(trace.state, State::Exited { exit_code: EXEC_FAILED_STATUS });

    Ok(())
}

#[test]
fn test_empty_argv() {
    let argv: Vec<&str> = vec![];
    let err = Command::new(argv, Vec::<&str>::new()).unwrap_err();

    assert!(matches!(err, LaunchError::EmptyArgv));
}
