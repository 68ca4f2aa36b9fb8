use anyhow::Result;
use ntest::timeout;
use pretty_assertions::assert_eq;
use singlestep::{State, WaitEvent};

mod support;
use support::*;

#[test]
#[timeout(120000)]
fn test_trace_true() -> Result<()> {
    let process = launch(&["/bin/true"])?;
    let (trace, out) = trace(process);

    eprintln!("traced {} instructions", trace.steps);

    assert_eq!(trace.state, State::Exited { exit_code: 0 });
    assert_eq!(trace.last_event, Some(WaitEvent::Exited { exit_code: 0 }));
    assert!(trace.steps > 0);
    assert_eq!(out.ips, trace.steps);

    assert_eq!(out.lines, vec![
        "Child stopped: 5".to_owned(),
        "Child exited: 0".to_owned(),
        "Detaching".to_owned(),
    ]);

    Ok(())
}

#[test]
#[timeout(120000)]
fn test_trace_false() -> Result<()> {
    let process = launch(&["/bin/false"])?;
    let (trace, out) = trace(process);

    assert_eq!(trace.state, State::Exited { exit_code: 1 });
    assert_eq!(out.lines.last().map(String::as_str), Some("Detaching"));
    assert!(out.lines.contains(&"Child exited: 1".to_owned()));

    Ok(())
}
