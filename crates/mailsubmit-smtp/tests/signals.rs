//! Signal dispositions around a submission.
//!
//! Signals target the whole process, so each case re-runs this test binary
//! as a child process and inspects how the child ended.

#![cfg(unix)]
#![allow(clippy::unwrap_used)]

use std::os::unix::process::ExitStatusExt;
use std::process::{Command, ExitStatus};
use std::time::Duration;

use mailsubmit_smtp::SignalGuard;
use signal_hook::consts::SIGTERM;

/// Set in the environment of child processes.
const CHILD_ENV: &str = "MAILSUBMIT_SIGNAL_CHILD";

fn run_child(name: &str) -> ExitStatus {
    Command::new(std::env::current_exe().unwrap())
        .args(["--exact", name, "--ignored", "--test-threads=1"])
        .env(CHILD_ENV, "1")
        .status()
        .unwrap()
}

fn is_child() -> bool {
    std::env::var_os(CHILD_ENV).is_some()
}

#[test]
fn test_sigterm_terminates_once_guard_is_dropped() {
    let status = run_child("child_sigterm_after_guard");
    assert_eq!(status.signal(), Some(SIGTERM), "{status:?}");
}

#[test]
fn test_sigterm_only_interrupts_while_guarded() {
    let status = run_child("child_sigterm_under_guard");
    assert!(status.success(), "{status:?}");
}

#[tokio::test]
#[ignore = "run as a child process"]
async fn child_sigterm_after_guard() {
    if !is_child() {
        return;
    }
    drop(SignalGuard::install().unwrap());

    signal_hook::low_level::raise(SIGTERM).unwrap();
    // Surviving this long means SIGTERM was swallowed.
    tokio::time::sleep(Duration::from_secs(5)).await;
}

#[tokio::test]
#[ignore = "run as a child process"]
async fn child_sigterm_under_guard() {
    if !is_child() {
        return;
    }
    let guard = SignalGuard::install().unwrap();
    let mut interrupt = guard.interrupt();

    signal_hook::low_level::raise(SIGTERM).unwrap();
    tokio::time::timeout(Duration::from_secs(5), interrupt.raised())
        .await
        .unwrap();
    assert!(interrupt.is_raised());
}
