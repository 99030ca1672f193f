// crates/fault-endpoint-server/tests/termination_modes.rs
// ============================================================================
// Module: Termination Mode Tests
// Description: Re-exec this test binary and terminate the child process.
// Purpose: Prove each mode ends the process without flushing pending output.
// Dependencies: fault-endpoint-server, fault-endpoint-config, nix
// ============================================================================
//! ## Overview
//! `terminate` cannot run in the test process itself. Each test re-executes
//! this binary filtered to `terminating_child`, which only acts when
//! `CHILD_MODE_ENV` is set. The child leaves a partial line in the stdout
//! buffer before terminating; a clean `exit` would flush it, `_exit` must not.

#![cfg(unix)]
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only assertions."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::io::Write;
use std::os::unix::process::ExitStatusExt;
use std::process::Command;
use std::process::Output;

use fault_endpoint_config::FaultConfig;
use fault_endpoint_config::TerminationMode;
use fault_endpoint_server::terminate;
use nix::sys::signal::Signal;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Selects the termination mode for the re-executed child.
const CHILD_MODE_ENV: &str = "FAULT_ENDPOINT_TERMINATION_CHILD_MODE";
/// Written with a newline, so line buffering flushes it immediately.
const FLUSHED_LINE: &str = "child-flushed-line";
/// Written without a newline, so it stays in the stdout buffer.
const PENDING_TEXT: &str = "child-pending-text";
/// Exit code configured for the child in `exit` mode.
const CHILD_EXIT_CODE: i32 = 42;

fn run_child(mode: &str) -> Output {
    let exe = env::current_exe().expect("current test binary");
    Command::new(exe)
        .args(["--exact", "terminating_child", "--nocapture", "--test-threads=1"])
        .env(CHILD_MODE_ENV, mode)
        .output()
        .expect("run child")
}

fn assert_pending_output_dropped(output: &Output) {
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(FLUSHED_LINE), "child never ran: {stdout}");
    assert!(!stdout.contains(PENDING_TEXT), "buffered stdout was flushed: {stdout}");
}

// ============================================================================
// SECTION: Child Entry
// ============================================================================

/// Terminates the current process when re-executed as a child; no-op otherwise.
#[test]
fn terminating_child() {
    let Ok(mode) = env::var(CHILD_MODE_ENV) else {
        return;
    };
    let mode = match mode.as_str() {
        "exit" => TerminationMode::Exit,
        "abort" => TerminationMode::Abort,
        "kill" => TerminationMode::Kill,
        other => panic!("unknown mode: {other}"),
    };
    let mut stdout = std::io::stdout();
    stdout.write_all(format!("{FLUSHED_LINE}\n").as_bytes()).expect("write flushed line");
    stdout.write_all(PENDING_TEXT.as_bytes()).expect("write pending text");
    terminate(&FaultConfig {
        mode,
        exit_code: CHILD_EXIT_CODE,
    });
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn exit_mode_uses_configured_code_without_flushing_stdout() {
    let output = run_child("exit");
    assert_eq!(output.status.code(), Some(CHILD_EXIT_CODE));
    assert_pending_output_dropped(&output);
}

#[test]
fn abort_mode_ends_with_sigabrt() {
    let output = run_child("abort");
    assert_eq!(output.status.code(), None);
    assert_eq!(output.status.signal(), Some(Signal::SIGABRT as i32));
    assert_pending_output_dropped(&output);
}

#[test]
fn kill_mode_ends_with_sigkill() {
    let output = run_child("kill");
    assert_eq!(output.status.code(), None);
    assert_eq!(output.status.signal(), Some(Signal::SIGKILL as i32));
    assert_pending_output_dropped(&output);
}

