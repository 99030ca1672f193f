// crates/fault-endpoint-server/src/termination.rs
// ============================================================================
// Module: Process Termination
// Description: The "terminate now" primitive behind the fault route.
// Purpose: End the process without unwinding, flushing, or closing sockets.
// Dependencies: fault-endpoint-config, libc, nix
// ============================================================================

//! ## Overview
//! [`terminate`] never returns. It does not log, does not flush stdio, and
//! does not run destructors or atexit handlers; the kernel reclaims the
//! listener and any open connections, so peers observe a reset or EOF with
//! no HTTP status line. Callers must not wrap it in recovery logic.

// ============================================================================
// SECTION: Imports
// ============================================================================

use fault_endpoint_config::FaultConfig;
use fault_endpoint_config::TerminationMode;

// ============================================================================
// SECTION: Termination
// ============================================================================

/// Ends the current process according to `policy`.
pub fn terminate(policy: &FaultConfig) -> ! {
    match policy.mode {
        TerminationMode::Exit => exit_immediately(policy.exit_code),
        TerminationMode::Abort => std::process::abort(),
        TerminationMode::Kill => kill_self(),
    }
}

/// `_exit(2)`: skips atexit handlers and the stdout flush done by `std::process::exit`.
#[cfg(unix)]
#[allow(unsafe_code, reason = "_exit(2) has no safe binding.")]
fn exit_immediately(code: i32) -> ! {
    // SAFETY: `_exit` only takes an integer status and never returns; no Rust
    // state is observed after the call.
    unsafe { libc::_exit(code) }
}

/// Abort stands in for `_exit` where it is unavailable.
#[cfg(not(unix))]
fn exit_immediately(_code: i32) -> ! {
    std::process::abort()
}

/// Delivers `SIGKILL` to this process.
#[cfg(unix)]
fn kill_self() -> ! {
    let _ = nix::sys::signal::raise(nix::sys::signal::Signal::SIGKILL);
    // Only reached if the signal could not be raised.
    std::process::abort()
}

/// Abort stands in for `SIGKILL` where signals are unavailable.
#[cfg(not(unix))]
fn kill_self() -> ! {
    std::process::abort()
}
