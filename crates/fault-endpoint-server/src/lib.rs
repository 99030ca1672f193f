// crates/fault-endpoint-server/src/lib.rs
// ============================================================================
// Module: Fault Endpoint Server
// Description: HTTP listener whose fault route kills its own process.
// Purpose: Simulate an abrupt backend crash behind a proxy or load balancer.
// Dependencies: fault-endpoint-config, axum, tokio, nix
// ============================================================================

//! ## Overview
//! The fault endpoint binds one HTTP listener and exposes one route. Any
//! request on that route ends the process on the spot: no response bytes, no
//! socket shutdown, no cleanup. The fronting proxy sees a dropped connection
//! and synthesizes whatever status it uses for a dead upstream (typically
//! `502 Bad Gateway`). Every other path answers `404 Not Found`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod server;
pub mod termination;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::EndpointAuditEvent;
pub use audit::EndpointAuditSink;
pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use audit::build_audit_sink;
pub use server::FaultServer;
pub use server::ServerError;
pub use termination::terminate;
