// crates/fault-endpoint-config/src/lib.rs
// ============================================================================
// Module: Fault Endpoint Config Library
// Description: Canonical config model and validation for the fault endpoint.
// Purpose: Single source of truth for fault-endpoint.toml semantics.
// Dependencies: serde, thiserror, toml
// ============================================================================

//! ## Overview
//! `fault-endpoint-config` defines the configuration model for the fault
//! injection endpoint: where it listens, which route crashes the process, how
//! the process dies, and where structured audit lines go. Defaults reproduce
//! the bare contract: listen on `0.0.0.0:8080`, crash on `/`, nothing else.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
