// crates/fault-endpoint-server/src/audit.rs
// ============================================================================
// Module: Endpoint Audit Logging
// Description: Structured audit events for listener and request handling.
// Purpose: Emit JSON-line logs without hard dependencies on a log pipeline.
// Dependencies: fault-endpoint-config, serde, serde_json
// ============================================================================

//! ## Overview
//! Audit events are serialized as one JSON object per line. Sinks write to
//! stderr, to an append-only file, or nowhere. The fault route records no
//! event: the process must die before any write could complete.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use fault_endpoint_config::AuditConfig;
use serde::Serialize;

use crate::server::ServerError;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Endpoint audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Listener address for lifecycle events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    /// HTTP method for request events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Request path for request events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Peer IP address when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer_ip: Option<String>,
    /// Response status for request events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

/// Inputs required to construct a request audit event.
pub struct RequestAuditParams {
    /// HTTP method.
    pub method: String,
    /// Request path.
    pub path: String,
    /// Peer IP address if known.
    pub peer_ip: Option<String>,
    /// Response status.
    pub status: u16,
}

impl EndpointAuditEvent {
    /// Listener is bound and about to accept connections.
    #[must_use]
    pub fn listening(bind: SocketAddr) -> Self {
        Self::lifecycle("server_listening", bind)
    }

    /// Listener stopped after an operator shutdown signal.
    #[must_use]
    pub fn stopped(bind: SocketAddr) -> Self {
        Self::lifecycle("server_stopped", bind)
    }

    /// Health route answered.
    #[must_use]
    pub fn health_check(params: RequestAuditParams) -> Self {
        Self::request("health_check", params)
    }

    /// Request fell through to the not-found fallback.
    #[must_use]
    pub fn not_found(params: RequestAuditParams) -> Self {
        Self::request("request_not_found", params)
    }

    /// Builds a lifecycle event for the given listener address.
    fn lifecycle(event: &'static str, bind: SocketAddr) -> Self {
        Self {
            event,
            timestamp_ms: now_ms(),
            bind: Some(bind.to_string()),
            method: None,
            path: None,
            peer_ip: None,
            status: None,
        }
    }

    /// Builds a request event from handler inputs.
    fn request(event: &'static str, params: RequestAuditParams) -> Self {
        Self {
            event,
            timestamp_ms: now_ms(),
            bind: None,
            method: Some(params.method),
            path: Some(params.path),
            peer_ip: params.peer_ip,
            status: Some(params.status),
        }
    }
}

/// Milliseconds since the Unix epoch.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for endpoint events.
pub trait EndpointAuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: &EndpointAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl EndpointAuditSink for StderrAuditSink {
    fn record(&self, event: &EndpointAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl EndpointAuditSink for FileAuditSink {
    fn record(&self, event: &EndpointAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl EndpointAuditSink for NoopAuditSink {
    fn record(&self, _event: &EndpointAuditEvent) {}
}

/// Builds the audit sink selected by configuration.
///
/// # Errors
///
/// Returns [`ServerError::Audit`] when the audit file cannot be opened.
pub fn build_audit_sink(config: &AuditConfig) -> Result<Arc<dyn EndpointAuditSink>, ServerError> {
    if !config.enabled {
        return Ok(Arc::new(NoopAuditSink));
    }
    match &config.path {
        Some(path) => {
            let sink = FileAuditSink::new(path)
                .map_err(|err| ServerError::Audit(format!("{}: {err}", path.display())))?;
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(StderrAuditSink)),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        reason = "Test-only assertions."
    )]

    use std::net::SocketAddr;

    use fault_endpoint_config::AuditConfig;
    use serde_json::Value;

    use super::EndpointAuditEvent;
    use super::RequestAuditParams;
    use super::build_audit_sink;

    fn not_found_event() -> EndpointAuditEvent {
        EndpointAuditEvent::not_found(RequestAuditParams {
            method: "GET".to_string(),
            path: "/healthz".to_string(),
            peer_ip: Some("127.0.0.1".to_string()),
            status: 404,
        })
    }

    #[test]
    fn request_event_omits_bind() {
        let value = serde_json::to_value(not_found_event()).expect("serialize");
        assert_eq!(value["event"], "request_not_found");
        assert_eq!(value["path"], "/healthz");
        assert_eq!(value["status"], 404);
        assert!(value.get("bind").is_none());
    }

    #[test]
    fn lifecycle_event_carries_bind_only() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().expect("addr");
        let value = serde_json::to_value(EndpointAuditEvent::listening(addr)).expect("serialize");
        assert_eq!(value["event"], "server_listening");
        assert_eq!(value["bind"], "127.0.0.1:8080");
        assert!(value.get("method").is_none());
        assert!(value.get("status").is_none());
    }

    #[test]
    fn file_sink_appends_json_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("audit.jsonl");
        let config = AuditConfig {
            enabled: true,
            path: Some(path.clone()),
        };
        let sink = build_audit_sink(&config).expect("sink");
        sink.record(&not_found_event());
        sink.record(&not_found_event());

        let contents = std::fs::read_to_string(&path).expect("read audit log");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let value: Value = serde_json::from_str(line).expect("json line");
            assert_eq!(value["event"], "request_not_found");
        }
    }

    #[test]
    fn disabled_audit_writes_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("audit.jsonl");
        let config = AuditConfig {
            enabled: false,
            path: Some(path.clone()),
        };
        let sink = build_audit_sink(&config).expect("sink");
        sink.record(&not_found_event());
        assert!(!path.exists());
    }

    #[test]
    fn unopenable_audit_path_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = AuditConfig {
            enabled: true,
            path: Some(dir.path().join("missing-dir").join("audit.jsonl")),
        };
        let err = build_audit_sink(&config).err().expect("error");
        assert!(err.to_string().contains("audit error"));
    }
}
