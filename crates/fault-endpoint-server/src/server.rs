// crates/fault-endpoint-server/src/server.rs
// ============================================================================
// Module: Fault Server
// Description: Listener startup and routing for the fault endpoint.
// Purpose: Bind once, crash on the fault route, 404 everything else.
// Dependencies: fault-endpoint-config, axum, tokio
// ============================================================================

//! ## Overview
//! [`FaultServer::bind`] performs startup: it validates configuration and
//! claims the listening socket, failing with [`ServerError::Bind`] when the
//! address is malformed or cannot be claimed. [`FaultServer::serve`] then
//! runs the axum router. The fault route accepts any method and calls
//! [`crate::termination::terminate`] before a response exists; nothing is
//! written to the client. Graceful shutdown only applies to operator signals.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::net::AddrParseError;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::ConnectInfo;
use axum::extract::State;
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::Uri;
use axum::routing::any;
use fault_endpoint_config::FaultConfig;
use fault_endpoint_config::FaultEndpointConfig;
use fault_endpoint_config::ServerConfig;
use tokio::net::TcpListener;

use crate::audit::EndpointAuditEvent;
use crate::audit::EndpointAuditSink;
use crate::audit::RequestAuditParams;
use crate::termination;

// ============================================================================
// SECTION: Fault Server
// ============================================================================

/// Bound fault endpoint, ready to serve.
pub struct FaultServer {
    /// Listening socket claimed at startup.
    listener: TcpListener,
    /// Actual bound address (resolves port 0).
    local_addr: SocketAddr,
    /// Route table with shared state applied.
    router: Router,
    /// Audit sink for lifecycle events.
    audit: Arc<dyn EndpointAuditSink>,
}

impl FaultServer {
    /// Validates configuration and binds the listener.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] for invalid configuration and
    /// [`ServerError::Bind`] when the address is malformed or cannot be
    /// claimed.
    pub async fn bind(
        config: FaultEndpointConfig,
        audit: Arc<dyn EndpointAuditSink>,
    ) -> Result<Self, ServerError> {
        config.validate().map_err(|err| ServerError::Config(err.to_string()))?;
        let addr = Self::resolve_addr(&config.server)?;
        let listener = TcpListener::bind(addr).await.map_err(|err| ServerError::Bind {
            addr: addr.to_string(),
            message: err.to_string(),
        })?;
        let local_addr = listener.local_addr().map_err(|err| ServerError::Bind {
            addr: addr.to_string(),
            message: err.to_string(),
        })?;
        let state = Arc::new(ServerState {
            fault: config.fault,
            audit: Arc::clone(&audit),
        });
        let router = build_router(&config.server, state);
        audit.record(&EndpointAuditEvent::listening(local_addr));
        Ok(Self {
            listener,
            local_addr,
            router,
            audit,
        })
    }

    /// Parses the configured listen address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] when the address is empty or malformed.
    pub fn resolve_addr(server: &ServerConfig) -> Result<SocketAddr, ServerError> {
        server.bind.trim().parse().map_err(|err: AddrParseError| ServerError::Bind {
            addr: server.bind.clone(),
            message: err.to_string(),
        })
    }

    /// Returns the bound listener address.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves requests until the process ends.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Serve`] when the accept loop fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Serves requests until `signal` resolves, then drains open connections.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Serve`] when the accept loop fails.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Self {
            listener,
            local_addr,
            router,
            audit,
        } = self;
        axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(signal)
            .await
            .map_err(|err| ServerError::Serve(err.to_string()))?;
        audit.record(&EndpointAuditEvent::stopped(local_addr));
        Ok(())
    }
}

// ============================================================================
// SECTION: Routing
// ============================================================================

/// Shared state for route handlers.
struct ServerState {
    /// Termination policy for the fault route.
    fault: FaultConfig,
    /// Audit sink for request events.
    audit: Arc<dyn EndpointAuditSink>,
}

/// Builds the route table: fault route, optional health route, 404 fallback.
fn build_router(server: &ServerConfig, state: Arc<ServerState>) -> Router {
    let mut router = Router::new().route(&server.fault_route, any(handle_fault));
    if let Some(health_route) = &server.health_route {
        router = router.route(health_route, any(handle_health));
    }
    router.fallback(handle_not_found).with_state(state)
}

/// Terminates the process; no response is ever produced.
async fn handle_fault(State(state): State<Arc<ServerState>>) -> StatusCode {
    termination::terminate(&state.fault)
}

/// Answers the health route.
async fn handle_health(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    method: Method,
    uri: Uri,
) -> (StatusCode, &'static str) {
    let status = StatusCode::OK;
    state.audit.record(&EndpointAuditEvent::health_check(request_params(
        &method, &uri, peer, status,
    )));
    (status, "OK")
}

/// Answers every unrouted request with `404 Not Found`.
async fn handle_not_found(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    method: Method,
    uri: Uri,
) -> StatusCode {
    let status = StatusCode::NOT_FOUND;
    state.audit.record(&EndpointAuditEvent::not_found(request_params(&method, &uri, peer, status)));
    status
}

/// Collects audit fields for a handled request.
fn request_params(
    method: &Method,
    uri: &Uri,
    peer: SocketAddr,
    status: StatusCode,
) -> RequestAuditParams {
    RequestAuditParams {
        method: method.as_str().to_string(),
        path: uri.path().to_string(),
        peer_ip: Some(peer.ip().to_string()),
        status: status.as_u16(),
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Fault server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Listen address is malformed or could not be bound.
    #[error("bind error: {addr}: {message}")]
    Bind {
        /// Requested listen address, as configured.
        addr: String,
        /// OS error text.
        message: String,
    },
    /// Accept loop failures.
    #[error("serve error: {0}")]
    Serve(String),
    /// Audit sink setup failures.
    #[error("audit error: {0}")]
    Audit(String),
}
