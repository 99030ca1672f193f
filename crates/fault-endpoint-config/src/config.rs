// crates/fault-endpoint-config/src/config.rs
// ============================================================================
// Module: Fault Endpoint Configuration
// Description: Configuration loading and validation for the fault endpoint.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: serde, thiserror, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! An explicitly named file (CLI argument or `FAULT_ENDPOINT_CONFIG`) must
//! exist; the default `fault-endpoint.toml` is optional and its absence yields
//! the built-in defaults. Invalid configuration fails closed before any socket
//! is bound.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "fault-endpoint.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "FAULT_ENDPOINT_CONFIG";
/// Environment variable carrying the listen port on container platforms.
pub const PORT_ENV_VAR: &str = "PORT";
/// Default listen address.
pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
/// Default route whose requests terminate the process.
pub const DEFAULT_FAULT_ROUTE: &str = "/";
/// Default process exit code used by [`TerminationMode::Exit`].
pub const DEFAULT_EXIT_CODE: i32 = 1;
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum length of a configured route.
pub(crate) const MAX_ROUTE_LENGTH: usize = 1024;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Fault endpoint configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FaultEndpointConfig {
    /// Listener and routing configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Process termination behavior for the fault route.
    #[serde(default)]
    pub fault: FaultConfig,
    /// Structured audit logging configuration.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl FaultEndpointConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, parsed, or
    /// validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (resolved, required) = resolve_path(path)?;
        validate_path(&resolved)?;
        if !required && !resolved.exists() {
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }
        let bytes = fs::read(&resolved)
            .map_err(|err| ConfigError::Io(format!("{}: {err}", resolved.display())))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Applies the `PORT` environment variable to the bind address.
    ///
    /// An unset or empty `PORT` leaves the configuration untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when `PORT` is not a valid port.
    pub fn apply_port_env(&mut self) -> Result<(), ConfigError> {
        match env::var(PORT_ENV_VAR) {
            Ok(value) => self.apply_port_override(&value),
            Err(env::VarError::NotPresent) => Ok(()),
            Err(env::VarError::NotUnicode(_)) => {
                Err(ConfigError::Invalid(format!("{PORT_ENV_VAR} must be valid unicode")))
            }
        }
    }

    /// Replaces the port of the bind address, keeping the host.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the port or current bind address
    /// is invalid.
    pub fn apply_port_override(&mut self, raw: &str) -> Result<(), ConfigError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(());
        }
        let port: u16 = trimmed.parse().map_err(|_| {
            ConfigError::Invalid(format!("{PORT_ENV_VAR} must be a port number, got '{raw}'"))
        })?;
        let mut addr = self.server.bind_addr()?;
        addr.set_port(port);
        self.server.bind = addr.to_string();
        Ok(())
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.fault.validate()?;
        self.audit.validate()?;
        Ok(())
    }
}

/// Listener and routing configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address to listen on.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Exact path whose requests terminate the process.
    #[serde(default = "default_fault_route")]
    pub fault_route: String,
    /// Optional liveness route answering `200 OK`.
    #[serde(default)]
    pub health_route: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            fault_route: default_fault_route(),
            health_route: None,
        }
    }
}

impl ServerConfig {
    /// Parses the configured bind address.
    ///
    /// Validation does not call this: an unusable address is a startup
    /// failure, reported together with addresses that are already taken.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the address is empty or malformed.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let bind = self.bind.trim();
        if bind.is_empty() {
            return Err(ConfigError::Invalid("server.bind must be non-empty".to_string()));
        }
        bind.parse()
            .map_err(|_| ConfigError::Invalid(format!("invalid server.bind address: {bind}")))
    }

    /// Validates listener and route configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_route("server.fault_route", &self.fault_route)?;
        if let Some(health_route) = &self.health_route {
            validate_route("server.health_route", health_route)?;
            if health_route == &self.fault_route {
                return Err(ConfigError::Invalid(
                    "server.health_route must differ from server.fault_route".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// How the process dies when the fault route is hit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationMode {
    /// Immediate `_exit` with the configured code; skips atexit and flushing.
    #[default]
    Exit,
    /// Process abort.
    Abort,
    /// `SIGKILL` delivered to the process itself.
    Kill,
}

impl TerminationMode {
    /// Returns a stable label for the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exit => "exit",
            Self::Abort => "abort",
            Self::Kill => "kill",
        }
    }
}

/// Process termination configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FaultConfig {
    /// Termination primitive.
    #[serde(default)]
    pub mode: TerminationMode,
    /// Exit status for [`TerminationMode::Exit`].
    #[serde(default = "default_exit_code")]
    pub exit_code: i32,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            mode: TerminationMode::Exit,
            exit_code: default_exit_code(),
        }
    }
}

impl FaultConfig {
    /// Validates the termination policy.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=255).contains(&self.exit_code) {
            return Err(ConfigError::Invalid(
                "fault.exit_code must be between 1 and 255".to_string(),
            ));
        }
        Ok(())
    }
}

/// Structured audit logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Emit audit events at all.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Append events to this file instead of stderr.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            path: None,
        }
    }
}

impl AuditConfig {
    /// Validates audit sink configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("audit.path", &path.to_string_lossy())?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Default for [`ServerConfig::bind`].
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

/// Default for [`ServerConfig::fault_route`].
fn default_fault_route() -> String {
    DEFAULT_FAULT_ROUTE.to_string()
}

/// Default for [`FaultConfig::exit_code`].
const fn default_exit_code() -> i32 {
    DEFAULT_EXIT_CODE
}

/// Default for [`AuditConfig::enabled`].
const fn default_audit_enabled() -> bool {
    true
}

/// Resolves the config path and whether the file must exist.
fn resolve_path(path: Option<&Path>) -> Result<(PathBuf, bool), ConfigError> {
    if let Some(path) = path {
        return Ok((path.to_path_buf(), true));
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok((PathBuf::from(env_path), true));
    }
    Ok((PathBuf::from(DEFAULT_CONFIG_NAME), false))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    let path = Path::new(trimmed);
    for component in path.components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a route as a literal absolute path.
fn validate_route(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if !value.starts_with('/') {
        return Err(ConfigError::Invalid(format!("{field} must start with '/'")));
    }
    if value.len() > MAX_ROUTE_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    if value.chars().any(|ch| ch.is_whitespace() || ch.is_control()) {
        return Err(ConfigError::Invalid(format!("{field} must not contain whitespace")));
    }
    let has_pattern = value.contains(['{', '}', '*', '?', '#'])
        || value.split('/').any(|segment| segment.starts_with(':'));
    if has_pattern {
        return Err(ConfigError::Invalid(format!("{field} must be a literal path")));
    }
    // Routes match the raw request path, so anything a client would
    // percent-encode could never be hit.
    if !value.chars().all(is_route_char) {
        return Err(ConfigError::Invalid(format!(
            "{field} must contain only unreserved ascii path characters"
        )));
    }
    Ok(())
}

/// Characters allowed unescaped in an RFC 3986 path segment, plus `/`.
const fn is_route_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric()
        || matches!(
            ch,
            '/' | '-'
                | '.'
                | '_'
                | '~'
                | '!'
                | '$'
                | '&'
                | '\''
                | '('
                | ')'
                | '+'
                | ','
                | ';'
                | '='
                | ':'
                | '@'
        )
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

    use super::validate_path_string;
    use super::validate_route;

    #[test]
    fn validate_route_accepts_root_and_nested_paths() {
        assert!(validate_route("route", "/").is_ok());
        assert!(validate_route("route", "/crash/now").is_ok());
        assert!(validate_route("route", "/trailing/").is_ok());
    }

    #[test]
    fn validate_route_rejects_relative_path() {
        let err = validate_route("route", "crash").unwrap_err();
        assert!(err.to_string().contains("must start with '/'"));
    }

    #[test]
    fn validate_route_rejects_capture_syntax() {
        for route in ["/{id}", "/files/*rest", "/:id", "/a/:b/c"] {
            let err = validate_route("route", route).unwrap_err();
            assert!(err.to_string().contains("literal path"), "route {route}");
        }
    }

    #[test]
    fn validate_route_rejects_query_and_whitespace() {
        assert!(validate_route("route", "/crash?now=1").is_err());
        assert!(validate_route("route", "/crash now").is_err());
    }

    #[test]
    fn validate_route_rejects_characters_clients_percent_encode() {
        for route in ["/caf\u{e9}", "/caf%C3%A9", "/a\"b", "/<x>", "/a|b", "/a^b", "/a`b", "/a\\b"] {
            let err = validate_route("route", route).unwrap_err();
            assert!(err.to_string().contains("unreserved ascii"), "route {route}");
        }
        assert!(validate_route("route", "/v1/crash-now_~.(x)+y;z=1@host").is_ok());
    }

    #[test]
    fn validate_route_rejects_oversized_route() {
        let route = format!("/{}", "a".repeat(super::MAX_ROUTE_LENGTH));
        let err = validate_route("route", &route).unwrap_err();
        assert!(err.to_string().contains("max length"));
    }

    #[test]
    fn validate_path_string_rejects_whitespace_only() {
        assert!(validate_path_string("audit.path", "   ").is_err());
    }
}
