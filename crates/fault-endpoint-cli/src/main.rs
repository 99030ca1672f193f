// crates/fault-endpoint-cli/src/main.rs
// ============================================================================
// Module: Fault Endpoint CLI Entry Point
// Description: Command dispatcher for the fault injection endpoint.
// Purpose: Load configuration, bind, and serve until killed or signalled.
// Dependencies: clap, fault-endpoint-config, fault-endpoint-server, thiserror, tokio.
// ============================================================================

//! ## Overview
//! Running `fault-endpoint` with no arguments listens on `0.0.0.0:8080` and
//! dies on the first request to `/`. Flags and the config file only move the
//! listener or change how the process dies. Startup failures, including a
//! taken address, are reported once on stderr and exit with status 1; they
//! are never retried.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use fault_endpoint_config::FaultEndpointConfig;
use fault_endpoint_server::FaultServer;
use fault_endpoint_server::build_audit_sink;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "fault-endpoint", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Serve options used when no subcommand is given.
    #[command(flatten)]
    serve: ServeCommand,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the fault endpoint (the default).
    Serve(ServeCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Options for the `serve` command.
#[derive(Args, Debug, Clone, Default)]
struct ServeCommand {
    /// Config file path (defaults to `FAULT_ENDPOINT_CONFIG`, then `fault-endpoint.toml`).
    #[arg(id = "config_path", long = "config", value_name = "PATH")]
    config: Option<PathBuf>,
    /// Listen address; overrides the config file and `PORT`.
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate a config file without binding.
    Validate(ServeCommand),
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a message.
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();

    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&format!("fault-endpoint {version}"))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    match cli.command {
        None => command_serve(cli.serve).await,
        Some(Commands::Serve(command)) => command_serve(command).await,
        Some(Commands::Config {
            command,
        }) => command_config(command),
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let config = resolve_config(&command)?;
    let audit = build_audit_sink(&config.audit)
        .map_err(|err| CliError::new(format!("startup failed: {err}")))?;
    let server = FaultServer::bind(config, audit)
        .await
        .map_err(|err| CliError::new(format!("startup failed: {err}")))?;
    server
        .serve_with_shutdown(shutdown_signal())
        .await
        .map_err(|err| CliError::new(format!("serve failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

/// Loads configuration and applies the `--bind` flag, or `PORT` when the flag is absent.
fn resolve_config(command: &ServeCommand) -> CliResult<FaultEndpointConfig> {
    let mut config = FaultEndpointConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("config load failed: {err}")))?;
    match &command.bind {
        Some(bind) => config.server.bind.clone_from(bind),
        None => config
            .apply_port_env()
            .map_err(|err| CliError::new(format!("config load failed: {err}")))?,
    }
    config.validate().map_err(|err| CliError::new(format!("config load failed: {err}")))?;
    Ok(config)
}

/// Resolves when the operator asks the server to stop (Ctrl-C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate(command) => command_config_validate(&command),
    }
}

/// Validates the resolved configuration and prints the effective listener.
fn command_config_validate(command: &ServeCommand) -> CliResult<ExitCode> {
    let config = resolve_config(command)?;
    let addr =
        FaultServer::resolve_addr(&config.server).map_err(|err| CliError::new(err.to_string()))?;
    let summary = format!(
        "config ok: bind={addr} fault_route={} mode={}",
        config.server.fault_route,
        config.fault.mode.as_str()
    );
    write_stdout_line(&summary).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Reports an error on stderr and returns the failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(&format!("fault-endpoint: {message}"));
    ExitCode::FAILURE
}
