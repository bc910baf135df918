//! gitreceive - SSH forced-command push gateway
//!
//! Installed as the forced command for every enrolled key. A push is
//! dispatched to git with the pusher's identity in the environment, and the
//! generated pre-receive hook streams the pushed tree to a receiver
//! executable.

#![forbid(unsafe_code)]

mod dispatch;
mod keys;
mod provision;
mod relay;
mod tools;

use clap::{Parser, Subcommand};
use gitreceive_common::{
    ErrorCode, GatewayConfig, GatewayError, LogConfig, ProcessRunner, SSH_ORIGINAL_COMMAND_ENV,
    init_logging,
};
use std::io;
use std::path::PathBuf;
use tracing::error;

#[derive(Parser)]
#[command(name = "gitreceive")]
#[command(author, version, about = "SSH push gateway that hands pushed trees to a receiver")]
#[command(arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write logs to this file (overrides GITRECEIVE_LOG_FILE)
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the service account and its key store (run as root)
    Init,

    /// Enroll a public key read from stdin
    UploadKey {
        /// Name recorded for pushes made with this key
        identity: String,
    },

    /// Forced command: serve the git request in SSH_ORIGINAL_COMMAND
    Run {
        identity: String,
        fingerprint: String,
    },

    /// Pre-receive hook: deliver tracked-ref updates read from stdin
    Hook,
}

fn main() {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env("warn").with_stderr();
    if cli.verbose {
        log_config = log_config.with_level("debug");
    }
    if let Some(path) = cli.log_file {
        log_config = log_config.with_file(path);
    }
    let logging_guards = match init_logging(&log_config) {
        Ok(guards) => Some(guards),
        Err(e) => {
            eprintln!("warning: logging disabled: {e:#}");
            None
        }
    };

    let code = match execute(cli.command) {
        Ok(code) => code,
        Err((err, fallback)) => {
            report(&err, cli.verbose);
            err.exit_code(fallback)
        }
    };

    // Flush file logging before exiting.
    drop(logging_guards);
    std::process::exit(code);
}

/// Run one subcommand. Errors carry the fallback exit code in effect.
fn execute(command: Commands) -> Result<i32, (GatewayError, i32)> {
    let config = GatewayConfig::load()
        .map_err(|e| (GatewayError::from(e), gitreceive_common::FALLBACK_EXIT_CODE))?;
    let runner = ProcessRunner::new(config.fallback_exit_code);
    let fallback = runner.fallback_exit_code();

    let result = match command {
        Commands::Init => provision::init(&config, &runner, io::stdout().lock()),
        Commands::UploadKey { identity } => gateway_path().and_then(|path| {
            let path = path_str(&path)?.to_string();
            keys::enroll(
                &config,
                &runner,
                &identity,
                &path,
                io::stdin().lock(),
                io::stdout().lock(),
            )
            .map(|_| 0)
        }),
        Commands::Run {
            identity,
            fingerprint,
        } => gateway_path().and_then(|path| {
            let original = std::env::var(SSH_ORIGINAL_COMMAND_ENV).ok();
            dispatch::run(
                &config,
                &runner,
                &identity,
                &fingerprint,
                &path,
                original.as_deref(),
            )
        }),
        Commands::Hook => relay::run(&config, &runner),
    };

    result.map_err(|e| (e, fallback))
}

/// Absolute path of this executable, embedded in key entries and hooks.
fn gateway_path() -> Result<PathBuf, GatewayError> {
    std::env::current_exe().map_err(|e| {
        GatewayError::config(
            ErrorCode::GatewayPathUnknown,
            format!("cannot resolve current executable: {e}"),
        )
    })
}

fn path_str(path: &std::path::Path) -> Result<&str, GatewayError> {
    path.to_str().ok_or_else(|| {
        GatewayError::config(
            ErrorCode::GatewayPathUnknown,
            format!("executable path is not valid UTF-8: {}", path.display()),
        )
    })
}

/// Diagnostics go to stdout, which sshd relays to the pushing client.
/// `verbose` adds the catalog's remediation steps.
fn report(err: &GatewayError, verbose: bool) {
    println!("{err}");
    if let Some(output) = err.tool_output() {
        print!("{output}");
        if !output.ends_with('\n') {
            println!();
        }
    }
    if verbose {
        print!("{}", err.code().entry().format_full());
    }
    error!(code = %err.code(), "{err}");
}
