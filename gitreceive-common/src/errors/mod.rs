//! Error catalog and the gateway's single fatal error type.
//!
//! Nothing is recovered locally: every [`GatewayError`] terminates the current
//! process. The SSH session (or git, for the hook) reports the failure to the
//! client.

pub mod catalog;

pub use catalog::{ErrorCategory, ErrorCode, ErrorEntry};

use crate::command::CommandError;
use crate::config::ConfigError;
use crate::context::ContextError;
use crate::process::ProcessError;
use crate::types::{KeyError, RefUpdateError};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal gateway error, tagged with its catalog code.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Configuration problem or configuration defect.
    #[error("[{code}] {}: {detail}", .code.message())]
    Config { code: ErrorCode, detail: String },

    /// Malformed input from the client, the operator or git.
    #[error("[{code}] {}: {detail}", .code.message())]
    Input { code: ErrorCode, detail: String },

    /// External tool ran but reported failure.
    #[error("[{code}] {} for {subject}: {program} exited with {exit_code}", .code.message())]
    Tool {
        code: ErrorCode,
        program: String,
        subject: String,
        exit_code: i32,
        output: String,
    },

    /// External tool could not be started at all.
    #[error("[{code}] {} for {subject}: {source}", .code.message())]
    Spawn {
        code: ErrorCode,
        subject: String,
        #[source]
        source: ProcessError,
    },

    /// Filesystem operation failed.
    #[error("[{code}] {} {}: {source}", .code.message(), .path.display())]
    Filesystem {
        code: ErrorCode,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl GatewayError {
    pub fn input(code: ErrorCode, detail: impl Into<String>) -> Self {
        Self::Input {
            code,
            detail: detail.into(),
        }
    }

    pub fn config(code: ErrorCode, detail: impl Into<String>) -> Self {
        Self::Config {
            code,
            detail: detail.into(),
        }
    }

    pub fn fs(code: ErrorCode, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Filesystem {
            code,
            path: path.into(),
            source,
        }
    }

    pub fn spawn(code: ErrorCode, subject: impl Into<String>, source: ProcessError) -> Self {
        Self::Spawn {
            code,
            subject: subject.into(),
            source,
        }
    }

    /// Catalog code of this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Config { code, .. }
            | Self::Input { code, .. }
            | Self::Tool { code, .. }
            | Self::Spawn { code, .. }
            | Self::Filesystem { code, .. } => *code,
        }
    }

    /// Captured output of a failed tool, if any.
    pub fn tool_output(&self) -> Option<&str> {
        match self {
            Self::Tool { output, .. } if !output.trim().is_empty() => Some(output),
            _ => None,
        }
    }

    /// Process exit code for this failure.
    ///
    /// Tool failures mirror the tool's own code, start failures use the
    /// fallback code, everything else exits 1.
    pub fn exit_code(&self, fallback: i32) -> i32 {
        match self {
            Self::Tool { exit_code, .. } if *exit_code != 0 => *exit_code,
            Self::Spawn { .. } => fallback,
            _ => 1,
        }
    }
}

impl From<CommandError> for GatewayError {
    fn from(err: CommandError) -> Self {
        let code = match &err {
            CommandError::Missing => ErrorCode::ForcedCommandMissing,
            CommandError::InvalidRepo { .. } => ErrorCode::RepoPathInvalid,
            _ => ErrorCode::ForcedCommandInvalid,
        };
        Self::input(code, err.to_string())
    }
}

impl From<ContextError> for GatewayError {
    fn from(err: ContextError) -> Self {
        Self::config(ErrorCode::ContextIncomplete, err.to_string())
    }
}

impl From<KeyError> for GatewayError {
    fn from(err: KeyError) -> Self {
        let code = match &err {
            KeyError::InvalidIdentity { .. } => ErrorCode::IdentityInvalid,
            KeyError::InvalidFingerprint { .. } => ErrorCode::FingerprintInvalid,
            _ => ErrorCode::KeyInputInvalid,
        };
        Self::input(code, err.to_string())
    }
}

impl From<RefUpdateError> for GatewayError {
    fn from(err: RefUpdateError) -> Self {
        Self::input(ErrorCode::RefUpdateInvalid, err.to_string())
    }
}

impl From<ConfigError> for GatewayError {
    fn from(err: ConfigError) -> Self {
        let code = match &err {
            ConfigError::Read { .. } => ErrorCode::ConfigReadError,
            ConfigError::Parse { .. } => ErrorCode::ConfigParseError,
            ConfigError::Env(_) => ErrorCode::ConfigEnvError,
        };
        Self::config(code, err.to_string())
    }
}
