//! Shared types and utilities for the gitreceive SSH push gateway.
//!
//! The gateway runs in two stages connected only by a generated hook file
//! and a set of environment variables:
//!
//! 1. `gitreceive run` (the forced command) parses [`ForcedCommand`],
//!    prepares the repository and re-executes git with a
//!    [`DeliveryContext`] in its environment.
//! 2. `gitreceive hook` (the pre-receive hook) rebuilds the context and
//!    streams each pushed tree to the receiver.

#![forbid(unsafe_code)]

pub mod command;
pub mod config;
pub mod context;
pub mod errors;
pub mod logging;
pub mod process;
pub mod types;

pub use command::{CommandError, ForcedCommand, GitVerb, RepoPath, SSH_ORIGINAL_COMMAND_ENV};
pub use config::{ConfigError, GatewayConfig};
pub use context::{ContextError, DeliveryContext};
pub use errors::{ErrorCategory, ErrorCode, GatewayError};
pub use logging::{LogConfig, LoggingGuards, init_logging};
pub use process::{Captured, FALLBACK_EXIT_CODE, ProcessError, ProcessRunner};
pub use types::{
    AuthorizedKeyEntry, Fingerprint, IdentityLabel, KeyError, RawPublicKey, RefUpdate,
    RefUpdateError,
};
