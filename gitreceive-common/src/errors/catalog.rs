//! Error Catalog for gitreceive
//!
//! Every fatal condition the gateway can hit maps to one [`ErrorCode`]. Codes
//! are stable so operators can grep push logs for them.
//!
//! # Error Code Ranges
//!
//! | Range      | Category    | Description                              |
//! |------------|-------------|------------------------------------------|
//! | E001-E099  | Config      | Configuration and delivery-context setup |
//! | E100-E199  | Input       | Malformed forced commands, keys, refs    |
//! | E200-E299  | Tool        | External tools that failed or vanished   |
//! | E300-E399  | Filesystem  | Create/open/write/remove failures        |

use std::fmt;

/// Error code enumeration covering all gitreceive failure scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorCode {
    // =========================================================================
    // Config Errors (E001-E099)
    // =========================================================================
    /// Configuration file could not be read
    ConfigReadError,
    /// Configuration file contains invalid TOML
    ConfigParseError,
    /// Environment variable has invalid value
    ConfigEnvError,
    /// Delivery context is missing a required variable
    ContextIncomplete,
    /// Path of the running gateway binary could not be determined
    GatewayPathUnknown,

    // =========================================================================
    // Input Errors (E100-E199)
    // =========================================================================
    /// SSH_ORIGINAL_COMMAND is not set
    ForcedCommandMissing,
    /// SSH_ORIGINAL_COMMAND does not match the accepted grammar
    ForcedCommandInvalid,
    /// Repository argument is not a safe relative path
    RepoPathInvalid,
    /// Identity label contains unsupported characters
    IdentityInvalid,
    /// Public key input is empty, unreadable or multi-line
    KeyInputInvalid,
    /// Fingerprinting tool produced unparseable output
    FingerprintInvalid,
    /// Pre-receive input line is malformed
    RefUpdateInvalid,

    // =========================================================================
    // Tool Errors (E200-E299)
    // =========================================================================
    /// External program could not be started
    ToolSpawnFailed,
    /// ssh-keygen exited non-zero
    FingerprintToolFailed,
    /// git init --bare exited non-zero
    RepoInitFailed,
    /// git archive exited non-zero
    ArchiverFailed,
    /// Receiver exited non-zero
    ReceiverFailed,
    /// Service account provisioning tool exited non-zero
    ProvisionFailed,

    // =========================================================================
    // Filesystem Errors (E300-E399)
    // =========================================================================
    /// Temporary key file could not be created, written or removed
    TempFileError,
    /// authorized_keys could not be opened or appended
    AuthorizedKeysError,
    /// authorized_keys lock could not be acquired
    KeyStoreLockError,
    /// Repository directory could not be created or inspected
    RepoDirError,
    /// pre-receive hook could not be written
    HookWriteError,
    /// Result could not be written to stdout
    OutputError,
}

impl ErrorCode {
    /// Returns the numeric error code (without prefix).
    #[must_use]
    pub const fn code_number(&self) -> u16 {
        match self {
            Self::ConfigReadError => 1,
            Self::ConfigParseError => 2,
            Self::ConfigEnvError => 3,
            Self::ContextIncomplete => 4,
            Self::GatewayPathUnknown => 5,

            Self::ForcedCommandMissing => 100,
            Self::ForcedCommandInvalid => 101,
            Self::RepoPathInvalid => 102,
            Self::IdentityInvalid => 103,
            Self::KeyInputInvalid => 104,
            Self::FingerprintInvalid => 105,
            Self::RefUpdateInvalid => 106,

            Self::ToolSpawnFailed => 200,
            Self::FingerprintToolFailed => 201,
            Self::RepoInitFailed => 202,
            Self::ArchiverFailed => 203,
            Self::ReceiverFailed => 204,
            Self::ProvisionFailed => 205,

            Self::TempFileError => 300,
            Self::AuthorizedKeysError => 301,
            Self::KeyStoreLockError => 302,
            Self::RepoDirError => 303,
            Self::HookWriteError => 304,
            Self::OutputError => 305,
        }
    }

    /// Returns the formatted error code (e.g. "GR-E101").
    #[must_use]
    pub fn code_string(&self) -> String {
        format!("GR-E{:03}", self.code_number())
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self.code_number() {
            1..=99 => ErrorCategory::Config,
            100..=199 => ErrorCategory::Input,
            200..=299 => ErrorCategory::Tool,
            _ => ErrorCategory::Filesystem,
        }
    }

    /// Returns the error message template.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::ConfigReadError => "Failed to read configuration file",
            Self::ConfigParseError => "Configuration file contains invalid TOML",
            Self::ConfigEnvError => "Environment variable has invalid value",
            Self::ContextIncomplete => "Delivery context is incomplete",
            Self::GatewayPathUnknown => "Could not determine the gateway binary path",

            Self::ForcedCommandMissing => "SSH_ORIGINAL_COMMAND is undefined",
            Self::ForcedCommandInvalid => "SSH_ORIGINAL_COMMAND is not an accepted git command",
            Self::RepoPathInvalid => "Repository path is invalid",
            Self::IdentityInvalid => "Identity label is invalid",
            Self::KeyInputInvalid => "Public key input is invalid",
            Self::FingerprintInvalid => "Fingerprint seems invalid",
            Self::RefUpdateInvalid => "Malformed pre-receive input line",

            Self::ToolSpawnFailed => "Failed to start",
            Self::FingerprintToolFailed => "Failed to read key",
            Self::RepoInitFailed => "Failed to initialize repository",
            Self::ArchiverFailed => "Push denied - git archive failed",
            Self::ReceiverFailed => "Push denied - receiver failed to exit cleanly",
            Self::ProvisionFailed => "Failed to provision the service account",

            Self::TempFileError => "Temporary key file error",
            Self::AuthorizedKeysError => "Failed to update authorized_keys",
            Self::KeyStoreLockError => "Failed to lock authorized_keys",
            Self::RepoDirError => "Failed to create repo directory",
            Self::HookWriteError => "Failed to write repo pre-receive hook script",
            Self::OutputError => "Failed to write output",
        }
    }

    /// Returns remediation steps for this error.
    #[must_use]
    pub const fn remediation(&self) -> &'static [&'static str] {
        match self {
            Self::ConfigReadError | Self::ConfigParseError => &[
                "Check GITRECEIVE_CONFIG or /etc/gitreceive/config.toml",
                "Validate the file with a TOML linter",
            ],
            Self::ConfigEnvError => &["Fix or unset the offending GITRECEIVE_* variable"],
            Self::ContextIncomplete => &[
                "The hook must be entered through `gitreceive run`",
                "Do not invoke hooks/pre-receive by hand",
            ],
            Self::GatewayPathUnknown => &["Run gitreceive from a real file path"],
            Self::ForcedCommandMissing => &[
                "Connect through sshd so the forced command sets SSH_ORIGINAL_COMMAND",
            ],
            Self::ForcedCommandInvalid => &[
                "Only git-receive-pack, git-upload-pack and git-upload-archive are accepted",
                "Use a standard git client: git push <host>:<repo>",
            ],
            Self::RepoPathInvalid => &["Repository names must be relative and must not contain '..'"],
            Self::IdentityInvalid => &["Use letters, digits and . _ @ + - in identity labels"],
            Self::KeyInputInvalid => &["Pipe exactly one public key line on stdin"],
            Self::FingerprintInvalid | Self::FingerprintToolFailed => &[
                "Verify the key with: ssh-keygen -lf <key.pub>",
            ],
            Self::RefUpdateInvalid => &["Expected '<old-rev> <new-rev> <ref-name>' per line"],
            Self::ToolSpawnFailed => &["Check that the program exists and is executable by the service account"],
            Self::RepoInitFailed => &["Check that git is installed and the root is writable"],
            Self::ArchiverFailed => &["Check that the pushed revision exists in the repository"],
            Self::ReceiverFailed => &["Inspect the receiver's output above"],
            Self::ProvisionFailed => &["Run `gitreceive init` as root"],
            Self::TempFileError => &["Check TMPDIR permissions and free space"],
            Self::AuthorizedKeysError | Self::KeyStoreLockError => &[
                "Check ownership and permissions of <root>/.ssh/authorized_keys",
            ],
            Self::RepoDirError | Self::HookWriteError => &[
                "Check ownership and permissions of the gitreceive root",
            ],
            Self::OutputError => &["Check that the SSH session is still connected"],
        }
    }

    /// Returns the full error entry with all metadata.
    #[must_use]
    pub fn entry(&self) -> ErrorEntry {
        ErrorEntry {
            code: self.code_string(),
            category: self.category(),
            message: self.message().to_string(),
            remediation: self
                .remediation()
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }

    /// Returns all defined error codes.
    #[must_use]
    pub fn all() -> &'static [ErrorCode] {
        &[
            Self::ConfigReadError,
            Self::ConfigParseError,
            Self::ConfigEnvError,
            Self::ContextIncomplete,
            Self::GatewayPathUnknown,
            Self::ForcedCommandMissing,
            Self::ForcedCommandInvalid,
            Self::RepoPathInvalid,
            Self::IdentityInvalid,
            Self::KeyInputInvalid,
            Self::FingerprintInvalid,
            Self::RefUpdateInvalid,
            Self::ToolSpawnFailed,
            Self::FingerprintToolFailed,
            Self::RepoInitFailed,
            Self::ArchiverFailed,
            Self::ReceiverFailed,
            Self::ProvisionFailed,
            Self::TempFileError,
            Self::AuthorizedKeysError,
            Self::KeyStoreLockError,
            Self::RepoDirError,
            Self::HookWriteError,
            Self::OutputError,
        ]
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code_string())
    }
}

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Configuration and context errors (E001-E099)
    Config,
    /// Input validation errors (E100-E199)
    Input,
    /// External tool errors (E200-E299)
    Tool,
    /// Filesystem errors (E300-E399)
    Filesystem,
}

impl ErrorCategory {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Config => "Configuration",
            Self::Input => "Input",
            Self::Tool => "Tool",
            Self::Filesystem => "Filesystem",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Complete error entry with all metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEntry {
    /// Error code string (e.g., "GR-E101")
    pub code: String,
    pub category: ErrorCategory,
    /// Human-readable error message
    pub message: String,
    /// Steps to remediate the error
    pub remediation: Vec<String>,
}

impl ErrorEntry {
    /// Format the entry with its remediation steps.
    #[must_use]
    pub fn format_full(&self) -> String {
        let mut output = format!("[{}] {}\n", self.code, self.message);
        for (i, step) in self.remediation.iter().enumerate() {
            output.push_str(&format!("  {}. {}\n", i + 1, step));
        }
        output
    }
}
