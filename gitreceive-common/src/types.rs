//! Common types used across gitreceive components.

use std::fmt;
use thiserror::Error;

/// SSH options appended to every forced command.
pub const FORCED_COMMAND_OPTIONS: &str =
    "no-agent-forwarding,no-pty,no-user-rc,no-X11-forwarding,no-port-forwarding";

/// Default branch whose pushes are delivered to the receiver.
pub const DEFAULT_TRACKED_REF: &str = "refs/heads/master";

/// All-zero object name git uses for created or deleted refs.
const NULL_REVISION_CHAR: char = '0';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("'{label}' may only contain letters, digits and . _ @ + -")]
    InvalidIdentity { label: String },

    #[error("no key was read from stdin")]
    EmptyKey,

    #[error("key input must be a single line")]
    MultiLineKey,

    #[error("{raw}")]
    InvalidFingerprint { raw: String },

    #[error("gateway path {path} cannot be embedded in a forced command")]
    UnquotablePath { path: String },
}

/// Name an enrolled key is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityLabel(String);

impl IdentityLabel {
    pub fn parse(label: &str) -> Result<Self, KeyError> {
        let valid = !label.is_empty()
            && label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '@' | '+' | '-'));
        if valid {
            Ok(Self(label.to_string()))
        } else {
            Err(KeyError::InvalidIdentity {
                label: label.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key fingerprint as printed by `ssh-keygen -l`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Extract the fingerprint from `ssh-keygen -lf` output
    /// (`<bits> <fingerprint> <comment> (<type>)`).
    pub fn from_keygen_output(output: &str) -> Result<Self, KeyError> {
        let line = output.lines().next().unwrap_or_default();
        let mut fields = line.split(' ');
        match (fields.next(), fields.next()) {
            (Some(_), Some(fingerprint)) if !fingerprint.is_empty() => {
                Ok(Self(fingerprint.to_string()))
            }
            _ => Err(KeyError::InvalidFingerprint {
                raw: output.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Public key text exactly as the operator supplied it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPublicKey(String);

impl RawPublicKey {
    /// Accept one key line, optionally newline-terminated.
    pub fn parse(raw: String) -> Result<Self, KeyError> {
        let body = raw.strip_suffix('\n').unwrap_or(&raw);
        let body = body.strip_suffix('\r').unwrap_or(body);
        if body.trim().is_empty() {
            return Err(KeyError::EmptyKey);
        }
        if body.contains(['\n', '\r']) {
            return Err(KeyError::MultiLineKey);
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One `authorized_keys` line binding a key to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedKeyEntry {
    forced_command_prefix: String,
    raw_public_key: RawPublicKey,
}

impl AuthorizedKeyEntry {
    pub fn new(
        gateway_path: &str,
        identity: &IdentityLabel,
        fingerprint: &Fingerprint,
        raw_public_key: RawPublicKey,
    ) -> Result<Self, KeyError> {
        if gateway_path.is_empty() || gateway_path.contains(['"', '\\', '\n', '\r']) {
            return Err(KeyError::UnquotablePath {
                path: gateway_path.to_string(),
            });
        }

        let forced_command_prefix = format!(
            "command=\"{gateway_path} run {identity} {fingerprint}\",{FORCED_COMMAND_OPTIONS}"
        );
        Ok(Self {
            forced_command_prefix,
            raw_public_key,
        })
    }

    /// Line to append: prefix, one space, then the key unchanged.
    pub fn render(&self) -> String {
        format!(
            "{} {}",
            self.forced_command_prefix,
            self.raw_public_key.as_str()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefUpdateError {
    #[error("expected '<old-rev> <new-rev> <ref-name>', got '{line}'")]
    Malformed { line: String },
}

/// One line of pre-receive input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefUpdate {
    pub old: String,
    pub new: String,
    pub ref_name: String,
}

impl RefUpdate {
    pub fn parse(line: &str) -> Result<Self, RefUpdateError> {
        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next(), fields.next()) {
            (Some(old), Some(new), Some(ref_name)) => Ok(Self {
                old: old.to_string(),
                new: new.to_string(),
                ref_name: ref_name.to_string(),
            }),
            _ => Err(RefUpdateError::Malformed {
                line: line.to_string(),
            }),
        }
    }

    /// The push deletes the ref; there is no tree to deliver.
    pub fn is_deletion(&self) -> bool {
        !self.new.is_empty() && self.new.chars().all(|c| c == NULL_REVISION_CHAR)
    }
}
