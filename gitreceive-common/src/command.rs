//! Forced-command grammar.
//!
//! sshd hands the client's literal command line to the gateway in
//! `SSH_ORIGINAL_COMMAND`. Only one shape is accepted:
//!
//! ```text
//! <verb> <repo>
//! verb := git-receive-pack | git-upload-pack | git-upload-archive
//! ```
//!
//! Tokens are split on unquoted whitespace. Single quotes are literal,
//! double quotes honour backslash escapes, and a backslash outside quotes
//! escapes the next character. Stock git clients send
//! `git-receive-pack 'name.git'`, so the usual single layer of quotes is
//! removed, and quoted names containing spaces stay in one token.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Environment variable in which sshd passes the client's command.
pub const SSH_ORIGINAL_COMMAND_ENV: &str = "SSH_ORIGINAL_COMMAND";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("SSH_ORIGINAL_COMMAND is undefined")]
    Missing,

    #[error("SSH_ORIGINAL_COMMAND is too short {raw}")]
    TooShort { raw: String },

    #[error("SSH_ORIGINAL_COMMAND has unexpected arguments {raw}")]
    TooLong { raw: String },

    #[error("unterminated quote in {raw}")]
    UnterminatedQuote { raw: String },

    #[error("command '{verb}' is not allowed")]
    UnknownVerb { verb: String },

    #[error("invalid repository '{repo}': {reason}")]
    InvalidRepo { repo: String, reason: &'static str },
}

/// Git transport commands a client may run through the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitVerb {
    ReceivePack,
    UploadPack,
    UploadArchive,
}

impl GitVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReceivePack => "git-receive-pack",
            Self::UploadPack => "git-upload-pack",
            Self::UploadArchive => "git-upload-archive",
        }
    }

    fn parse(token: &str) -> Option<Self> {
        match token {
            "git-receive-pack" => Some(Self::ReceivePack),
            "git-upload-pack" => Some(Self::UploadPack),
            "git-upload-archive" => Some(Self::UploadArchive),
            _ => None,
        }
    }
}

impl fmt::Display for GitVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Repository path relative to the gateway root. Never absolute, never
/// contains `..`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoPath(PathBuf);

impl RepoPath {
    pub fn parse(raw: &str) -> Result<Self, CommandError> {
        let invalid = |reason| CommandError::InvalidRepo {
            repo: raw.to_string(),
            reason,
        };

        if raw.contains('\0') {
            return Err(invalid("contains a NUL byte"));
        }

        let mut normalized = PathBuf::new();
        for component in Path::new(raw.trim_start_matches('/')).components() {
            match component {
                Component::Normal(part) => normalized.push(part),
                Component::CurDir => {}
                Component::ParentDir => return Err(invalid("contains '..'")),
                Component::RootDir | Component::Prefix(_) => {
                    return Err(invalid("is not a relative path"));
                }
            }
        }

        if normalized.as_os_str().is_empty() {
            return Err(invalid("is empty"));
        }
        Ok(Self(normalized))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Absolute location under `root`.
    pub fn under(&self, root: &Path) -> PathBuf {
        root.join(&self.0)
    }
}

impl fmt::Display for RepoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// A validated client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForcedCommand {
    pub verb: GitVerb,
    pub repo: RepoPath,
}

impl ForcedCommand {
    /// Parse the value of `SSH_ORIGINAL_COMMAND`.
    pub fn parse(raw: &str) -> Result<Self, CommandError> {
        if raw.trim().is_empty() {
            return Err(CommandError::Missing);
        }

        let tokens = tokenize(raw)?;
        let (verb, repo) = match tokens.as_slice() {
            [verb, repo] => (verb, repo),
            [] | [_] => {
                return Err(CommandError::TooShort {
                    raw: raw.to_string(),
                });
            }
            _ => {
                return Err(CommandError::TooLong {
                    raw: raw.to_string(),
                });
            }
        };

        let verb = GitVerb::parse(verb).ok_or_else(|| CommandError::UnknownVerb {
            verb: verb.clone(),
        })?;

        Ok(Self {
            verb,
            repo: RepoPath::parse(repo)?,
        })
    }

    /// Parse from an optional environment value.
    pub fn from_env_value(value: Option<&str>) -> Result<Self, CommandError> {
        match value {
            None => Err(CommandError::Missing),
            Some(raw) => Self::parse(raw),
        }
    }
}

/// Split a command line into unquoted tokens.
pub fn tokenize(raw: &str) -> Result<Vec<String>, CommandError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Quote {
        None,
        Single,
        Double,
    }

    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote = Quote::None;
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        match quote {
            Quote::Single => {
                if c == '\'' {
                    quote = Quote::None;
                } else {
                    current.push(c);
                }
            }
            Quote::Double => match c {
                '"' => quote = Quote::None,
                '\\' => match chars.next() {
                    Some(next @ ('"' | '\\' | '$' | '`')) => current.push(next),
                    Some(next) => {
                        current.push('\\');
                        current.push(next);
                    }
                    None => current.push('\\'),
                },
                _ => current.push(c),
            },
            Quote::None => match c {
                '\'' => {
                    quote = Quote::Single;
                    in_token = true;
                }
                '"' => {
                    quote = Quote::Double;
                    in_token = true;
                }
                '\\' => {
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                    in_token = true;
                }
                c if c.is_whitespace() => {
                    if in_token {
                        tokens.push(std::mem::take(&mut current));
                        in_token = false;
                    }
                }
                _ => {
                    current.push(c);
                    in_token = true;
                }
            },
        }
    }

    if quote != Quote::None {
        return Err(CommandError::UnterminatedQuote {
            raw: raw.to_string(),
        });
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}
