//! Delivery context handed from the dispatcher to the hook.
//!
//! The dispatcher builds a [`DeliveryContext`] once and exports it into the
//! environment of the re-executed git command. Git runs the pre-receive hook
//! with that environment, and the hook rebuilds the context with
//! [`DeliveryContext::from_env`]. The four variable names are part of the
//! receiver contract and must not change.

use std::path::{Path, PathBuf};
use thiserror::Error;

pub const RECEIVE_USER_ENV: &str = "RECEIVE_USER";
pub const RECEIVE_FINGERPRINT_ENV: &str = "RECEIVE_FINGERPRINT";
pub const RECEIVE_REPO_ENV: &str = "RECEIVE_REPO";
pub const GITHOME_ENV: &str = "GITHOME";

/// A required context variable is absent. Always a configuration defect:
/// it means the hook ran outside a `gitreceive run` session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("{var} is not set")]
    Missing { var: &'static str },

    #[error("{var} is empty")]
    Empty { var: &'static str },
}

/// Identity and repository of one push, valid across the re-exec boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryContext {
    user: String,
    fingerprint: String,
    repo: String,
    root: PathBuf,
}

impl DeliveryContext {
    /// Build a context, rejecting empty fields.
    pub fn new(
        user: impl Into<String>,
        fingerprint: impl Into<String>,
        repo: impl Into<String>,
        root: impl Into<PathBuf>,
    ) -> Result<Self, ContextError> {
        let context = Self {
            user: user.into(),
            fingerprint: fingerprint.into(),
            repo: repo.into(),
            root: root.into(),
        };
        context.validate()?;
        Ok(context)
    }

    /// Read the context from the process environment.
    pub fn from_env() -> Result<Self, ContextError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read the context through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ContextError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &'static str| match lookup(var) {
            None => Err(ContextError::Missing { var }),
            Some(value) if value.is_empty() => Err(ContextError::Empty { var }),
            Some(value) => Ok(value),
        };

        Ok(Self {
            user: get(RECEIVE_USER_ENV)?,
            fingerprint: get(RECEIVE_FINGERPRINT_ENV)?,
            repo: get(RECEIVE_REPO_ENV)?,
            root: PathBuf::from(get(GITHOME_ENV)?),
        })
    }

    fn validate(&self) -> Result<(), ContextError> {
        let fields = [
            (RECEIVE_USER_ENV, self.user.is_empty()),
            (RECEIVE_FINGERPRINT_ENV, self.fingerprint.is_empty()),
            (RECEIVE_REPO_ENV, self.repo.is_empty()),
            (GITHOME_ENV, self.root.as_os_str().is_empty()),
        ];
        match fields.into_iter().find(|(_, empty)| *empty) {
            Some((var, _)) => Err(ContextError::Empty { var }),
            None => Ok(()),
        }
    }

    /// Environment entries to add to a child process.
    pub fn env_pairs(&self) -> [(&'static str, String); 4] {
        [
            (RECEIVE_USER_ENV, self.user.clone()),
            (RECEIVE_FINGERPRINT_ENV, self.fingerprint.clone()),
            (RECEIVE_REPO_ENV, self.repo.clone()),
            (GITHOME_ENV, self.root.to_string_lossy().into_owned()),
        ]
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
