//! Gateway configuration: defaults, an optional TOML file, then
//! `GITRECEIVE_*` environment overrides.

use super::env::{EnvError, EnvParser};
use super::source::{ConfigSource, Sourced};
use crate::process::FALLBACK_EXIT_CODE;
use crate::types::DEFAULT_TRACKED_REF;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// System-wide configuration file, read when present.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/gitreceive/config.toml";

pub const DEFAULT_ROOT: &str = "/home/git";
pub const DEFAULT_USER: &str = "git";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{}", format_env_errors(.0))]
    Env(Vec<EnvError>),
}

fn format_env_errors(errors: &[EnvError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// On-disk representation. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    root: Option<String>,
    user: Option<String>,
    receiver: Option<String>,
    tracked_ref: Option<String>,
    git: Option<String>,
    ssh_keygen: Option<String>,
    useradd: Option<String>,
    chown: Option<String>,
    fallback_exit_code: Option<i32>,
}

/// Effective gateway configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Service root: home of the service account and parent of all repos.
    pub root: PathBuf,
    /// Service account name.
    pub user: String,
    /// Receiver override; `<root>/receiver` when unset.
    pub receiver: Option<PathBuf>,
    /// Fully qualified ref delivered to the receiver.
    pub tracked_ref: String,
    pub git: String,
    pub ssh_keygen: String,
    pub useradd: String,
    pub chown: String,
    pub fallback_exit_code: i32,
    sources: BTreeMap<&'static str, ConfigSource>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_ROOT),
            user: DEFAULT_USER.to_string(),
            receiver: None,
            tracked_ref: DEFAULT_TRACKED_REF.to_string(),
            git: "git".to_string(),
            ssh_keygen: "ssh-keygen".to_string(),
            useradd: "useradd".to_string(),
            chown: "chown".to_string(),
            fallback_exit_code: FALLBACK_EXIT_CODE,
            sources: BTreeMap::new(),
        }
    }
}

impl GatewayConfig {
    /// Load from the system file and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(EnvParser::new(), Path::new(SYSTEM_CONFIG_PATH))
    }

    /// Load using `env` for variables and `system_file` as the fallback file.
    pub fn load_from(mut env: EnvParser, system_file: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let explicit = env.get_path("CONFIG");
        let file = match explicit {
            Some(path) => Some(path.value),
            None if system_file.is_file() => Some(system_file.to_path_buf()),
            None => None,
        };
        if let Some(path) = file {
            let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            config.apply_file(&text, &path)?;
        }

        config.apply_env(&mut env);
        if env.has_errors() {
            return Err(ConfigError::Env(env.take_errors()));
        }

        for (key, source) in &config.sources {
            debug!(key, %source, "config override");
        }
        Ok(config)
    }

    /// Apply a TOML document on top of the current values.
    pub fn apply_file(&mut self, text: &str, path: &Path) -> Result<(), ConfigError> {
        let file: FileConfig = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let source = || ConfigSource::File(path.to_path_buf());
        if let Some(root) = file.root {
            self.root = expand_path(&root);
            self.sources.insert("root", source());
        }
        if let Some(user) = file.user {
            self.user = user;
            self.sources.insert("user", source());
        }
        if let Some(receiver) = file.receiver {
            self.receiver = Some(expand_path(&receiver));
            self.sources.insert("receiver", source());
        }
        if let Some(tracked_ref) = file.tracked_ref {
            self.tracked_ref = qualify_ref(&tracked_ref);
            self.sources.insert("tracked_ref", source());
        }
        for (key, value, slot) in [
            ("git", file.git, &mut self.git),
            ("ssh_keygen", file.ssh_keygen, &mut self.ssh_keygen),
            ("useradd", file.useradd, &mut self.useradd),
            ("chown", file.chown, &mut self.chown),
        ] {
            if let Some(value) = value {
                *slot = value;
                self.sources.insert(key, source());
            }
        }
        if let Some(code) = file.fallback_exit_code {
            self.fallback_exit_code = code;
            self.sources.insert("fallback_exit_code", source());
        }
        Ok(())
    }

    fn apply_env(&mut self, env: &mut EnvParser) {
        if let Some(root) = env.get_path("ROOT") {
            self.root = root.value;
            self.sources.insert("root", root.source);
        }
        if let Some(user) = env.get_string("USER") {
            self.user = user.value;
            self.sources.insert("user", user.source);
        }
        if let Some(receiver) = env.get_path("RECEIVER") {
            self.receiver = Some(receiver.value);
            self.sources.insert("receiver", receiver.source);
        }
        if let Some(tracked_ref) = env.get_string("TRACKED_REF") {
            self.tracked_ref = qualify_ref(&tracked_ref.value);
            self.sources.insert("tracked_ref", tracked_ref.source);
        }
        for (key, name, slot) in [
            ("git", "GIT", &mut self.git),
            ("ssh_keygen", "SSH_KEYGEN", &mut self.ssh_keygen),
            ("useradd", "USERADD", &mut self.useradd),
            ("chown", "CHOWN", &mut self.chown),
        ] {
            if let Some(Sourced { value, source }) = env.get_string(name) {
                *slot = value;
                self.sources.insert(key, source);
            }
        }
        if let Some(code) = env.get_i32_range("FALLBACK_EXIT_CODE", 1, 255) {
            self.fallback_exit_code = code.value;
            self.sources.insert("fallback_exit_code", code.source);
        }
    }

    /// Where a setting came from.
    pub fn source_of(&self, key: &str) -> ConfigSource {
        self.sources
            .get(key)
            .cloned()
            .unwrap_or(ConfigSource::Default)
    }

    /// Receiver executable for a push rooted at `root`.
    pub fn receiver_for(&self, root: &Path) -> PathBuf {
        self.receiver
            .clone()
            .unwrap_or_else(|| root.join("receiver"))
    }

    /// The service account's `.ssh` directory.
    pub fn ssh_dir(&self) -> PathBuf {
        self.root.join(".ssh")
    }

    /// Key store read by sshd for the service account.
    pub fn authorized_keys_path(&self) -> PathBuf {
        self.ssh_dir().join("authorized_keys")
    }
}

fn expand_path(raw: &str) -> PathBuf {
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(raw),
    }
}

/// `master` -> `refs/heads/master`; fully qualified refs pass through.
fn qualify_ref(raw: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with("refs/") {
        raw.to_string()
    } else {
        format!("refs/heads/{raw}")
    }
}
