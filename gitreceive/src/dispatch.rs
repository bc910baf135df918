//! Forced-command dispatch (`gitreceive run <identity> <fingerprint>`).
//!
//! Push setup happens in [`prepare`]: resolve the repository, initialize it
//! on first use, rewrite its pre-receive hook and build the delivery
//! context. [`PreparedPush::exec`] then hands the session to git. The only
//! contract with the hook stage is the hook file and the context variables.

use crate::tools::run_tool;
use gitreceive_common::{
    DeliveryContext, ErrorCode, ForcedCommand, GatewayConfig, GatewayError, ProcessRunner,
};
use std::borrow::Cow;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

#[cfg(unix)]
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt};

/// Mode for repository directories and the generated hook.
const REPO_MODE: u32 = 0o770;

/// Push session derived from the forced-command arguments and
/// `SSH_ORIGINAL_COMMAND`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushInvocation {
    pub identity: String,
    pub fingerprint: String,
    pub command: ForcedCommand,
}

impl PushInvocation {
    /// Parse the client's command. Runs before any filesystem mutation.
    pub fn new(
        identity: &str,
        fingerprint: &str,
        original_command: Option<&str>,
    ) -> Result<Self, GatewayError> {
        Ok(Self {
            identity: identity.to_string(),
            fingerprint: fingerprint.to_string(),
            command: ForcedCommand::from_env_value(original_command)?,
        })
    }
}

/// Lifecycle of a repository directory under the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoState {
    Absent,
    InitializedBare,
}

impl RepoState {
    pub fn probe(path: &Path) -> Result<Self, GatewayError> {
        match path.try_exists() {
            Ok(true) => Ok(Self::InitializedBare),
            Ok(false) => Ok(Self::Absent),
            Err(e) => Err(GatewayError::fs(ErrorCode::RepoDirError, path, e)),
        }
    }
}

/// A repository ready to receive the session.
#[derive(Debug)]
pub struct PreparedPush {
    pub command: ForcedCommand,
    pub repo_dir: PathBuf,
    pub hook_path: PathBuf,
    /// State before this dispatch touched the repository.
    pub prior_state: RepoState,
    pub context: DeliveryContext,
    root: PathBuf,
}

/// Full dispatch: parse, prepare, exec. Returns git's exit code.
pub fn run(
    config: &GatewayConfig,
    runner: &ProcessRunner,
    identity: &str,
    fingerprint: &str,
    gateway_path: &Path,
    original_command: Option<&str>,
) -> Result<i32, GatewayError> {
    let invocation = PushInvocation::new(identity, fingerprint, original_command)?;
    let prepared = prepare(config, runner, &invocation, gateway_path)?;
    prepared.exec(runner)
}

/// Stage 1: make the repository exist and point its hook at `gateway_path`.
pub fn prepare(
    config: &GatewayConfig,
    runner: &ProcessRunner,
    invocation: &PushInvocation,
    gateway_path: &Path,
) -> Result<PreparedPush, GatewayError> {
    let repo = &invocation.command.repo;
    let repo_dir = repo.under(&config.root);

    let context = DeliveryContext::new(
        invocation.identity.as_str(),
        invocation.fingerprint.as_str(),
        repo.to_string(),
        config.root.clone(),
    )?;

    let prior_state = ensure_repository(config, runner, &repo_dir)?;
    let hook_path = install_hook(&repo_dir, gateway_path)?;

    info!(
        user = context.user(),
        fingerprint = context.fingerprint(),
        repo = context.repo(),
        verb = %invocation.command.verb,
        "dispatching"
    );

    Ok(PreparedPush {
        command: invocation.command.clone(),
        repo_dir,
        hook_path,
        prior_state,
        context,
        root: config.root.clone(),
    })
}

impl PreparedPush {
    /// Stage 2: run the client's git command with the caller's stdio.
    pub fn exec(&self, runner: &ProcessRunner) -> Result<i32, GatewayError> {
        let mut cmd = self.command();
        let exit_code = runner.passthrough(&mut cmd).map_err(|source| {
            GatewayError::spawn(ErrorCode::ToolSpawnFailed, self.context.repo(), source)
        })?;
        debug!(exit_code, "git transport finished");
        Ok(exit_code)
    }

    /// The command `exec` runs: inherited environment plus the context.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(self.command.verb.as_str());
        cmd.arg(self.command.repo.as_path())
            .current_dir(&self.root)
            .envs(self.context.env_pairs());
        cmd
    }
}

/// Create and `git init --bare` the repository if it does not exist yet.
/// Existing directories are left alone. A failed init removes the directory
/// again so the next push retries it.
pub fn ensure_repository(
    config: &GatewayConfig,
    runner: &ProcessRunner,
    repo_dir: &Path,
) -> Result<RepoState, GatewayError> {
    let state = RepoState::probe(repo_dir)?;
    if state == RepoState::InitializedBare {
        return Ok(state);
    }

    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(REPO_MODE);
    builder
        .create(repo_dir)
        .map_err(|e| GatewayError::fs(ErrorCode::RepoDirError, repo_dir, e))?;

    let init = run_tool(
        runner,
        Command::new(&config.git)
            .args(["init", "--bare"])
            .current_dir(repo_dir),
        ErrorCode::RepoInitFailed,
        &repo_dir.display().to_string(),
    );
    if let Err(err) = init {
        fs::remove_dir_all(repo_dir)
            .map_err(|e| GatewayError::fs(ErrorCode::RepoDirError, repo_dir, e))?;
        debug!(path = %repo_dir.display(), "removed repository after failed init");
        return Err(err);
    }

    info!(path = %repo_dir.display(), "initialized bare repository");
    Ok(state)
}

/// Hook body: forward stdin to `<gateway> hook`.
pub fn render_hook(gateway_path: &Path) -> String {
    let path = gateway_path.to_string_lossy();
    let quoted = shell_escape::unix::escape(Cow::Borrowed(path.as_ref()));
    format!("#!/bin/bash\ncat | {quoted} hook\n")
}

/// Truncate and rewrite `hooks/pre-receive`, then make it executable.
pub fn install_hook(repo_dir: &Path, gateway_path: &Path) -> Result<PathBuf, GatewayError> {
    let hooks_dir = repo_dir.join("hooks");
    fs::create_dir_all(&hooks_dir)
        .map_err(|e| GatewayError::fs(ErrorCode::HookWriteError, &hooks_dir, e))?;

    let hook_path = hooks_dir.join("pre-receive");
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(REPO_MODE);

    let mut file = options
        .open(&hook_path)
        .map_err(|e| GatewayError::fs(ErrorCode::HookWriteError, &hook_path, e))?;
    file.write_all(render_hook(gateway_path).as_bytes())
        .map_err(|e| GatewayError::fs(ErrorCode::HookWriteError, &hook_path, e))?;

    #[cfg(unix)]
    file.set_permissions(fs::Permissions::from_mode(REPO_MODE))
        .map_err(|e| GatewayError::fs(ErrorCode::HookWriteError, &hook_path, e))?;

    debug!(path = %hook_path.display(), "wrote pre-receive hook");
    Ok(hook_path)
}
