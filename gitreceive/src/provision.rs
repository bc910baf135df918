//! Service account setup (`gitreceive init`). Run once, as root.

use crate::tools::run_tool;
use gitreceive_common::{ErrorCode, GatewayConfig, GatewayError, ProcessRunner};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::process::Command;
use tracing::info;

#[cfg(unix)]
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};

/// Create the service account, its `.ssh` directory and an empty key store,
/// then hand the whole root to the account.
pub fn init<W: Write>(
    config: &GatewayConfig,
    runner: &ProcessRunner,
    mut output: W,
) -> Result<i32, GatewayError> {
    let root = config.root.display().to_string();

    run_tool(
        runner,
        Command::new(&config.useradd).args(["-d", &root, &config.user]),
        ErrorCode::ProvisionFailed,
        &config.user,
    )?;

    let ssh_dir = config.ssh_dir();
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o700);
    builder
        .create(&ssh_dir)
        .map_err(|e| GatewayError::fs(ErrorCode::AuthorizedKeysError, &ssh_dir, e))?;

    // Existing keys survive a repeated init.
    let keys = config.authorized_keys_path();
    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    options.mode(0o600);
    options
        .open(&keys)
        .map_err(|e| GatewayError::fs(ErrorCode::AuthorizedKeysError, &keys, e))?;

    run_tool(
        runner,
        Command::new(&config.chown).args(["-R", &config.user, &root]),
        ErrorCode::ProvisionFailed,
        &root,
    )?;

    info!(user = %config.user, root = %root, "provisioned service account");
    writeln!(
        output,
        "Created receiver script in {root} for user '{}'.",
        config.user
    )
    .map_err(|e| GatewayError::fs(ErrorCode::OutputError, "<stdout>", e))?;
    Ok(0)
}
