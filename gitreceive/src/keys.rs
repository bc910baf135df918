//! Public key enrollment (`gitreceive upload-key <identity>`).

use crate::tools::run_tool;
use fs2::FileExt;
use gitreceive_common::{
    AuthorizedKeyEntry, ErrorCode, Fingerprint, GatewayConfig, GatewayError, IdentityLabel,
    ProcessRunner, RawPublicKey,
};
use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

#[cfg(unix)]
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};

/// Read one public key from `input`, append its forced-command entry to the
/// service account's `authorized_keys`, and print the fingerprint to
/// `output`.
pub fn enroll<R: Read, W: Write>(
    config: &GatewayConfig,
    runner: &ProcessRunner,
    identity: &str,
    gateway_path: &str,
    mut input: R,
    mut output: W,
) -> Result<Fingerprint, GatewayError> {
    let identity = IdentityLabel::parse(identity)?;

    let mut raw = String::new();
    input.read_to_string(&mut raw).map_err(|e| {
        GatewayError::input(
            ErrorCode::KeyInputInvalid,
            format!("failed to read key from stdin: {e}"),
        )
    })?;
    let key = RawPublicKey::parse(raw)?;

    let fingerprint = fingerprint_key(config, runner, &key)?;
    let entry = AuthorizedKeyEntry::new(gateway_path, &identity, &fingerprint, key)?;
    append_entry(&config.authorized_keys_path(), &entry)?;

    info!(identity = %identity, fingerprint = %fingerprint, "enrolled key");
    writeln!(output, "{fingerprint}")
        .map_err(|e| GatewayError::fs(ErrorCode::OutputError, "<stdout>", e))?;
    Ok(fingerprint)
}

/// ssh-keygen cannot fingerprint a pipe reliably, so the key goes through a
/// temporary file. The file is removed on every path; failing to remove it
/// after a successful fingerprint is fatal.
fn fingerprint_key(
    config: &GatewayConfig,
    runner: &ProcessRunner,
    key: &RawPublicKey,
) -> Result<Fingerprint, GatewayError> {
    let mut tmp = tempfile::Builder::new()
        .prefix("gitreceive-key-")
        .suffix(".pub")
        .tempfile()
        .map_err(|e| GatewayError::fs(ErrorCode::TempFileError, std::env::temp_dir(), e))?;
    tmp.write_all(key.as_str().as_bytes())
        .and_then(|()| tmp.flush())
        .map_err(|e| GatewayError::fs(ErrorCode::TempFileError, tmp.path(), e))?;

    let tmp_path = tmp.path().to_path_buf();
    debug!(path = %tmp_path.display(), "wrote key to temporary file");

    let captured = run_tool(
        runner,
        Command::new(&config.ssh_keygen).arg("-lf").arg(&tmp_path),
        ErrorCode::FingerprintToolFailed,
        &tmp_path.display().to_string(),
    )?;
    let fingerprint = Fingerprint::from_keygen_output(&captured.output)?;

    tmp.close()
        .map_err(|e| GatewayError::fs(ErrorCode::TempFileError, &tmp_path, e))?;
    Ok(fingerprint)
}

/// Append under an exclusive advisory lock so concurrent enrollments cannot
/// interleave. A previous entry whose key had no trailing newline is
/// terminated first; the new entry is written exactly as rendered.
fn append_entry(path: &Path, entry: &AuthorizedKeyEntry) -> Result<(), GatewayError> {
    if let Some(parent) = path.parent() {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(0o700);
        builder
            .create(parent)
            .map_err(|e| GatewayError::fs(ErrorCode::AuthorizedKeysError, parent, e))?;
    }

    let mut options = OpenOptions::new();
    options.read(true).create(true).append(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options
        .open(path)
        .map_err(|e| GatewayError::fs(ErrorCode::AuthorizedKeysError, path, e))?;

    file.lock_exclusive()
        .map_err(|e| GatewayError::fs(ErrorCode::KeyStoreLockError, path, e))?;
    let mut line = String::new();
    if !ends_with_newline(&mut file)
        .map_err(|e| GatewayError::fs(ErrorCode::AuthorizedKeysError, path, e))?
    {
        line.push('\n');
    }
    line.push_str(&entry.render());
    file.write_all(line.as_bytes())
        .and_then(|()| file.sync_data())
        .map_err(|e| GatewayError::fs(ErrorCode::AuthorizedKeysError, path, e))?;

    debug!(path = %path.display(), "appended authorized_keys entry");
    Ok(())
}

/// An empty file counts as terminated.
fn ends_with_newline(file: &mut fs::File) -> std::io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}
