use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// A service root plus a directory of stand-in tools. Every gateway
/// command built here is isolated from the host's configuration.
pub struct GatewayFixture {
    pub dir: TempDir,
    pub root: PathBuf,
    pub bin: PathBuf,
    pub config_file: PathBuf,
}

impl GatewayFixture {
    pub fn new() -> Self {
        crate::test_log!("FIXTURE: Creating gateway root");

        let dir = TempDir::new().expect("Failed to create temp dir");
        let root = dir.path().join("root");
        let bin = dir.path().join("bin");
        fs::create_dir_all(&root).expect("Failed to create root");
        fs::create_dir_all(&bin).expect("Failed to create bin dir");

        let config_file = dir.path().join("config.toml");
        fs::write(&config_file, "").expect("Failed to write config file");

        Self {
            dir,
            root,
            bin,
            config_file,
        }
    }

    /// Write an executable `sh` script into the tool directory.
    pub fn tool(&self, name: &str, body: &str) -> PathBuf {
        let path = self.bin.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("Failed to write tool");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .expect("Failed to chmod tool");
        path
    }

    /// File under the fixture directory that tools write their traces to.
    pub fn trace(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn read_trace(&self, name: &str) -> Option<String> {
        fs::read_to_string(self.trace(name)).ok()
    }

    /// `gitreceive` with the fixture's root and tools on `PATH`.
    pub fn command(&self) -> Command {
        let path = match std::env::var("PATH") {
            Ok(existing) => format!("{}:{existing}", self.bin.display()),
            Err(_) => self.bin.display().to_string(),
        };

        let mut cmd = Command::new(env!("CARGO_BIN_EXE_gitreceive"));
        cmd.env("PATH", path)
            .env("GITRECEIVE_CONFIG", &self.config_file)
            .env("GITRECEIVE_ROOT", &self.root)
            .env_remove("GITRECEIVE_LOG_FILE")
            .env_remove("SSH_ORIGINAL_COMMAND");
        for var in ["RECEIVE_USER", "RECEIVE_FINGERPRINT", "RECEIVE_REPO", "GITHOME"] {
            cmd.env_remove(var);
        }
        cmd
    }

    pub fn root_is_empty(&self) -> bool {
        fs::read_dir(&self.root)
            .expect("Failed to list root")
            .next()
            .is_none()
    }
}

/// Path the gateway reports for itself: the canonical test binary.
pub fn gateway_binary() -> PathBuf {
    fs::canonicalize(Path::new(env!("CARGO_BIN_EXE_gitreceive")))
        .expect("Failed to canonicalize gitreceive binary")
}
