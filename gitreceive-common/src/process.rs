//! Synchronous external command execution.
//!
//! Every external tool the gateway touches (`git`, `ssh-keygen`, `useradd`,
//! the receiver) goes through [`ProcessRunner`]. Exit statuses are folded
//! into a plain `i32`; a status without a usable code (signal termination)
//! becomes the configured fallback code.

use std::io;
use std::process::{Command, ExitStatus, Stdio};
use thiserror::Error;
use tracing::{debug, warn};

/// Exit code reported when a child's real exit code cannot be determined.
pub const FALLBACK_EXIT_CODE: i32 = 127;

/// A program could not be started.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to wait for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Output captured from a completed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captured {
    /// All of stdout, then all of stderr. The two streams are captured
    /// separately, so their relative order within the run is not kept.
    pub output: String,
    pub exit_code: i32,
}

impl Captured {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs external commands to completion.
#[derive(Debug, Clone, Copy)]
pub struct ProcessRunner {
    fallback_exit_code: i32,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(FALLBACK_EXIT_CODE)
    }
}

impl ProcessRunner {
    pub fn new(fallback_exit_code: i32) -> Self {
        Self { fallback_exit_code }
    }

    pub fn fallback_exit_code(&self) -> i32 {
        self.fallback_exit_code
    }

    /// Run `cmd` with stdin closed, capturing stdout and stderr into
    /// [`Captured::output`] (stdout first).
    pub fn capture(&self, cmd: &mut Command) -> Result<Captured, ProcessError> {
        let program = program_name(cmd);
        debug!(program = %program, args = ?cmd.get_args().collect::<Vec<_>>(), "capturing command");

        let out = cmd
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ProcessError::Spawn {
                program: program.clone(),
                source,
            })?;

        let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&out.stderr));

        Ok(Captured {
            output,
            exit_code: self.exit_code(&program, out.status),
        })
    }

    /// Run `cmd` with the caller's stdin, stdout and stderr.
    pub fn passthrough(&self, cmd: &mut Command) -> Result<i32, ProcessError> {
        let program = program_name(cmd);
        debug!(program = %program, args = ?cmd.get_args().collect::<Vec<_>>(), "running command");

        let status = cmd
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|source| ProcessError::Spawn {
                program: program.clone(),
                source,
            })?;

        Ok(self.exit_code(&program, status))
    }

    /// Normalize an exit status to a non-negative integer.
    pub fn exit_code(&self, program: &str, status: ExitStatus) -> i32 {
        if let Some(code) = status.code() {
            return code;
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                warn!(
                    program,
                    signal,
                    fallback = self.fallback_exit_code,
                    "process killed by signal"
                );
                return self.fallback_exit_code;
            }
        }

        warn!(
            program,
            fallback = self.fallback_exit_code,
            "process exit code unavailable"
        );
        self.fallback_exit_code
    }
}

/// Program of a command as a display string.
pub fn program_name(cmd: &Command) -> String {
    cmd.get_program().to_string_lossy().into_owned()
}
