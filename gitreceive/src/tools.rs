//! Invocation of external tools whose failure stops the current command.

use gitreceive_common::process::program_name;
use gitreceive_common::{Captured, ErrorCode, GatewayError, ProcessRunner};
use std::process::Command;
use tracing::debug;

/// Run `cmd` to completion, mapping start failures and non-zero exits to
/// `code`. `subject` names what the tool was working on.
pub fn run_tool(
    runner: &ProcessRunner,
    cmd: &mut Command,
    code: ErrorCode,
    subject: &str,
) -> Result<Captured, GatewayError> {
    let program = program_name(cmd);
    let captured = runner
        .capture(cmd)
        .map_err(|source| GatewayError::spawn(ErrorCode::ToolSpawnFailed, subject, source))?;

    if !captured.success() {
        return Err(GatewayError::Tool {
            code,
            program,
            subject: subject.to_string(),
            exit_code: captured.exit_code,
            output: captured.output,
        });
    }

    debug!(program = %program, subject, "tool succeeded");
    Ok(captured)
}
