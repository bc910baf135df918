//! Pre-receive relay (`gitreceive hook`).
//!
//! git feeds one `<old> <new> <ref>` line per updated ref. Each update of
//! the tracked ref is streamed to the receiver as `git archive <new>`
//! through an OS pipe; the gateway never buffers the tree itself.

use gitreceive_common::process::program_name;
use gitreceive_common::{
    DeliveryContext, ErrorCode, GatewayConfig, GatewayError, ProcessError, ProcessRunner,
    RefUpdate,
};
use std::io::{self, BufRead};
use std::process::{Child, Command, Stdio};
use tracing::{debug, info, warn};

/// What a relay run did with its input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayReport {
    pub delivered: usize,
    pub skipped: usize,
}

/// Hook entry point: context from the environment, updates from stdin.
pub fn run(config: &GatewayConfig, runner: &ProcessRunner) -> Result<i32, GatewayError> {
    let context = DeliveryContext::from_env()?;
    let stdin = io::stdin();
    let report = relay(config, runner, &context, stdin.lock())?;
    debug!(delivered = report.delivered, skipped = report.skipped, "relay finished");
    Ok(0)
}

/// Process updates in order. The first failure aborts the relay and with it
/// the whole push.
pub fn relay<R: BufRead>(
    config: &GatewayConfig,
    runner: &ProcessRunner,
    context: &DeliveryContext,
    input: R,
) -> Result<RelayReport, GatewayError> {
    let mut report = RelayReport::default();

    for line in input.lines() {
        let line = line.map_err(|e| {
            GatewayError::input(
                ErrorCode::RefUpdateInvalid,
                format!("failed to read hook input: {e}"),
            )
        })?;
        if line.trim().is_empty() {
            continue;
        }

        let update = RefUpdate::parse(&line)?;
        if update.ref_name != config.tracked_ref {
            debug!(ref_name = %update.ref_name, "ignoring untracked ref");
            report.skipped += 1;
            continue;
        }
        // `git archive 000..` would fail and reject the push, so deleting
        // the tracked branch is allowed and delivers nothing.
        if update.is_deletion() {
            info!(ref_name = %update.ref_name, "tracked ref deleted, nothing to deliver");
            report.skipped += 1;
            continue;
        }

        deliver(config, runner, context, &update)?;
        report.delivered += 1;
    }

    Ok(report)
}

/// Run `<receiver> <repo> <rev> <user> <fingerprint>` fed by
/// `git archive <rev>`, waiting for the archiver first.
fn deliver(
    config: &GatewayConfig,
    runner: &ProcessRunner,
    context: &DeliveryContext,
    update: &RefUpdate,
) -> Result<(), GatewayError> {
    let rev = update.new.as_str();
    let receiver_subject = format!("receiver for {rev}");
    let archiver_subject = format!("git archive for {rev}");

    let mut receiver_cmd = Command::new(config.receiver_for(context.root()));
    receiver_cmd
        .args([context.repo(), rev, context.user(), context.fingerprint()])
        .stdin(Stdio::piped())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    let receiver_name = program_name(&receiver_cmd);

    debug!(receiver = %receiver_name, rev, "starting receiver");
    let mut receiver = receiver_cmd
        .spawn()
        .map_err(|source| spawn_error(&receiver_subject, &receiver_name, source))?;

    let Some(pipe) = receiver.stdin.take() else {
        abandon(&mut receiver);
        return Err(spawn_error(
            &receiver_subject,
            &receiver_name,
            io::Error::other("receiver stdin was not piped"),
        ));
    };

    // The command holds the write end of the pipe; it must be dropped before
    // waiting or the receiver never sees EOF.
    let (archiver_name, archiver) = {
        let mut cmd = Command::new(&config.git);
        cmd.args(["archive", rev])
            .stdin(Stdio::null())
            .stdout(Stdio::from(pipe))
            .stderr(Stdio::inherit());
        (program_name(&cmd), cmd.spawn())
    };
    let mut archiver = match archiver {
        Ok(child) => child,
        Err(source) => {
            abandon(&mut receiver);
            return Err(spawn_error(&archiver_subject, &archiver_name, source));
        }
    };

    let archiver_code = match archiver.wait() {
        Ok(status) => runner.exit_code(&archiver_name, status),
        Err(source) => {
            abandon(&mut receiver);
            return Err(wait_error(&archiver_subject, &archiver_name, source));
        }
    };
    if archiver_code != 0 {
        abandon(&mut receiver);
        return Err(GatewayError::Tool {
            code: ErrorCode::ArchiverFailed,
            program: archiver_name,
            subject: rev.to_string(),
            exit_code: archiver_code,
            output: String::new(),
        });
    }

    let receiver_code = receiver
        .wait()
        .map(|status| runner.exit_code(&receiver_name, status))
        .map_err(|source| wait_error(&receiver_subject, &receiver_name, source))?;
    if receiver_code != 0 {
        return Err(GatewayError::Tool {
            code: ErrorCode::ReceiverFailed,
            program: receiver_name,
            subject: rev.to_string(),
            exit_code: receiver_code,
            output: String::new(),
        });
    }

    info!(
        repo = context.repo(),
        rev,
        user = context.user(),
        "delivered tree to receiver"
    );
    Ok(())
}

/// Stop a receiver whose input will never be complete.
fn abandon(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!(error = %e, "receiver already exited");
    }
    if let Err(e) = child.wait() {
        warn!(error = %e, "failed to reap receiver");
    }
}

fn spawn_error(subject: &str, program: &str, source: io::Error) -> GatewayError {
    GatewayError::spawn(
        ErrorCode::ToolSpawnFailed,
        subject,
        ProcessError::Spawn {
            program: program.to_string(),
            source,
        },
    )
}

fn wait_error(subject: &str, program: &str, source: io::Error) -> GatewayError {
    GatewayError::spawn(
        ErrorCode::ToolSpawnFailed,
        subject,
        ProcessError::Wait {
            program: program.to_string(),
            source,
        },
    )
}
