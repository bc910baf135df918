use std::fs;

use crate::common::{
    GatewayFixture, assert_contains, assert_mode, assert_path_exists, gateway_binary,
    init_test_logging,
};

/// Fake `git` (for `init --bare`) and `git-receive-pack` on `PATH`. The
/// transport records its argv, cwd and the delivery context.
fn fixture_with_git(transport_exit: i32) -> GatewayFixture {
    let fixture = GatewayFixture::new();
    fixture.tool(
        "git",
        &format!(
            "echo \"$@\" >> '{}'\nmkdir -p hooks objects refs",
            fixture.trace("git-calls").display()
        ),
    );
    fixture.tool(
        "git-receive-pack",
        &format!(
            "{{\necho \"args=$*\"\necho \"cwd=$(pwd)\"\necho \"user=$RECEIVE_USER\"\n\
echo \"fingerprint=$RECEIVE_FINGERPRINT\"\necho \"repo=$RECEIVE_REPO\"\necho \"githome=$GITHOME\"\n\
}} > '{}'\nexit {transport_exit}",
            fixture.trace("transport").display()
        ),
    );
    fixture
}

#[test]
fn test_run_initializes_repo_and_execs_transport() {
    init_test_logging();
    crate::test_log!("TEST START: test_run_initializes_repo_and_execs_transport");

    let fixture = fixture_with_git(0);
    let output = fixture
        .command()
        .args(["run", "alice", "SHA256:abc"])
        .env("SSH_ORIGINAL_COMMAND", "git-receive-pack 'app.git'")
        .output()
        .expect("Failed to run gitreceive run");

    assert!(output.status.success(), "run failed: {output:?}");
    assert_eq!(fixture.read_trace("git-calls").as_deref(), Some("init --bare\n"));

    let root = fs::canonicalize(&fixture.root).expect("Failed to canonicalize root");
    let transport = fixture.read_trace("transport").expect("transport never ran");
    assert_contains(&transport, "args=app.git\n");
    assert_contains(&transport, &format!("cwd={}\n", root.display()));
    assert_contains(&transport, "user=alice\n");
    assert_contains(&transport, "fingerprint=SHA256:abc\n");
    assert_contains(&transport, "repo=app.git\n");
    assert_contains(&transport, &format!("githome={}\n", fixture.root.display()));

    let hook = fixture.root.join("app.git/hooks/pre-receive");
    assert_path_exists(&hook);
    let body = fs::read_to_string(&hook).expect("Failed to read hook");
    assert_eq!(
        body,
        format!("#!/bin/bash\ncat | {} hook\n", gateway_binary().display())
    );
    assert_mode(&hook, 0o770);
    crate::test_log!("TEST PASS: test_run_initializes_repo_and_execs_transport");
}

#[test]
fn test_run_second_push_skips_init() {
    init_test_logging();
    crate::test_log!("TEST START: test_run_second_push_skips_init");

    let fixture = fixture_with_git(0);
    for _ in 0..2 {
        let status = fixture
            .command()
            .args(["run", "alice", "SHA256:abc"])
            .env("SSH_ORIGINAL_COMMAND", "git-receive-pack 'app.git'")
            .status()
            .expect("Failed to run gitreceive run");
        assert!(status.success());
    }

    assert_eq!(fixture.read_trace("git-calls").as_deref(), Some("init --bare\n"));
    crate::test_log!("TEST PASS: test_run_second_push_skips_init");
}

#[test]
fn test_run_mirrors_transport_exit_code() {
    init_test_logging();
    crate::test_log!("TEST START: test_run_mirrors_transport_exit_code");

    let fixture = fixture_with_git(5);
    let status = fixture
        .command()
        .args(["run", "alice", "SHA256:abc"])
        .env("SSH_ORIGINAL_COMMAND", "git-receive-pack 'app.git'")
        .status()
        .expect("Failed to run gitreceive run");

    assert_eq!(status.code(), Some(5));
    crate::test_log!("TEST PASS: test_run_mirrors_transport_exit_code");
}

#[test]
fn test_run_rejects_bad_commands_without_side_effects() {
    init_test_logging();
    crate::test_log!("TEST START: test_run_rejects_bad_commands_without_side_effects");

    let fixture = fixture_with_git(0);
    let cases = [
        (None, "GR-E100"),
        (Some("git-receive-pack"), "GR-E101"),
        (Some("rm -rf"), "GR-E101"),
        (Some("git-receive-pack '../outside.git'"), "GR-E102"),
    ];

    for (command, code) in cases {
        let mut cmd = fixture.command();
        cmd.args(["run", "alice", "SHA256:abc"]);
        if let Some(command) = command {
            cmd.env("SSH_ORIGINAL_COMMAND", command);
        }
        let output = cmd.output().expect("Failed to run gitreceive run");

        assert_eq!(output.status.code(), Some(1), "{command:?}");
        assert_contains(&String::from_utf8_lossy(&output.stdout), code);
    }

    assert!(fixture.root_is_empty(), "root was modified");
    assert!(fixture.read_trace("git-calls").is_none());
    assert!(fixture.read_trace("transport").is_none());
    assert!(!fixture.dir.path().join("outside.git").exists());
    crate::test_log!("TEST PASS: test_run_rejects_bad_commands_without_side_effects");
}
