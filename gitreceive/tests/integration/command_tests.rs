use crate::common::{GatewayFixture, assert_contains, init_test_logging};

#[test]
fn test_help_lists_subcommands() {
    init_test_logging();
    crate::test_log!("TEST START: test_help_lists_subcommands");

    let output = GatewayFixture::new()
        .command()
        .arg("--help")
        .output()
        .expect("Failed to run gitreceive --help");

    assert!(output.status.success(), "gitreceive --help failed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    for verb in ["init", "upload-key", "run", "hook"] {
        assert_contains(&stdout, verb);
    }
    crate::test_log!("TEST PASS: test_help_lists_subcommands");
}

#[test]
fn test_invalid_env_config_is_reported() {
    init_test_logging();
    crate::test_log!("TEST START: test_invalid_env_config_is_reported");

    let fixture = GatewayFixture::new();
    let output = fixture
        .command()
        .arg("hook")
        .env("GITRECEIVE_FALLBACK_EXIT_CODE", "0")
        .output()
        .expect("Failed to run gitreceive hook");

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_contains(&stdout, "GR-E003");
    assert_contains(&stdout, "GITRECEIVE_FALLBACK_EXIT_CODE");
    crate::test_log!("TEST PASS: test_invalid_env_config_is_reported");
}

#[test]
fn test_config_file_sets_tracked_ref() {
    init_test_logging();
    crate::test_log!("TEST START: test_config_file_sets_tracked_ref");

    let fixture = GatewayFixture::new();
    std::fs::write(&fixture.config_file, "tracked_ref = \"main\"\n")
        .expect("Failed to write config");
    let receiver = fixture.tool(
        "receiver",
        &format!("echo \"$@\" >> '{}'\ncat > /dev/null", fixture.trace("calls").display()),
    );
    fixture.tool("git", "echo tar");

    let mut child = fixture
        .command()
        .arg("hook")
        .env("GITRECEIVE_RECEIVER", &receiver)
        .env("GITRECEIVE_GIT", fixture.bin.join("git"))
        .env("RECEIVE_USER", "alice")
        .env("RECEIVE_FINGERPRINT", "SHA256:abc")
        .env("RECEIVE_REPO", "app.git")
        .env("GITHOME", &fixture.root)
        .stdin(std::process::Stdio::piped())
        .spawn()
        .expect("Failed to start gitreceive hook");
    {
        use std::io::Write;
        let stdin = child.stdin.as_mut().expect("Failed to open stdin");
        stdin
            .write_all(b"aaa bbb refs/heads/master\naaa ccc refs/heads/main\n")
            .expect("Failed to write hook input");
    }
    let status = child.wait().expect("Failed to wait for hook");

    assert!(status.success());
    assert_eq!(
        fixture.read_trace("calls").as_deref(),
        Some("app.git ccc alice SHA256:abc\n")
    );
    crate::test_log!("TEST PASS: test_config_file_sets_tracked_ref");
}

#[test]
fn test_no_arguments_prints_help() {
    init_test_logging();
    crate::test_log!("TEST START: test_no_arguments_prints_help");

    let output = GatewayFixture::new()
        .command()
        .output()
        .expect("Failed to run gitreceive");

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_contains(&stderr, "Usage:");
    assert_contains(&stderr, "upload-key");
    crate::test_log!("TEST PASS: test_no_arguments_prints_help");
}

#[test]
fn test_verbose_failure_lists_remediation() {
    init_test_logging();
    crate::test_log!("TEST START: test_verbose_failure_lists_remediation");

    let fixture = GatewayFixture::new();
    let log_file = fixture.trace("gateway.log");
    let output = fixture
        .command()
        .args(["--verbose", "--log-file"])
        .arg(&log_file)
        .arg("hook")
        .stdin(std::process::Stdio::null())
        .output()
        .expect("Failed to run gitreceive hook");

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_contains(&stdout, "[GR-E004] Delivery context is incomplete");
    assert_contains(&stdout, "  1. The hook must be entered through `gitreceive run`");

    let logged = std::fs::read_to_string(&log_file).expect("log file not written");
    assert_contains(&logged, "GR-E004");
    crate::test_log!("TEST PASS: test_verbose_failure_lists_remediation");
}
