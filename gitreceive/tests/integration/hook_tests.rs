use std::io::Write;
use std::process::{Output, Stdio};

use crate::common::{GatewayFixture, assert_contains, init_test_logging};

const OLD: &str = "9fceb02d0ae598e95dc970b74767f19372d61af8";
const NEW: &str = "e83c5163316f89bfbde7d9ab23ca2e25604af290";
const FEATURE: &str = "a1b2c3d4e5f60718293a4b5c6d7e8f9012345678";

/// Receiver that logs its argv and saves what it was streamed.
fn fixture_with_receiver(receiver_exit: i32) -> GatewayFixture {
    let fixture = GatewayFixture::new();
    fixture.tool(
        "receiver",
        &format!(
            "echo \"$@\" >> '{}'\ncat > '{}'\nexit {receiver_exit}",
            fixture.trace("receiver-calls").display(),
            fixture.trace("received").display()
        ),
    );
    fixture.tool("git", "echo \"archive $2\"");
    fixture
}

fn hook(fixture: &GatewayFixture, input: &str) -> Output {
    let mut child = fixture
        .command()
        .arg("hook")
        .env("GITRECEIVE_RECEIVER", fixture.bin.join("receiver"))
        .env("RECEIVE_USER", "alice")
        .env("RECEIVE_FINGERPRINT", "SHA256:abc")
        .env("RECEIVE_REPO", "app.git")
        .env("GITHOME", &fixture.root)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to start gitreceive hook");
    {
        let stdin = child.stdin.as_mut().expect("Failed to open stdin");
        stdin.write_all(input.as_bytes()).expect("Failed to write hook input");
    }
    child.wait_with_output().expect("Failed to read hook output")
}

#[test]
fn test_hook_delivers_only_tracked_branch() {
    init_test_logging();
    crate::test_log!("TEST START: test_hook_delivers_only_tracked_branch");

    let fixture = fixture_with_receiver(0);
    let input = format!("{OLD} {NEW} refs/heads/master\n{OLD} {FEATURE} refs/heads/feature\n");

    let output = hook(&fixture, &input);

    assert!(output.status.success(), "hook failed: {output:?}");
    assert_eq!(
        fixture.read_trace("receiver-calls"),
        Some(format!("app.git {NEW} alice SHA256:abc\n"))
    );
    assert_eq!(fixture.read_trace("received"), Some(format!("archive {NEW}\n")));
    crate::test_log!("TEST PASS: test_hook_delivers_only_tracked_branch");
}

#[test]
fn test_hook_ignores_untracked_refs_entirely() {
    init_test_logging();
    crate::test_log!("TEST START: test_hook_ignores_untracked_refs_entirely");

    let fixture = fixture_with_receiver(0);
    let input = format!("{OLD} {FEATURE} refs/heads/feature\n");

    let output = hook(&fixture, &input);

    assert!(output.status.success());
    assert!(fixture.read_trace("receiver-calls").is_none());
    crate::test_log!("TEST PASS: test_hook_ignores_untracked_refs_entirely");
}

#[test]
fn test_hook_receiver_failure_denies_push() {
    init_test_logging();
    crate::test_log!("TEST START: test_hook_receiver_failure_denies_push");

    let fixture = fixture_with_receiver(4);
    let input = format!("{OLD} {NEW} refs/heads/master\n");

    let output = hook(&fixture, &input);

    assert_eq!(output.status.code(), Some(4));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_contains(&stdout, "Push denied - receiver failed to exit cleanly");
    assert_contains(&stdout, NEW);
    crate::test_log!("TEST PASS: test_hook_receiver_failure_denies_push");
}

#[test]
fn test_hook_requires_delivery_context() {
    init_test_logging();
    crate::test_log!("TEST START: test_hook_requires_delivery_context");

    let fixture = fixture_with_receiver(0);
    let output = fixture
        .command()
        .arg("hook")
        .env("RECEIVE_USER", "alice")
        .stdin(Stdio::null())
        .output()
        .expect("Failed to run gitreceive hook");

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_contains(&stdout, "GR-E004");
    assert_contains(&stdout, "RECEIVE_FINGERPRINT");
    crate::test_log!("TEST PASS: test_hook_requires_delivery_context");
}
