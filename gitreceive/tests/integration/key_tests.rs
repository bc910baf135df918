use std::io::Write;
use std::process::{Output, Stdio};

use crate::common::{
    GatewayFixture, assert_contains, assert_mode, assert_path_exists, gateway_binary,
    init_test_logging,
};

const KEY: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIOMqqnkVzrm0SdG6UOoqKLsabgH5C9okWi0dh2l9GKJl bob@desk\n";

fn upload_key(fixture: &GatewayFixture, identity: &str, key: &str) -> Output {
    let mut child = fixture
        .command()
        .args(["upload-key", identity])
        .env("GITRECEIVE_SSH_KEYGEN", fixture.bin.join("ssh-keygen"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to start gitreceive upload-key");
    {
        let stdin = child.stdin.as_mut().expect("Failed to open stdin");
        stdin.write_all(key.as_bytes()).expect("Failed to write key");
    }
    child.wait_with_output().expect("Failed to read upload-key output")
}

#[test]
fn test_upload_key_appends_forced_command() {
    init_test_logging();
    crate::test_log!("TEST START: test_upload_key_appends_forced_command");

    let fixture = GatewayFixture::new();
    fixture.tool(
        "ssh-keygen",
        "echo \"256 SHA256:bobfingerprint bob@desk (ED25519)\"",
    );

    let output = upload_key(&fixture, "bob", KEY);

    assert!(output.status.success(), "upload-key failed: {output:?}");
    assert_eq!(String::from_utf8_lossy(&output.stdout), "SHA256:bobfingerprint\n");

    let keys_path = fixture.root.join(".ssh/authorized_keys");
    assert_path_exists(&keys_path);
    assert_mode(&keys_path, 0o600);
    let keys = std::fs::read_to_string(&keys_path).expect("Failed to read authorized_keys");
    let expected_prefix = format!(
        "command=\"{} run bob SHA256:bobfingerprint\",no-agent-forwarding,no-pty,\
no-user-rc,no-X11-forwarding,no-port-forwarding ",
        gateway_binary().display()
    );
    assert_eq!(keys, format!("{expected_prefix}{KEY}"));
    crate::test_log!("TEST PASS: test_upload_key_appends_forced_command");
}

#[test]
fn test_upload_key_mirrors_keygen_exit_code() {
    init_test_logging();
    crate::test_log!("TEST START: test_upload_key_mirrors_keygen_exit_code");

    let fixture = GatewayFixture::new();
    fixture.tool("ssh-keygen", "echo \"is not a public key file.\" >&2\nexit 255");

    let output = upload_key(&fixture, "bob", KEY);

    assert_eq!(output.status.code(), Some(255));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_contains(&stdout, "GR-E201");
    assert_contains(&stdout, "is not a public key file.");
    assert!(!fixture.root.join(".ssh/authorized_keys").exists());
    crate::test_log!("TEST PASS: test_upload_key_mirrors_keygen_exit_code");
}

#[test]
fn test_upload_key_rejects_bad_fingerprint_output() {
    init_test_logging();
    crate::test_log!("TEST START: test_upload_key_rejects_bad_fingerprint_output");

    let fixture = GatewayFixture::new();
    fixture.tool("ssh-keygen", "echo 256");

    let output = upload_key(&fixture, "bob", KEY);

    assert_eq!(output.status.code(), Some(1));
    assert_contains(&String::from_utf8_lossy(&output.stdout), "Fingerprint seems invalid");
    assert!(!fixture.root.join(".ssh/authorized_keys").exists());
    crate::test_log!("TEST PASS: test_upload_key_rejects_bad_fingerprint_output");
}
