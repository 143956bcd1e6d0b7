//! Integration tests for the auxiliary commands

use std::fs;
use std::process::{Command, Output};
use tempfile::TempDir;

const BINARY: &str = env!("CARGO_BIN_EXE_vpn-rotator");

fn rotator(dir: &TempDir, args: &[&str]) -> Output {
    Command::new(BINARY)
        .args(args)
        .current_dir(dir.path())
        .env("VPN_ROTATOR_CONFIG_DIR", dir.path())
        .env("NO_COLOR", "1")
        .env_remove("JOURNAL_STREAM")
        .output()
        .expect("failed to run vpn-rotator binary")
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    let output = rotator(&dir, &["--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["run", "ip", "profiles", "stop", "init"] {
        assert!(stdout.contains(command), "help is missing {}", command);
    }
}

#[test]
fn test_init_writes_default_config_once() {
    let dir = TempDir::new().unwrap();

    let first = rotator(&dir, &["init"]);
    assert!(first.status.success());

    let written = fs::read_to_string(dir.path().join("config.toml")).unwrap();
    assert!(written.contains("[rotation]"));
    assert!(written.contains("node-dk-03.protonvpn.net.tcp"));

    let second = rotator(&dir, &["init"]);
    assert_eq!(second.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&second.stderr);
    assert!(stderr.contains("--force"), "unexpected stderr: {}", stderr);

    let forced = rotator(&dir, &["init", "--force"]);
    assert!(forced.status.success());
}

#[test]
fn test_profiles_lists_rotation_order() {
    let dir = TempDir::new().unwrap();
    let profile_dir = dir.path().join("ovpn");
    fs::create_dir_all(&profile_dir).unwrap();
    fs::write(profile_dir.join("b.ovpn"), "client\n").unwrap();
    fs::write(
        dir.path().join("config.toml"),
        format!(
            "[rotation]\nprofiles = [\"b\", \"a\"]\nprofile_dir = \"{}\"\n",
            profile_dir.display()
        ),
    )
    .unwrap();

    let output = rotator(&dir, &["profiles"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let b = stdout.find("b (").expect("profile b listed");
    let a = stdout.find("a (").expect("profile a listed");
    assert!(b < a, "profiles must be listed in rotation order: {}", stdout);
    assert!(stdout.contains("✓"));
    assert!(stdout.contains("✗"));
}

#[test]
fn test_ip_fails_with_1_when_oracle_unreachable() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("config.toml"),
        "[oracle]\nendpoint = \"http://127.0.0.1:9/ip\"\ntimeout_secs = 1\n",
    )
    .unwrap();

    let output = rotator(&dir, &["ip"]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("IP oracle error"), "unexpected stderr: {}", stderr);
}
