//! Integration tests for the wg-netns binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn wg_netns() -> Command {
    let mut cmd = Command::cargo_bin("wg-netns").unwrap();
    cmd.env_remove("WG_VERBOSE")
        .env_remove("WG_PROFILE_DIR")
        .env_remove("WG_NETNS_DIR")
        .env_remove("WG_SHELL");
    cmd
}

#[test]
fn test_help_lists_commands() {
    wg_netns()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("up"))
        .stdout(predicate::str::contains("down"))
        .stdout(predicate::str::contains("WG_PROFILE_DIR"));
}

#[test]
fn test_missing_profile_is_a_config_error() {
    let temp = tempdir().unwrap();
    wg_netns()
        .env("WG_PROFILE_DIR", temp.path())
        .args(["up", "no-such-profile"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::starts_with("error: profile not found"))
        .stderr(predicate::str::contains("(ConfigError)"));
}

#[test]
fn test_unsupported_key_is_reported() {
    let temp = tempdir().unwrap();
    std::fs::write(
        temp.path().join("wg0.conf"),
        "[Interface]\nAddress = 10.0.0.2/24\nSaveConfig = true\n",
    )
    .unwrap();

    wg_netns()
        .env("WG_PROFILE_DIR", temp.path())
        .args(["down", "--force", "wg0"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unsupported interface key 'SaveConfig'"));
}

#[test]
fn test_invalid_verbose_setting() {
    wg_netns()
        .env("WG_VERBOSE", "yes")
        .args(["up", "anything"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("WG_VERBOSE"))
        .stderr(predicate::str::contains("(EnvironmentError)"));
}

#[test]
fn test_subcommand_required() {
    wg_netns().assert().failure();
}
