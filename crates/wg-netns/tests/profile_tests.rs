//! Integration tests for profile loading.

use std::path::{Path, PathBuf};

use wg_netns::profile::{HookItem, load_profile};
use wg_netns_common::{ErrorKind, NetnsError, NetnsPaths};

fn fixtures() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn paths() -> NetnsPaths {
    NetnsPaths::with_dirs(fixtures(), "/nonexistent/netns")
}

#[test]
fn test_yaml_and_json_agree() {
    let yaml = load_profile(&fixtures().join("wg0ns.yaml"), &paths()).unwrap();
    let json = load_profile(&fixtures().join("wg0ns.json"), &paths()).unwrap();
    assert_eq!(yaml, json);
}

#[test]
fn test_legacy_matches_structured() {
    let legacy = load_profile(&fixtures().join("wg0.conf"), &paths()).unwrap();
    let structured = load_profile(&fixtures().join("wg0.yaml"), &paths()).unwrap();
    assert_eq!(legacy, structured);
}

#[test]
fn test_bare_name_searches_profile_dir() {
    // wg0.yaml wins over wg0.conf
    let namespace = load_profile(Path::new("wg0"), &paths()).unwrap();
    assert_eq!(namespace.name, "wg0");
    assert_eq!(namespace.interfaces[0].listen_port, 51820);

    let namespace = load_profile(Path::new("wg0ns"), &paths()).unwrap();
    assert_eq!(namespace.name, "wg0ns");
}

#[test]
fn test_example_profile() {
    let namespace = load_profile(&fixtures().join("ns-example.yaml"), &paths()).unwrap();

    assert_eq!(namespace.name, "ns-example");
    assert_eq!(namespace.dns_server, ["10.10.10.1", "10.10.10.2"]);
    assert_eq!(namespace.interfaces.len(), 2);
    assert_eq!(
        namespace.hooks.post_up.as_ref().unwrap().items,
        vec![
            HookItem::on_host("some shell command"),
            HookItem::in_namespace("some shell command"),
        ]
    );

    let site_b = &namespace.interfaces[1];
    assert_eq!(site_b.listen_port, 51821);
    assert_eq!(site_b.fwmark, 21);
    assert_eq!(site_b.peers[0].route_networks(), ["10.10.12.0/24".to_string()]);
    assert_eq!(
        namespace.interfaces[0].peers[0].route_networks(),
        ["10.10.0.0/16".to_string(), "fc00:dead:beef:1::/64".to_string()]
    );
}

#[test]
fn test_save_config_rejected() {
    let path = fixtures().join("saveconfig.conf");
    let err = load_profile(&path, &paths()).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Config);
    assert!(matches!(err, NetnsError::UnsupportedKey { .. }));
    assert_eq!(
        err.to_string(),
        format!("unsupported interface key 'SaveConfig' at {}:4", path.display())
    );
}

#[test]
fn test_unsupported_extension() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("vpn.toml");
    std::fs::write(&path, "name = 'vpn'\n").unwrap();

    let err = load_profile(&path, &paths()).unwrap_err();
    assert!(matches!(err, NetnsError::UnsupportedFormat { .. }));
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn test_missing_profile() {
    let err = load_profile(Path::new("does-not-exist"), &paths()).unwrap_err();
    assert!(matches!(err, NetnsError::ProfileNotFound { .. }));
}
