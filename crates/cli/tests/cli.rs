use std::process::{Command, Output};

use aquabridge_network::Network;

fn default_peers(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_default-peers"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

#[test]
fn test_prints_every_relay() {
    for network in Network::ALL {
        let out = default_peers(&[network.name()]);
        assert!(out.status.success());
        let stdout = String::from_utf8(out.stdout).unwrap();
        let lines: Vec<&str> = stdout.lines().collect();
        assert_eq!(lines, network.multiaddrs());
    }
}

#[test]
fn test_missing_argument() {
    let out = default_peers(&[]);
    assert_eq!(out.status.code(), Some(1));
    assert!(out.stdout.is_empty());
    assert_eq!(
        String::from_utf8(out.stderr).unwrap().trim_end(),
        "Expected at least one argument (krasnodar, stage, testnet)"
    );
}

#[test]
fn test_unknown_network() {
    let out = default_peers(&["mainnet"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(out.stdout.is_empty());
    assert_eq!(
        String::from_utf8(out.stderr).unwrap().trim_end(),
        "Invalid argument. Expected one of: krasnodar, stage, testnet"
    );
}

#[test]
fn test_bad_flag_exits_one() {
    let out = default_peers(&["--bogus"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(!out.stderr.is_empty());
}

#[test]
fn test_help_exits_zero() {
    let out = default_peers(&["--help"]);
    assert!(out.status.success());
    assert!(String::from_utf8(out.stdout).unwrap().contains("default-peers"));
}
