// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end tests against the compiled `scd` binary: its CLI contract
//! (§6) and a live round trip over its Unix socket. Scenarios that
//! exercise an actual container (mount roundtrip, env precedence, cgroups
//! and device-mode monotonicity, the network allow-list, manifest parse
//! failure) are covered at the component level inside `sc-engine` and
//! `sc-core`, against `sc-adapters`' fake driver/netlink client, where
//! they don't depend on a host with LXC and iptables installed.

use std::path::PathBuf;
use std::time::Duration;

use assert_cmd::Command as AssertCommand;
use assert_cmd::cargo::cargo_bin;
use serial_test::serial;
use tempfile::TempDir;

fn scd_path() -> PathBuf {
    cargo_bin("scd")
}

#[test]
fn help_exits_zero_and_describes_the_flags() {
    let output = std::process::Command::new(scd_path())
        .arg("--help")
        .output()
        .expect("run scd --help");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--preload"));
    assert!(stdout.contains("--shutdown"));
}

#[test]
fn version_exits_zero() {
    AssertCommand::new(scd_path()).arg("--version").assert().success();
}

#[test]
fn an_unrecognized_flag_exits_with_code_one() {
    AssertCommand::new(scd_path()).arg("--not-a-real-flag").assert().failure().code(1);
}

#[test]
fn a_non_boolean_shutdown_value_exits_with_code_one() {
    AssertCommand::new(scd_path())
        .args(["--shutdown", "maybe"])
        .assert()
        .failure()
        .code(1);
}

/// Spawns `scd` against a scratch workspace root with no preload pool (so
/// it never touches the real LXC/netlink drivers) and confirms it answers
/// Ping over its Unix socket, then stops cleanly on SIGTERM.
#[tokio::test]
#[serial]
async fn daemon_serves_ping_over_its_unix_socket_and_stops_on_sigterm() {
    let root = TempDir::new().expect("tempdir");
    let socket_path = root.path().join("agent.sock");

    let mut child = tokio::process::Command::new(scd_path())
        .args(["--preload", "0"])
        .env("SC_WORKSPACE_ROOT", root.path())
        .spawn()
        .expect("spawn scd");

    wait_for_socket(&socket_path).await;

    let mut stream = tokio::net::UnixStream::connect(&socket_path)
        .await
        .expect("connect to agent socket");
    let request = sc_daemon::protocol::encode(&sc_daemon::Request::Ping).expect("encode ping");
    sc_daemon::protocol::write_message(&mut stream, &request)
        .await
        .expect("write ping");
    let reply = sc_daemon::protocol::read_message(&mut stream)
        .await
        .expect("read pong");
    let response: sc_daemon::Response = sc_daemon::protocol::decode(&reply).expect("decode pong");
    assert!(matches!(response, sc_daemon::Response::Pong));
    drop(stream);

    signal_child(&child);
    let status = tokio::time::timeout(Duration::from_secs(5), child.wait())
        .await
        .expect("scd exited after SIGTERM")
        .expect("wait on scd");
    assert!(status.success());
}

async fn wait_for_socket(path: &std::path::Path) {
    for _ in 0..100 {
        if path.exists() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("scd never created its socket at {}", path.display());
}

fn signal_child(child: &tokio::process::Child) {
    let pid = child.id().expect("child still running");
    let _ = std::process::Command::new("kill").args(["-TERM", &pid.to_string()]).status();
}
