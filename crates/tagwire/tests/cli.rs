#![cfg(all(unix, feature = "cli"))]

use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tagwire::peer::PeerConnector;

fn free_port() -> u16 {
    let spare = TcpListener::bind("127.0.0.1:0").expect("spare port should bind");
    spare.local_addr().expect("spare addr").port()
}

fn wait_for_connect(port: u16, timeout: Duration) {
    let start = Instant::now();
    loop {
        if PeerConnector::connect("127.0.0.1", port).is_ok() {
            return;
        }
        if start.elapsed() >= timeout {
            panic!("connect timeout");
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn spawn_echo(port: u16) -> Child {
    Command::new(env!("CARGO_BIN_EXE_tagwire"))
        .arg("--log-level")
        .arg("error")
        .arg("echo")
        .arg(format!("127.0.0.1:{port}"))
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .expect("echo command should start")
}

fn stop(mut child: Child) {
    let _ = child.kill();
    let _ = child.wait();
}

#[test]
fn send_wait_prints_echoed_wire_value() {
    let port = free_port();
    let child = spawn_echo(port);
    wait_for_connect(port, Duration::from_secs(3));

    let output = Command::new(env!("CARGO_BIN_EXE_tagwire"))
        .arg("--log-level")
        .arg("error")
        .arg("--format")
        .arg("json")
        .arg("send")
        .arg(format!("127.0.0.1:{port}"))
        .arg("--json")
        .arg(r#"{"a":{"_decode_type":"bytes","_content":"ff00"}}"#)
        .arg("--wait")
        .output()
        .expect("send command should run");
    stop(child);

    assert!(
        output.status.success(),
        "send failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let line = String::from_utf8(output.stdout).expect("stdout should be utf-8");
    let printed: serde_json::Value =
        serde_json::from_str(line.trim()).expect("output should be one JSON object");
    assert_eq!(printed["kind"], "json");
    assert_eq!(printed["value"]["a"]["_decode_type"], "bytes");
    assert_eq!(printed["value"]["a"]["_content"], "ff00");
    assert!(printed["payload_size"].as_u64().unwrap_or(0) > 0);
}

#[test]
fn send_to_closed_port_is_transport_error() {
    let port = free_port();
    let output = Command::new(env!("CARGO_BIN_EXE_tagwire"))
        .arg("--log-level")
        .arg("error")
        .arg("send")
        .arg(format!("127.0.0.1:{port}"))
        .arg("--json")
        .arg("1")
        .output()
        .expect("send command should run");

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("connect failed"), "stderr: {stderr}");
}

#[test]
fn send_rejects_invalid_json_payload() {
    let output = Command::new(env!("CARGO_BIN_EXE_tagwire"))
        .arg("send")
        .arg("127.0.0.1:1")
        .arg("--json")
        .arg("{not json")
        .output()
        .expect("send command should run");

    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn extended_version_reports_wire_details() {
    let output = Command::new(env!("CARGO_BIN_EXE_tagwire"))
        .arg("version")
        .arg("--extended")
        .output()
        .expect("version command should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("name: tagwire"));
    assert!(stdout.contains("length_prefix=u32be"));
    assert!(stdout.contains("features: peer=true"));
}
