#![cfg(all(unix, feature = "cli"))]

use std::net::{SocketAddr, TcpListener, UdpSocket};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const INPUT: &str = "6ba7b810-9dad-11d1-80b4-00c04fd430c8";
const OUTPUT: &str = "6ba7b811-9dad-11d1-80b4-00c04fd430c8";

fn free_tcp_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .expect("ephemeral tcp port")
        .port()
}

fn free_udp_port() -> u16 {
    UdpSocket::bind("127.0.0.1:0")
        .and_then(|s| s.local_addr())
        .expect("ephemeral udp port")
        .port()
}

fn wait_for_listener(addr: SocketAddr, timeout: Duration) {
    let start = Instant::now();
    loop {
        if std::net::TcpStream::connect(addr).is_ok() {
            return;
        }
        if start.elapsed() >= timeout {
            panic!("bridge never started listening on {addr}");
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn ringbridge() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ringbridge"));
    cmd.arg("--log-level").arg("error");
    cmd
}

fn spawn_bridge(listen: SocketAddr, collector: SocketAddr, run_for: &str) -> Child {
    ringbridge()
        .arg("--format")
        .arg("json")
        .arg("run")
        .arg("--listen")
        .arg(listen.to_string())
        .arg("--collector")
        .arg(collector.to_string())
        .arg("--egress-interval")
        .arg("20ms")
        .arg("--loopback")
        .arg(format!("{INPUT}={OUTPUT}"))
        .arg("--run-for")
        .arg(run_for)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("run should start")
}

#[test]
fn version_prints_package_version() {
    let output = ringbridge().arg("version").output().expect("version should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.trim(),
        format!("ringbridge {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn forward_to_closed_port_fails() {
    let port = free_tcp_port();
    let output = ringbridge()
        .arg("forward")
        .arg("--addr")
        .arg(format!("127.0.0.1:{port}"))
        .arg("--stream-id")
        .arg(INPUT)
        .arg("--data")
        .arg("x")
        .arg("--timeout")
        .arg("1s")
        .output()
        .expect("forward should run");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("connect failed"));
}

#[test]
fn forward_rejects_oversized_payload() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
    let addr = listener.local_addr().expect("local addr");

    let output = ringbridge()
        .arg("forward")
        .arg("--addr")
        .arg(addr.to_string())
        .arg("--stream-id")
        .arg(INPUT)
        .arg("--data")
        .arg("x".repeat(2000))
        .output()
        .expect("forward should run");

    assert_eq!(output.status.code(), Some(60));
}

#[test]
fn run_with_missing_config_file_fails() {
    let output = ringbridge()
        .arg("run")
        .arg("--config")
        .arg("/nonexistent/ringbridge.json")
        .output()
        .expect("run should start");

    assert_eq!(output.status.code(), Some(40));
}

#[test]
fn forwarded_frame_reaches_collector_through_loopback() {
    let listen = SocketAddr::from(([127, 0, 0, 1], free_tcp_port()));
    let collector_addr = SocketAddr::from(([127, 0, 0, 1], free_udp_port()));

    let collector = ringbridge()
        .arg("--format")
        .arg("json")
        .arg("collect")
        .arg("--bind")
        .arg(collector_addr.to_string())
        .arg("--count")
        .arg("1")
        .arg("--idle-timeout")
        .arg("10s")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("collect should start");

    let bridge = spawn_bridge(listen, collector_addr, "3s");
    wait_for_listener(listen, Duration::from_secs(5));

    let forward = ringbridge()
        .arg("--format")
        .arg("json")
        .arg("forward")
        .arg("--addr")
        .arg(listen.to_string())
        .arg("--stream-id")
        .arg(INPUT)
        .arg("--json")
        .arg("{\"seq\":1}")
        .output()
        .expect("forward should run");
    assert!(forward.status.success());

    let collected = collector.wait_with_output().expect("collect should finish");
    assert!(collected.status.success());
    let line = String::from_utf8_lossy(&collected.stdout);
    let datagram: serde_json::Value =
        serde_json::from_str(line.trim()).expect("collect should emit json");
    assert_eq!(datagram["stream_id"], OUTPUT);
    assert_eq!(datagram["payload"], "{\"seq\":1}");

    let ran = bridge.wait_with_output().expect("run should finish");
    assert!(ran.status.success());
    let stdout = String::from_utf8_lossy(&ran.stdout);
    let summary: serde_json::Value = stdout
        .lines()
        .filter_map(|line| serde_json::from_str::<serde_json::Value>(line).ok())
        .find(|value| value["event"] == "stopped")
        .expect("run should print a summary");
    assert_eq!(summary["bridge"]["frames_dispatched"], 1);
    assert_eq!(summary["buffers"]["leaked"], 0);
}
