//! CLI tests for the commands that talk to a control server, run against a
//! scripted mock server on a temporary Unix socket.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixListener;
use std::path::PathBuf;
use std::process::{Command, Output};
use std::thread;
use std::time::Duration;

use assert_cmd::cargo;

fn dsf_cmd() -> Command {
    Command::new(cargo::cargo_bin!("dsf"))
}

// ── Mock control server ─────────────────────────────────────────────────

enum Step {
    /// Write a message to the client.
    Push(&'static str),
    /// Read one line from the client.
    Expect,
}

use Step::{Expect, Push};

struct MockServer {
    _dir: tempfile::TempDir,
    path: PathBuf,
    handle: thread::JoinHandle<Vec<String>>,
}

impl MockServer {
    fn start(script: Vec<Step>) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("dcs.sock");
        let listener = UnixListener::bind(&path).expect("bind mock socket");

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept client");
            stream
                .set_read_timeout(Some(Duration::from_secs(10)))
                .expect("set timeout");
            let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
            let mut received = Vec::new();
            for step in script {
                match step {
                    Push(msg) => {
                        if stream.write_all(msg.as_bytes()).is_err() {
                            break;
                        }
                    }
                    Expect => {
                        let mut line = String::new();
                        if reader.read_line(&mut line).unwrap_or(0) == 0 {
                            break;
                        }
                        received.push(line.trim_end().to_string());
                    }
                }
            }
            received
        });

        Self {
            _dir: dir,
            path,
            handle,
        }
    }

    fn run(&self, args: &[&str]) -> Output {
        dsf_cmd()
            .arg("--socket")
            .arg(&self.path)
            .args(args)
            .output()
            .expect("run dsf")
    }

    fn received(self) -> Vec<String> {
        self.handle.join().expect("mock server thread")
    }
}

const INIT: &str = r#"{"version":11,"id":7}"#;
const OK: &str = r#"{"success":true}"#;

// ── Command mode ────────────────────────────────────────────────────────

#[test]
fn send_prints_reply() {
    let server = MockServer::start(vec![
        Push(INIT),
        Expect,
        Push(OK),
        Expect,
        Push(r#"{"result":"FIRMWARE_NAME: RepRapFirmware for Duet 3\n","success":true}"#),
    ]);
    let output = server.run(&["send", "M115", "--output", "pretty"]);
    assert!(
        output.status.success(),
        "stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "FIRMWARE_NAME: RepRapFirmware for Duet 3\n"
    );

    let received = server.received();
    assert_eq!(received[0], r#"{"mode":"Command","version":11}"#);
    assert_eq!(
        received[1],
        r#"{"command":"SimpleCode","Code":"M115","Channel":"SBC"}"#
    );
}

#[test]
fn send_on_another_channel() {
    let server = MockServer::start(vec![
        Push(INIT),
        Expect,
        Push(OK),
        Expect,
        Push(r#"{"result":"","success":true}"#),
    ]);
    let output = server.run(&["send", "G28", "--channel", "http", "--output", "json"]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "\"\"\n");
    assert_eq!(
        server.received()[1],
        r#"{"command":"SimpleCode","Code":"G28","Channel":"HTTP"}"#
    );
}

#[test]
fn model_prints_object_model() {
    let server = MockServer::start(vec![
        Push(INIT),
        Expect,
        Push(OK),
        Expect,
        Push(r#"{"result":{"state":{"status":"idle"}},"success":true}"#),
    ]);
    let output = server.run(&["model", "--output", "json"]);
    assert!(output.status.success());
    let model: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("object model JSON");
    assert_eq!(model["state"]["status"], "idle");
    assert_eq!(server.received()[1], r#"{"command":"GetObjectModel"}"#);
}

#[test]
fn server_error_is_reported() {
    let server = MockServer::start(vec![
        Push(INIT),
        Expect,
        Push(OK),
        Expect,
        Push(r#"{"success":false,"errorType":"InvalidOperationException","errorMessage":"busy"}"#),
    ]);
    let output = server.run(&["send", "M999"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to execute M999"), "stderr={stderr}");
    server.received();
}

#[test]
fn incompatible_server_is_reported() {
    let server = MockServer::start(vec![Push(r#"{"version":9,"id":1}"#), Expect]);
    let output = server.run(&["send", "M115"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to connect to the control server"), "stderr={stderr}");
    assert!(server.received().is_empty());
}

#[test]
fn missing_socket_is_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = dsf_cmd()
        .arg("--socket")
        .arg(dir.path().join("nope.sock"))
        .args(["send", "M115"])
        .output()
        .expect("run dsf");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to connect"));
}

// ── Streaming modes ─────────────────────────────────────────────────────

#[test]
fn subscribe_prints_updates_and_acknowledges() {
    let server = MockServer::start(vec![
        Push(INIT),
        Expect,
        Push(OK),
        Push(r#"{"state":{"status":"idle"}}"#),
        Expect,
        Push(r#"{"state":{"status":"busy"}}"#),
        Expect,
    ]);
    let output = server.run(&["subscribe", "--count", "2", "--output", "json"]);
    assert!(
        output.status.success(),
        "stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    let updates: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("update JSON"))
        .collect();
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0]["kind"], "full");
    assert_eq!(updates[1]["kind"], "patch");
    assert_eq!(updates[1]["value"]["state"]["status"], "busy");

    let received = server.received();
    assert!(received[0].starts_with(r#"{"mode":"Subscribe","version":11,"SubscriptionMode":"Patch""#));
    assert_eq!(&received[1..], [r#"{"command":"Acknowledge"}"#; 2]);
}

#[test]
fn intercept_resolves_listed_codes() {
    let server = MockServer::start(vec![
        Push(INIT),
        Expect,
        Push(OK),
        Push(r#"{"type":"M","channel":"HTTP","majorNumber":1234,"flags":0}"#),
        Expect,
        Push(r#"{"result":true,"success":true}"#),
        Expect,
        Push(r#"{"type":"G","channel":"File","majorNumber":28,"flags":0}"#),
        Expect,
    ]);
    let output = server.run(&[
        "intercept",
        "--resolve",
        "M1234",
        "--filter",
        "M1234",
        "--filter",
        "G28",
        "--message",
        "done",
        "--count",
        "2",
        "--output",
        "json",
    ]);
    assert!(
        output.status.success(),
        "stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    let decisions: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("decision JSON"))
        .collect();
    assert_eq!(decisions[0]["code"], "M1234");
    assert_eq!(decisions[0]["decision"], "resolved");
    assert_eq!(decisions[1]["code"], "G28");
    assert_eq!(decisions[1]["decision"], "ignored");

    let received = server.received();
    assert!(received[0].contains(r#""Filters":["M1234","G28"]"#), "{}", received[0]);
    assert_eq!(received[1], r#"{"command":"Flush","Channel":"HTTP"}"#);
    assert_eq!(received[2], r#"{"command":"Resolve","Type":0,"Content":"done"}"#);
    assert_eq!(received[3], r#"{"command":"Ignore"}"#);
}
