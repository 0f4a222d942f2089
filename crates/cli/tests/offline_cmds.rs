//! CLI tests for the commands that need no control server: `parse` and `format`.

use std::fs;
use std::io::Write;
use std::process::{Command, Stdio};

use assert_cmd::cargo;

fn dsf_cmd() -> Command {
    Command::new(cargo::cargo_bin!("dsf"))
}

fn write_temp_gcode(content: &str) -> (tempfile::TempDir, String) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("job.g");
    fs::write(&path, content).expect("write temp gcode");
    (dir, path.to_string_lossy().to_string())
}

fn run_with_stdin(args: &[&str], stdin_body: &str) -> std::process::Output {
    let mut child = dsf_cmd()
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn dsf command");

    {
        let stdin = child.stdin.as_mut().expect("stdin handle");
        stdin
            .write_all(stdin_body.as_bytes())
            .expect("write stdin body");
    }

    child.wait_with_output().expect("wait for output")
}

fn json_lines(stdout: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("valid JSON line"))
        .collect()
}

// ── parse ───────────────────────────────────────────────────────────────

#[test]
fn parse_json_reports_each_statement() {
    let (_dir, path) = write_temp_gcode("G1 X10 Y20.5\n\nM106 S255 ;fan\n");
    let output = dsf_cmd()
        .args(["parse", &path, "--output", "json"])
        .output()
        .expect("run parse");
    assert!(
        output.status.success(),
        "stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );

    let lines = json_lines(&output.stdout);
    assert_eq!(lines.len(), 2, "blank lines are skipped");
    assert_eq!(lines[0]["line"], 1);
    assert_eq!(lines[0]["code"]["type"], "G");
    assert_eq!(lines[0]["code"]["majorNumber"], 1);
    assert_eq!(lines[0]["code"]["parameters"][1]["letter"], "Y");
    assert_eq!(lines[1]["line"], 3);
    assert_eq!(lines[1]["code"]["comment"], "fan");
}

#[test]
fn parse_supports_stdin_dash_path() {
    let output = run_with_stdin(&["parse", "-", "--output", "json"], "M115\n");
    assert!(output.status.success());
    let lines = json_lines(&output.stdout);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["code"]["type"], "M");
    assert_eq!(lines[0]["code"]["majorNumber"], 115);
}

#[test]
fn parse_failure_exits_nonzero() {
    let (_dir, path) = write_temp_gcode("G28\nM117 \"oops\n");
    let output = dsf_cmd()
        .args(["parse", &path, "--output", "json"])
        .output()
        .expect("run parse");
    assert!(!output.status.success());

    let lines = json_lines(&output.stdout);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].get("error").is_none());
    assert_eq!(lines[1]["line"], 2);
    assert_eq!(lines[1]["error"], "unterminated string parameter");
}

#[test]
fn parse_pretty_lists_parameters() {
    let (_dir, path) = write_temp_gcode("G1 X10 Y20.5\n");
    let output = dsf_cmd()
        .args(["parse", &path, "--output", "pretty"])
        .output()
        .expect("run parse");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("1: G1 X10 Y20.5\n"), "stdout={stdout}");
    assert!(stdout.contains("integer"), "stdout={stdout}");
    assert!(stdout.contains("float"), "stdout={stdout}");
}

// ── format ──────────────────────────────────────────────────────────────

#[test]
fn format_normalizes_whitespace() {
    let (_dir, path) = write_temp_gcode("G1   X10    Y20.5\n\nM106  S255 ;fan\n");
    let output = dsf_cmd()
        .args(["format", &path])
        .output()
        .expect("run format");
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "G1 X10 Y20.5\n\nM106 S255 ;fan\n"
    );
}

#[test]
fn format_keeps_indentation_and_line_numbers() {
    let (_dir, path) = write_temp_gcode("if state.status == \"idle\"\n  N10 G28   X\n");
    let output = dsf_cmd()
        .args(["format", &path])
        .output()
        .expect("run format");
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "if state.status == \"idle\"\n  N10 G28 X\n"
    );
}

#[test]
fn format_check_detects_unformatted_input() {
    let (_dir, path) = write_temp_gcode("G28   X\n");
    let output = dsf_cmd()
        .args(["format", &path, "--check"])
        .output()
        .expect("run format --check");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("is not formatted"));

    let (_dir, path) = write_temp_gcode("G28 X\n");
    let output = dsf_cmd()
        .args(["format", &path, "--check"])
        .output()
        .expect("run format --check");
    assert!(output.status.success());
}

#[test]
fn format_write_rewrites_file() {
    let (_dir, path) = write_temp_gcode("M104   S200\n");
    let output = dsf_cmd()
        .args(["format", &path, "--write"])
        .output()
        .expect("run format --write");
    assert!(output.status.success());
    assert_eq!(fs::read_to_string(&path).unwrap(), "M104 S200\n");
}

#[test]
fn format_keeps_unparseable_lines_verbatim() {
    let (_dir, path) = write_temp_gcode("G28\nM117 \"oops\n");
    let output = dsf_cmd()
        .args(["format", &path])
        .output()
        .expect("run format");
    assert!(!output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "G28\nM117 \"oops\n");
    assert!(String::from_utf8_lossy(&output.stderr).contains("unterminated string parameter"));
}

#[test]
fn format_write_rejects_stdin() {
    let output = run_with_stdin(&["format", "-", "--write"], "G28\n");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--write needs a file"));
}
