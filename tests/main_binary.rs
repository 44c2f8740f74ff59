//! Integration tests for the `refjson` binary (src/main.rs).
//!
//! These tests invoke the compiled binary via `Command` and check exit codes and output.
//!
//! These tests are disabled under Miri and WASI because they spawn external processes.
#![cfg(all(feature = "cli", not(miri), not(target_os = "wasi")))]

use std::io::Write;
use std::process::Command;

/// Helper: run the binary with the given args and return (stdout, stderr, exit_code).
fn run_binary(args: &[&str]) -> (String, String, i32) {
    let bin = env!("CARGO_BIN_EXE_refjson");
    let output = Command::new(bin)
        .args(args)
        .output()
        .expect("failed to execute binary");
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);
    (stdout, stderr, code)
}

fn temp_file(content: &str) -> tempfile::NamedTempFile {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(content.as_bytes()).unwrap();
    tmp.flush().unwrap();
    tmp
}

#[test]
fn help_flag_prints_usage_and_exits_zero() {
    for flag in ["--help", "-h"] {
        let (stdout, _stderr, code) = run_binary(&[flag]);
        assert_eq!(code, 0);
        assert!(stdout.contains("usage: refjson"), "stdout: {stdout}");
    }
}

#[test]
fn no_args_prints_usage_to_stderr_and_exits_one() {
    let (_stdout, stderr, code) = run_binary(&[]);
    assert_eq!(code, 1);
    assert!(stderr.contains("usage: refjson"), "stderr: {stderr}");
}

#[test]
fn unknown_option_prints_error_and_exits_one() {
    let (_stdout, stderr, code) = run_binary(&["--bogus"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("unknown option --bogus"), "stderr: {stderr}");
}

#[test]
fn extra_argument_prints_error_and_exits_one() {
    let (_stdout, stderr, code) = run_binary(&["a.json", "b.json"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("unexpected extra argument b.json"), "stderr: {stderr}");
}

#[test]
fn missing_file_prints_error_and_exits_two() {
    let (_stdout, stderr, code) = run_binary(&["nonexistent_file_12345.json"]);
    assert_eq!(code, 2);
    assert!(stderr.contains("Failed to read"), "stderr: {stderr}");
}

#[test]
fn valid_file_is_echoed_in_canonical_form() {
    let tmp = temp_file("// shared node\n[{'@tag': 1, 'n': 1.0}, {\"@ref\": 1},]\n");
    let path = tmp.path().to_str().unwrap();
    let (stdout, stderr, code) = run_binary(&[path]);
    assert_eq!(code, 0, "stderr: {stderr}");
    assert_eq!(stdout.trim_end(), r#"[{"@tag":1,"n":1.0},{"@ref":1}]"#);
}

#[test]
fn pretty_and_unquoted_keys() {
    let tmp = temp_file("{a: [1, 2]}");
    let path = tmp.path().to_str().unwrap();
    let (stdout, stderr, code) = run_binary(&["--unquoted-keys", "--pretty", path]);
    assert_eq!(code, 0, "stderr: {stderr}");
    assert_eq!(stdout.trim_end(), "{\n  \"a\": [\n    1,\n    2\n  ]\n}");
}

#[test]
fn invalid_file_exits_three_with_snippet() {
    let tmp = temp_file("{\"a\": [1, 2}\n");
    let path = tmp.path().to_str().unwrap();
    let (_stdout, stderr, code) = run_binary(&[path]);
    assert_eq!(code, 3);
    assert!(stderr.contains("invalid"), "stderr: {stderr}");
    assert!(stderr.contains("[1, 2}"), "stderr: {stderr}");
}
