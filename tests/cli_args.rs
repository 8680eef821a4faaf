//! Integration tests for command-line handling
//!
//! Runs the binary with flags that exit before the server binds.

use std::process::Command;

/// Helper to run the binary with given args and capture output
fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_btcprice"))
        .args(args)
        .env_remove("PORT")
        .env_remove("LOG_FORMAT")
        .env_remove("UPSTREAM_TIMEOUT_SECS")
        .output()
        .expect("Failed to execute btcprice")
}

#[test]
fn test_help_flag_exits_successfully() {
    let output = run_cli(&["--help"]);
    assert!(output.status.success(), "Expected --help to exit successfully");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("btcprice"), "Help should mention btcprice");
    assert!(stdout.contains("--port"), "Help should mention --port");
    assert!(stdout.contains("--db-path"), "Help should mention --db-path");
}

#[test]
fn test_help_does_not_print_api_key() {
    let output = Command::new(env!("CARGO_BIN_EXE_btcprice"))
        .arg("--help")
        .env("COINGECKO_API_KEY", "super-secret-key")
        .output()
        .expect("Failed to execute btcprice");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("super-secret-key"));
}

#[test]
fn test_zero_port_prints_error_and_exits() {
    let output = run_cli(&["--port", "0", "--db-path", "unused.db"]);
    assert!(!output.status.success(), "Expected port 0 to fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid port"), "Unexpected stderr: {}", stderr);
}

#[test]
fn test_invalid_log_format_prints_error_and_exits() {
    let output = run_cli(&["--log-format", "xml", "--db-path", "unused.db"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("xml"), "Unexpected stderr: {}", stderr);
}

#[test]
fn test_non_numeric_port_is_rejected_by_parser() {
    let output = run_cli(&["--port", "http"]);
    assert!(!output.status.success());
}
