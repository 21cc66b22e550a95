//! CLI integration tests

use std::process::Command;

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = Command::new("cargo")
        .args(["run", "-p", "allocbench-cli", "--", "--help"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(
        stdout.contains("adaptive resource allocation"),
        "Should show app description"
    );
    assert!(stdout.contains("track"), "Should show track command");
    assert!(stdout.contains("compare"), "Should show compare command");
    assert!(stdout.contains("inspect"), "Should show inspect command");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = Command::new("cargo")
        .args(["run", "-p", "allocbench-cli", "--", "--version"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("allocbench"), "Should show binary name");
}

/// Test track idle subcommand help
#[test]
fn test_track_idle_help() {
    let output = Command::new("cargo")
        .args(["run", "-p", "allocbench-cli", "--", "track", "idle", "--help"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Track idle help should succeed");
    assert!(stdout.contains("--duration"), "Should show duration option");
    assert!(stdout.contains("--interval"), "Should show interval option");
    assert!(stdout.contains("--request"), "Should show request option");
    assert!(stdout.contains("--limit"), "Should show limit option");
    assert!(
        stdout.contains("--no-cleanup"),
        "Should show no-cleanup option"
    );
    assert!(
        stdout.contains("ALLOCBENCH_NAMESPACE"),
        "Should show namespace env var"
    );
}

/// Test track vpa subcommand help
#[test]
fn test_track_vpa_help() {
    let output = Command::new("cargo")
        .args(["run", "-p", "allocbench-cli", "--", "track", "vpa", "--help"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Track vpa help should succeed");
    assert!(stdout.contains("--mode"), "Should show mode option");
}

/// Test compare command help
#[test]
fn test_compare_help() {
    let output = Command::new("cargo")
        .args(["run", "-p", "allocbench-cli", "--", "compare", "--help"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Compare help should succeed");
    assert!(stdout.contains("--field"), "Should show field option");
    assert!(stdout.contains("limit"), "Should show limit field value");
    assert!(
        stdout.contains("--stats-only"),
        "Should show stats-only option"
    );
    assert!(stdout.contains("--output"), "Should show output option");
}

/// Test inspect command help
#[test]
fn test_inspect_help() {
    let output = Command::new("cargo")
        .args(["run", "-p", "allocbench-cli", "--", "inspect", "--help"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Inspect help should succeed");
    assert!(stdout.contains("artifacts"), "Should show default directory");
}

/// Test invalid command error handling
#[test]
fn test_invalid_command() {
    let output = Command::new("cargo")
        .args(["run", "-p", "allocbench-cli", "--", "invalid-command"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success(), "Invalid command should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("error") || stderr.contains("invalid"),
        "Should show error message"
    );
}

/// Test missing required argument error handling
#[test]
fn test_missing_argument() {
    let output = Command::new("cargo")
        .args(["run", "-p", "allocbench-cli", "--", "compare"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success(), "Missing argument should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("required") || stderr.contains("error"),
        "Should show error about missing argument"
    );
}
