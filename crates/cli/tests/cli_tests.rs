//! CLI integration tests

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn calib(args: &[&str]) -> Output {
    Command::new("cargo")
        .args(["run", "-q", "-p", "calib-cli", "--"])
        .args(args)
        .env("NO_COLOR", "1")
        .env_remove("CALIB_RESULTS")
        .output()
        .expect("Failed to execute command")
}

fn write_results(dir: &Path) -> String {
    let path = dir.join("rps_calibration_results.csv");
    std::fs::write(
        &path,
        "run_id,language,configuration,endpoint,container_id,host,port,\
         reached_target,targetRPS,final_load,avgCPUUsage\n\
         r1,python,flask-standard,json,a,python-flask-standard,8080,true,1000,1000,76.5\n\
         r1,python,flask-otel,json,b,python-flask-otel,8080,true,800,800,77.0\n\
         r2,python,flask-otel,json,b,python-flask-otel,8080,true,900,900,78.0\n\
         r1,go,otel,db,c,go-otel,8080,false,0,5100,61.2\n",
    )
    .unwrap();
    path.to_string_lossy().into_owned()
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = calib(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(
        stdout.contains("RPS calibration results"),
        "Should show app description"
    );
    assert!(stdout.contains("stats"), "Should show stats command");
    assert!(stdout.contains("overhead"), "Should show overhead command");
    assert!(stdout.contains("scenarios"), "Should show scenarios command");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = calib(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("calib"), "Should show binary name");
}

/// Test global options
#[test]
fn test_global_options() {
    let output = calib(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.contains("--format"), "Should show format option");
    assert!(stdout.contains("table"), "Should show table format");
    assert!(stdout.contains("json"), "Should show json format");
    assert!(stdout.contains("--results"), "Should show results option");
    assert!(stdout.contains("CALIB_RESULTS"), "Should show env var");
}

/// Test stats subcommand help
#[test]
fn test_stats_help() {
    let output = calib(&["stats", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Stats help should succeed");
    assert!(stdout.contains("--language"), "Should show language option");
}

/// Test stats as JSON over a results file
#[test]
fn test_stats_json() {
    let dir = TempDir::new().unwrap();
    let results = write_results(dir.path());

    let output = calib(&["--results", &results, "--format", "json", "stats"]);
    assert!(output.status.success(), "Stats should succeed");

    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let stats = stats.as_array().unwrap();
    assert_eq!(stats.len(), 3);

    let otel_json = stats
        .iter()
        .find(|s| s["configuration"] == "flask-otel")
        .unwrap();
    assert_eq!(otel_json["runs"], 2);
    assert_eq!(otel_json["mean_target_rps"], 850.0);
    assert_eq!(otel_json["min_target_rps"], 800);
}

/// Test stats language filter
#[test]
fn test_stats_language_filter() {
    let dir = TempDir::new().unwrap();
    let results = write_results(dir.path());

    let output = calib(&["--results", &results, "-f", "json", "stats", "--language", "go"]);
    assert!(output.status.success(), "Filtered stats should succeed");

    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stats.as_array().unwrap().len(), 1);
    assert_eq!(stats[0]["endpoint"], "db");
}

/// Test overhead comparison as JSON
#[test]
fn test_overhead_json() {
    let dir = TempDir::new().unwrap();
    let results = write_results(dir.path());

    let output = calib(&["--results", &results, "--format", "json", "overhead"]);
    assert!(output.status.success(), "Overhead should succeed");

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let python_json = report["per_endpoint"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["language"] == "python")
        .unwrap();
    assert_eq!(python_json["standard"], 1000.0);
    assert_eq!(python_json["otel"], 850.0);
    assert_eq!(python_json["otel_vs_standard"], -15.0);
    assert!(python_json["elastic"].is_null());
}

/// Test overhead table rendering
#[test]
fn test_overhead_table() {
    let dir = TempDir::new().unwrap();
    let results = write_results(dir.path());

    let output = calib(&["--results", &results, "overhead"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Overhead table should succeed");
    assert!(stdout.contains("OTel vs Std"), "Should show comparison column");
    assert!(stdout.contains("-15.0%"), "Should show relative difference");
    assert!(stdout.contains("overall"), "Should show overall rows");
}

/// Test scenarios listing
#[test]
fn test_scenarios() {
    let output = calib(&["scenarios", "--language", "java"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Scenarios should succeed");
    assert!(stdout.contains("java-spring-otel"), "Should show hostname");
    assert!(!stdout.contains("python"), "Should filter languages");
}

/// Test missing results file error handling
#[test]
fn test_missing_results_file() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.csv");

    let output = calib(&["--results", &missing.to_string_lossy(), "stats"]);

    assert!(!output.status.success(), "Missing results file should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("failed to read results"),
        "Should show error message"
    );
}

/// Test invalid command error handling
#[test]
fn test_invalid_command() {
    let output = calib(&["invalid-command"]);

    assert!(!output.status.success(), "Invalid command should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("error") || stderr.contains("invalid"),
        "Should show error message"
    );
}
