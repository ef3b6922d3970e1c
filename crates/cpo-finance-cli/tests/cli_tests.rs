//! Integration tests for the `cpo` binary.
use assert_cmd::cargo_bin_cmd;
use predicates::prelude::*;
use rust_decimal::Decimal;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

// ===========================================================================
// Fixtures
// ===========================================================================

const ANALYSIS_INPUT: &str = r#"{
    "name": "Lungomare",
    "stations": [{
        "name": "Lungomare 1",
        "investment": {"equipment": "10000", "installation": "5000"},
        "profile": {
            "sessions_per_day": "5",
            "kwh_per_session": "15",
            "price_per_kwh": "0.45",
            "energy_cost_per_kwh": "0.25"
        }
    }],
    "macro_params": {"years": 10, "discount_rate": "0.05"}
}"#;

fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

/// Decimal fields serialize as strings; compare them by value.
fn decimal(value: &Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

fn json_stdout(args: &[&str]) -> Value {
    let output = cargo_bin_cmd!("cpo").args(args).output().unwrap();
    assert!(output.status.success(), "cpo {args:?} failed: {output:?}");
    serde_json::from_slice(&output.stdout).unwrap()
}

// ===========================================================================
// Commands
// ===========================================================================

#[test]
fn check_version_command() {
    cargo_bin_cmd!("cpo")
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("cpo "));
}

#[test]
fn check_amortize_with_flags() {
    let value = json_stdout(&[
        "amortize",
        "--principal",
        "100000",
        "--rate",
        "5",
        "--years",
        "10",
    ]);
    assert_eq!(decimal(&value["result"]["periodic_payment"]), Decimal::new(1295046, 2));
    assert_eq!(value["result"]["entries"].as_array().unwrap().len(), 10);
}

#[test]
fn check_amortize_minimal_output() {
    cargo_bin_cmd!("cpo")
        .args([
            "amortize",
            "--principal",
            "100000",
            "--rate",
            "5",
            "--years",
            "10",
            "--output",
            "minimal",
        ])
        .assert()
        .success()
        .stdout("12950.46\n");
}

#[test]
fn check_revenue_from_stdin() {
    let input = r#"{"profile": {"sessions_per_day": 5, "kwh_per_session": 15,
        "price_per_kwh": "0.45", "energy_cost_per_kwh": "0.25"}}"#;
    cargo_bin_cmd!("cpo")
        .args(["revenue", "--output", "minimal"])
        .write_stdin(input)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("12318.75"));
}

#[test]
fn check_analyze_command() {
    let dir = tempdir().unwrap();
    let input = write_file(dir.path(), "analysis.json", ANALYSIS_INPUT);
    let value = json_stdout(&["analyze", "--input", &input.to_string_lossy()]);
    let result = &value["result"];
    assert_eq!(decimal(&result["investment_total"]), Decimal::new(15000, 0));
    assert_eq!(result["cash_flows"].as_array().unwrap().len(), 11);
    assert_eq!(decimal(&result["metrics"]["payback_years"]), Decimal::new(302, 2));
}

#[test]
fn check_analyze_yaml_input() {
    let dir = tempdir().unwrap();
    let yaml = "\
name: Lungomare
stations:
  - name: Lungomare 1
    investment:
      equipment: \"10000\"
      installation: \"5000\"
    profile:
      sessions_per_day: \"5\"
      kwh_per_session: \"15\"
      price_per_kwh: \"0.45\"
      energy_cost_per_kwh: \"0.25\"
macro_params:
  years: 10
  discount_rate: \"0.05\"
";
    let input = write_file(dir.path(), "analysis.yaml", yaml);
    let value = json_stdout(&["analyze", "--input", &input.to_string_lossy()]);
    assert_eq!(decimal(&value["result"]["investment_total"]), Decimal::new(15000, 0));
}

#[test]
fn check_analyze_seed_enables_simulation() {
    let dir = tempdir().unwrap();
    let input = write_file(dir.path(), "analysis.json", ANALYSIS_INPUT);
    let path = input.to_string_lossy();
    let first = json_stdout(&["analyze", "--input", &path, "--seed", "11"]);
    let second = json_stdout(&["analyze", "--input", &path, "--seed", "11"]);
    assert!(first["result"]["failures"].is_object());
    assert_eq!(first["result"], second["result"]);
}

#[test]
fn check_config_file_applies() {
    let dir = tempdir().unwrap();
    let input = write_file(
        dir.path(),
        "analysis.json",
        &ANALYSIS_INPUT.replace(r#", "discount_rate": "0.05""#, ""),
    );
    let config = write_file(dir.path(), "engine.toml", "discount_rate = \"0\"\n");
    let value = json_stdout(&[
        "analyze",
        "--input",
        &input.to_string_lossy(),
        "--config",
        &config.to_string_lossy(),
    ]);
    // Undiscounted: ten years of 4975 less the investment
    assert_eq!(decimal(&value["result"]["metrics"]["npv"]), Decimal::new(34750, 0));
}

#[test]
fn check_sensitivity_from_bare_analysis() {
    let dir = tempdir().unwrap();
    let input = write_file(dir.path(), "analysis.json", ANALYSIS_INPUT);
    let value = json_stdout(&["sensitivity", "--input", &input.to_string_lossy()]);
    let scenarios = value["result"]["scenarios"].as_array().unwrap();
    assert_eq!(scenarios.len(), 3);
    assert_eq!(value["result"]["base_scenario"], "base");
}

#[test]
fn check_csv_output_has_cash_flow_rows() {
    let dir = tempdir().unwrap();
    let input = write_file(dir.path(), "analysis.json", ANALYSIS_INPUT);
    let output = cargo_bin_cmd!("cpo")
        .args(["analyze", "--input", &input.to_string_lossy(), "--output", "csv"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).unwrap();
    let mut lines = text.lines();
    let header = lines.next().unwrap();
    assert!(header.split(',').any(|h| h == "period"));
    assert_eq!(lines.count(), 11);
}

// ===========================================================================
// Errors
// ===========================================================================

#[test]
fn check_missing_input_file() {
    cargo_bin_cmd!("cpo")
        .args(["analyze", "--input", "does-not-exist.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("File not found"));
}

#[test]
fn check_invalid_input_reports_field() {
    let dir = tempdir().unwrap();
    let input = write_file(
        dir.path(),
        "analysis.json",
        &ANALYSIS_INPUT.replace(r#""years": 10"#, r#""years": 0"#),
    );
    cargo_bin_cmd!("cpo")
        .args(["analyze", "--input", &input.to_string_lossy()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("macro_params.years"));
}

#[test]
fn check_unsupported_config_format() {
    let dir = tempdir().unwrap();
    let config = write_file(dir.path(), "engine.ini", "discount_rate=0");
    cargo_bin_cmd!("cpo")
        .args(["amortize", "--principal", "1000", "--rate", "5", "--years", "2"])
        .args(["--config", &config.to_string_lossy()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported config format"));
}
