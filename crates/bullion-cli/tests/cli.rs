use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;

fn bullion() -> Command {
    Command::cargo_bin("bullion").unwrap()
}

#[test]
fn test_help_lists_commands() {
    bullion()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("monthly"))
        .stdout(predicate::str::contains("weekly"))
        .stdout(predicate::str::contains("open-interest"))
        .stdout(predicate::str::contains("paj"))
        .stdout(predicate::str::contains("extract"));
}

#[test]
fn test_config_init_then_get() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.json");
    let config = config.to_str().unwrap();

    bullion()
        .args(["config", "path", "--config", config])
        .assert()
        .success()
        .stdout(predicate::str::contains("not created"));

    bullion()
        .args(["config", "init", "--config", config])
        .assert()
        .success();

    bullion()
        .args(["config", "get", "fetch.workers", "--config", config])
        .assert()
        .success()
        .stdout(predicate::str::contains("8"));

    bullion()
        .args(["config", "init", "--config", config])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_config_report_prints_definition() {
    bullion()
        .args(["config", "report", "sge-weekly"])
        .assert()
        .success()
        .stdout(predicate::str::contains("this_week_inventory_kilograms"));
}

#[test]
fn test_extract_without_matches_fails() {
    let dir = tempfile::tempdir().unwrap();
    let pattern = dir.path().join("*.pdf");

    bullion()
        .args(["extract", pattern.to_str().unwrap(), "--report", "sge-monthly"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No matching files"));
}

#[test]
fn test_extract_daily_feed_writes_csv() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("kx20240308.dat"),
        r#"{"o_curinstrument": [
            {"PRODUCTID": "ag_f", "DELIVERYMONTH": "2404", "OPENINTEREST": 1000},
            {"PRODUCTID": "ag_f", "DELIVERYMONTH": "小计", "OPENINTEREST": 1600}
        ]}"#,
    )
    .unwrap();
    fs::write(dir.path().join("kx20240309.dat"), "").unwrap();
    let out_dir = dir.path().join("out");
    let pattern = dir.path().join("*.dat");

    bullion()
        .args([
            "extract",
            pattern.to_str().unwrap(),
            "--report",
            "shfe-open-interest",
            "--out-dir",
            out_dir.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("written 1"));

    let csv = fs::read_to_string(out_dir.join("shfe_silver_open_interest.csv")).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "trading_date,silver_total_open_interest,source");
    assert!(lines[1].starts_with("2024-03-08,1600.0,"));
    assert_eq!(lines.len(), 2);
}

#[test]
fn test_paj_saved_page_writes_both_tables() {
    let dir = tempfile::tempdir().unwrap();
    let page = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/paj_current_en_n2.html");
    let out_dir = dir.path().join("out");

    bullion()
        .args([
            "paj",
            "--html",
            page,
            "--format",
            "csv,json",
            "--out-dir",
            out_dir.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Found 5 tables"));

    let crude = fs::read_to_string(out_dir.join("paj_crude_oil.csv")).unwrap();
    assert_eq!(
        crude.lines().next(),
        Some("index,Current Week,Last Week,Change from Last Week")
    );
    assert!(crude.contains("Inventory,11234567.0,11500000.0,-265433.0"));

    let products = fs::read_to_string(out_dir.join("paj_petroleum_products.json")).unwrap();
    let rows: serde_json::Value = serde_json::from_str(&products).unwrap();
    assert_eq!(rows.as_array().unwrap().len(), 4);
    assert_eq!(rows[3]["index"], "Gas Oil");
    assert_eq!(rows[3]["sulfur"], "High");
}
