use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn redscout_doctor_reports_booleans_only() {
    let bin = assert_cmd::cargo::cargo_bin!("redscout");
    let out = std::process::Command::new(bin)
        .args(["doctor"])
        .env("REDSCOUT_ZAI_API_KEY", "sk-secret-value")
        .env_remove("ZAI_API_KEY")
        .env_remove("REDSCOUT_ZAI_ENDPOINT")
        .env_remove("REDSCOUT_ZAI_MODEL")
        .env_remove("REDSCOUT_ENV_FILE")
        .output()
        .expect("run redscout doctor");

    assert!(out.status.success(), "redscout doctor failed");
    let s = String::from_utf8_lossy(&out.stdout);
    assert!(!s.contains("sk-secret-value"), "doctor must not print secrets");
    let v: serde_json::Value = serde_json::from_str(&s).expect("parse doctor json");

    assert_eq!(v["schema_version"].as_u64(), Some(1));
    assert_eq!(v["name"].as_str(), Some("redscout"));
    assert_eq!(v["ok"].as_bool(), Some(true));
    assert!(v.get("elapsed_ms").is_some());
    assert_eq!(v["configured"]["zai"]["api_key"].as_bool(), Some(true));
    assert_eq!(v["configured"]["zai"]["model"].as_str(), Some("glm-4.7"));
    assert_eq!(
        v["configured"]["zai"]["endpoint_override"].as_bool(),
        Some(false)
    );

    let checks = v["checks"].as_array().expect("checks array");
    let names: Vec<&str> = checks.iter().filter_map(|c| c["name"].as_str()).collect();
    assert_eq!(names, vec!["zai_api_key", "zai_endpoint"]);
}

#[test]
fn redscout_doctor_flags_missing_key_and_bad_endpoint() {
    let bin = assert_cmd::cargo::cargo_bin!("redscout");
    let out = std::process::Command::new(bin)
        .args(["doctor"])
        .env_remove("REDSCOUT_ZAI_API_KEY")
        .env_remove("ZAI_API_KEY")
        .env_remove("REDSCOUT_ENV_FILE")
        .env("REDSCOUT_ZAI_ENDPOINT", "ftp://example.com/chat")
        .output()
        .expect("run redscout doctor");

    assert!(out.status.success(), "redscout doctor failed");
    let v: serde_json::Value =
        serde_json::from_slice(&out.stdout).expect("parse doctor json");
    assert_eq!(v["ok"].as_bool(), Some(false));
    assert_eq!(v["configured"]["zai"]["api_key"].as_bool(), Some(false));
    let checks = v["checks"].as_array().expect("checks array");
    assert!(checks.iter().all(|c| c["ok"].as_bool() == Some(false)));
    assert!(checks[1]["error"].as_str().unwrap_or("").contains("ftp"));
}

#[test]
fn redscout_doctor_text_output_contract() {
    Command::new(assert_cmd::cargo::cargo_bin!("redscout"))
        .args(["doctor", "--output", "text"])
        .env_remove("REDSCOUT_ZAI_API_KEY")
        .env_remove("ZAI_API_KEY")
        .env_remove("REDSCOUT_ENV_FILE")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("redscout "))
        .stdout(predicate::str::contains("checks:"))
        .stdout(predicate::str::contains("- zai_api_key: fail"));
}

#[test]
fn env_file_fills_missing_vars_without_overriding() {
    let tmp = tempfile::tempdir().unwrap();
    let env_file = tmp.path().join("redscout.env");
    std::fs::write(
        &env_file,
        "# local keys\nREDSCOUT_ZAI_API_KEY=from-file\nREDSCOUT_ZAI_MODEL = glm-4-air\n\nnot a pair\n",
    )
    .unwrap();

    let out = std::process::Command::new(assert_cmd::cargo::cargo_bin!("redscout"))
        .args(["doctor"])
        .env("REDSCOUT_ENV_FILE", &env_file)
        .env_remove("REDSCOUT_ZAI_API_KEY")
        .env_remove("ZAI_API_KEY")
        .env_remove("REDSCOUT_ZAI_ENDPOINT")
        .env("REDSCOUT_ZAI_MODEL", "glm-4-plus")
        .output()
        .expect("run redscout doctor");

    assert!(out.status.success());
    let s = String::from_utf8_lossy(&out.stdout);
    assert!(!s.contains("from-file"));
    let v: serde_json::Value = serde_json::from_str(&s).expect("parse doctor json");
    assert_eq!(v["configured"]["zai"]["api_key"].as_bool(), Some(true));
    assert_eq!(v["configured"]["zai"]["model"].as_str(), Some("glm-4-plus"));
    assert_eq!(v["configured"]["env_file"].as_bool(), Some(true));
}
