use crate::common::{StagingEnv, assert_contains, init_test_logging};

#[test]
fn test_help_lists_staging_flags() {
    init_test_logging();
    crate::test_log!("TEST START: test_help_lists_staging_flags");

    let output = StagingEnv::new()
        .command()
        .arg("--help")
        .output()
        .expect("Failed to run pstage --help");

    assert!(output.status.success(), "pstage --help failed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_contains(&stdout, "Payroll staging hand-off");
    for flag in ["--file", "--sync", "--fetch-outputs", "--dry-run", "--timeout-seconds", "--teardown"] {
        assert_contains(&stdout, flag);
    }
    crate::test_log!("TEST PASS: test_help_lists_staging_flags");
}

#[test]
fn test_dry_run_succeeds_without_network() {
    init_test_logging();
    crate::test_log!("TEST START: test_dry_run_succeeds_without_network");

    let env = StagingEnv::new();
    let output = env
        .command()
        .arg("--file")
        .arg(&env.csv)
        .args(["--dry-run", "--sync"])
        .output()
        .expect("Failed to run pstage");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "dry run failed: {stderr}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_contains(&stdout, "DRY-RUN complete");
    assert_contains(&stdout, "/home/payroll/stage/in/payroll.csv");
    assert_eq!(
        std::fs::read_to_string(&env.csv).unwrap(),
        "employee,amount\n1001,2500.00\n"
    );
    crate::test_log!("TEST PASS: test_dry_run_succeeds_without_network");
}

#[test]
fn test_dry_run_json_report() {
    init_test_logging();
    crate::test_log!("TEST START: test_dry_run_json_report");

    let env = StagingEnv::new().set("JOBQ", "QBATCH");
    let output = env
        .command()
        .arg("--file")
        .arg(&env.csv)
        .args(["--dry-run", "--json"])
        .output()
        .expect("Failed to run pstage");

    assert!(output.status.success());
    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout is a JSON report");
    assert_eq!(report["dry_run"], true);
    assert_eq!(report["remote_csv"], "/home/payroll/stage/in/payroll.csv");
    assert_eq!(report["sha256"].as_str().map(str::len), Some(64));
    assert!(report["marker"].is_null());
    crate::test_log!("TEST PASS: test_dry_run_json_report");
}

#[test]
fn test_injection_in_library_is_rejected() {
    init_test_logging();
    crate::test_log!("TEST START: test_injection_in_library_is_rejected");

    let env = StagingEnv::new().set("LIB_STG", "PAYSTG;rm");
    let output = env
        .command()
        .arg("--file")
        .arg(&env.csv)
        .arg("--dry-run")
        .output()
        .expect("Failed to run pstage");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_contains(&stderr, "[PST-E002]");
    assert_contains(&stderr, "lib_stg");
    crate::test_log!("TEST PASS: test_injection_in_library_is_rejected");
}

#[test]
fn test_cli_override_is_validated_too() {
    init_test_logging();

    let env = StagingEnv::new();
    let output = env
        .command()
        .arg("--file")
        .arg(&env.csv)
        .args(["--dry-run", "--jobq", "QBATCH|x"])
        .output()
        .expect("Failed to run pstage");

    assert_eq!(output.status.code(), Some(1));
    assert_contains(&String::from_utf8_lossy(&output.stderr), "jobq");
}

#[test]
fn test_missing_settings_are_reported() {
    init_test_logging();
    crate::test_log!("TEST START: test_missing_settings_are_reported");

    let env = StagingEnv::new().unset("IBMI_HOST").unset("LIB_STG");
    let output = env
        .command()
        .arg("--file")
        .arg(&env.csv)
        .arg("--dry-run")
        .output()
        .expect("Failed to run pstage");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_contains(&stderr, "[PST-E001]");
    assert_contains(&stderr, "IBMI_HOST");
    assert_contains(&stderr, "LIB_STG");
    crate::test_log!("TEST PASS: test_missing_settings_are_reported");
}

#[test]
fn test_env_file_supplies_settings() {
    init_test_logging();

    let env = StagingEnv::new().unset("IFS_STAGING_DIR");
    std::fs::write(env.dir.path().join(".env"), "IFS_STAGING_DIR=/from/dotenv\n").unwrap();
    let output = env
        .command()
        .arg("--file")
        .arg(&env.csv)
        .arg("--dry-run")
        .output()
        .expect("Failed to run pstage");

    assert!(output.status.success());
    assert_contains(&String::from_utf8_lossy(&output.stdout), "/from/dotenv/in/payroll.csv");
}

#[test]
fn test_missing_input_file() {
    init_test_logging();

    let env = StagingEnv::new();
    let output = env
        .command()
        .args(["--file", "does-not-exist.csv", "--dry-run"])
        .output()
        .expect("Failed to run pstage");

    assert_eq!(output.status.code(), Some(1));
    assert_contains(&String::from_utf8_lossy(&output.stderr), "[PST-E400]");
}

#[test]
fn test_file_is_required_without_teardown() {
    init_test_logging();

    let output = StagingEnv::new()
        .command()
        .arg("--dry-run")
        .output()
        .expect("Failed to run pstage");

    assert_eq!(output.status.code(), Some(1));
    assert_contains(&String::from_utf8_lossy(&output.stderr), "--file");
}

#[test]
fn test_teardown_dry_run() {
    init_test_logging();
    crate::test_log!("TEST START: test_teardown_dry_run");

    let output = StagingEnv::new()
        .command()
        .args(["--teardown", "--dry-run"])
        .output()
        .expect("Failed to run pstage");

    assert!(output.status.success());
    assert_contains(&String::from_utf8_lossy(&output.stdout), "DRY-RUN teardown of PAYSTG");
    crate::test_log!("TEST PASS: test_teardown_dry_run");
}

#[test]
fn test_verbose_keeps_explicit_log_filter() {
    init_test_logging();
    crate::test_log!("TEST START: test_verbose_keeps_explicit_log_filter");

    let env = StagingEnv::new();
    let output = env
        .command()
        .arg("--file")
        .arg(&env.csv)
        .args(["--dry-run", "--verbose"])
        .output()
        .expect("Failed to run pstage");

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        !stderr.contains("Local SHA256"),
        "PSTAGE_LOG=warn was overridden by --verbose: {stderr}"
    );
    crate::test_log!("TEST PASS: test_verbose_keeps_explicit_log_filter");
}

#[test]
fn test_verbose_raises_default_level() {
    init_test_logging();

    let env = StagingEnv::new();
    let output = env
        .command()
        .env_remove("PSTAGE_LOG")
        .arg("--file")
        .arg(&env.csv)
        .args(["--dry-run", "--verbose"])
        .output()
        .expect("Failed to run pstage");

    assert!(output.status.success());
    assert_contains(&String::from_utf8_lossy(&output.stderr), "Local SHA256");
}
