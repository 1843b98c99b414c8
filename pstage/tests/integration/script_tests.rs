use crate::common::{StagingEnv, assert_contains, init_test_logging};
use pstage_common::plan::CONTROL_SCRIPTS;
use std::path::PathBuf;

fn scripts_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("ibmi")
}

fn read_upper(name: &str) -> String {
    std::fs::read_to_string(scripts_dir().join(name))
        .unwrap_or_else(|e| panic!("cannot read {name}: {e}"))
        .to_uppercase()
}

#[test]
fn test_every_control_script_is_shipped() {
    init_test_logging();
    for name in CONTROL_SCRIPTS {
        assert!(scripts_dir().join(name).is_file(), "missing ibmi/{name}");
    }
}

#[test]
fn test_sql_scripts_are_fully_qualified() {
    init_test_logging();
    crate::test_log!("TEST START: test_sql_scripts_are_fully_qualified");

    let setup = read_upper("setup.sql");
    let apply = read_upper("apply.sql");
    let teardown = read_upper("teardown.sql");

    assert_contains(&setup, "CREATE SCHEMA IF NOT EXISTS &LIB_STG");
    for content in [&setup, &apply] {
        assert_contains(content, "SET SCHEMA &LIB_STG");
    }
    assert_contains(&teardown, "DROP SCHEMA IF EXISTS &LIB_STG");
    crate::test_log!("TEST PASS: test_sql_scripts_are_fully_qualified");
}

#[test]
fn test_process_program_writes_status_marker() {
    let process = read_upper("process.clp");
    assert_contains(&process, "PGM        PARM(&LIB &BASE &OUTQ)");
    assert_contains(&process, "/RUN/PROCESS.STATUS");
    assert_contains(&process, "FAILED:");
}

#[test]
fn test_dry_run_sync_with_shipped_scripts() {
    init_test_logging();

    let env = StagingEnv::new();
    let output = env
        .command()
        .arg("--file")
        .arg(&env.csv)
        .arg("--scripts-dir")
        .arg(scripts_dir())
        .args(["--dry-run", "--sync", "--json"])
        .output()
        .expect("Failed to run pstage");

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["scripts_synced"], 4);
}
