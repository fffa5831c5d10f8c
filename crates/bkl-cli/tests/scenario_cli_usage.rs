//! Argument handling and DB-free command paths. These run unconditionally.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use uuid::Uuid;

#[test]
fn help_lists_all_command_groups() -> anyhow::Result<()> {
    let mut cmd = assert_cmd::Command::cargo_bin("bkl")?;
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("db"))
        .stdout(predicate::str::contains("user"))
        .stdout(predicate::str::contains("order"))
        .stdout(predicate::str::contains("config"));
    Ok(())
}

#[test]
fn order_show_rejects_malformed_uuid_before_touching_db() -> anyhow::Result<()> {
    let mut cmd = assert_cmd::Command::cargo_bin("bkl")?;
    // No DB env: the uuid must be rejected before any connection attempt.
    cmd.env_remove(bkl_db::ENV_DB_URL)
        .args(["order", "show", "not-a-uuid"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("invalid order_id uuid"));
    Ok(())
}

#[test]
fn db_status_requires_database_url() -> anyhow::Result<()> {
    let mut cmd = assert_cmd::Command::cargo_bin("bkl")?;
    cmd.env_remove(bkl_db::ENV_DB_URL).args(["db", "status"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("BKL_DATABASE_URL"));
    Ok(())
}

#[test]
fn config_hash_merges_layers_and_prints_hash() -> anyhow::Result<()> {
    let dir = std::env::temp_dir().join(format!("bkl_cli_cfg_{}", Uuid::new_v4().simple()));
    std::fs::create_dir_all(&dir)?;
    let base = dir.join("base.yaml");
    let overlay = dir.join("overlay.yaml");
    std::fs::write(&base, "service:\n  name: backline\n  port: 8780\n")?;
    std::fs::write(&overlay, "service:\n  port: 9000\n")?;

    let mut cmd = assert_cmd::Command::cargo_bin("bkl")?;
    cmd.args([
        "config",
        "hash",
        base.to_str().unwrap(),
        overlay.to_str().unwrap(),
    ]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("config_hash="))
        .stdout(predicate::str::contains("\"port\":9000"));

    std::fs::remove_dir_all(&dir)?;
    Ok(())
}

#[test]
fn config_hash_refuses_inline_secret() -> anyhow::Result<()> {
    let dir = std::env::temp_dir().join(format!("bkl_cli_sec_{}", Uuid::new_v4().simple()));
    std::fs::create_dir_all(&dir)?;
    let cfg = dir.join("bad.yaml");
    std::fs::write(&cfg, "db:\n  password: hunter2\n")?;

    let mut cmd = assert_cmd::Command::cargo_bin("bkl")?;
    cmd.args(["config", "hash", cfg.to_str().unwrap()]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG_SECRET_DETECTED"))
        .stderr(predicate::str::contains("hunter2").not());

    std::fs::remove_dir_all(&dir)?;
    Ok(())
}
