// /////////////////////////////////////////////////////////////////////////////
// Handoff Buffer Manager
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! CLI surface tests, driving the compiled `handoffd` binary.
//!
//! Exit-code contract under test: 0 success, 1 configuration error,
//! 2 runtime failure.

use std::fs;
use std::path::Path;
use std::process::Command;

fn handoffd() -> Command {
    Command::new(env!("CARGO_BIN_EXE_handoffd"))
}

fn write_config(dir: &Path, ledger: &Path, transfer: &str) -> std::path::PathBuf {
    let buffer = dir.join("buffer");
    let holding = dir.join("holding");
    fs::create_dir_all(&buffer).unwrap();
    fs::create_dir_all(&holding).unwrap();

    let config = format!(
        r#"
handoff:
  buffer: {buffer}
  holding: {holding}
endpoint:
  user: tester
  host: localhost
  buffer: /remote/buffer
  commands:
    remote: "ssh {{user}}@{{host}} {{command}}"
    transfer: "{transfer}"
database:
  engine: "sqlite://{ledger}"
logging:
  level: warn
"#,
        buffer = buffer.display(),
        holding = holding.display(),
        ledger = ledger.display(),
    );
    let path = dir.join("handoff.yaml");
    fs::write(&path, config).unwrap();
    path
}

#[test]
fn validate_accepts_a_sound_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), &dir.path().join("ledger.db"), "scp {batch} {user}@{host}:{dest}");

    let status = handoffd().arg("validate").arg(&config).status().unwrap();
    assert_eq!(status.code(), Some(0));
}

#[test]
fn validate_rejects_a_broken_transfer_template() {
    let dir = tempfile::tempdir().unwrap();
    // No {batch}/{file} placeholder.
    let config = write_config(dir.path(), &dir.path().join("ledger.db"), "scp {user}@{host}:{dest}");

    let output = handoffd().arg("validate").arg(&config).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(!output.stderr.is_empty());
}

#[test]
fn validate_rejects_a_missing_file() {
    let status = handoffd()
        .arg("validate")
        .arg("/no/such/config.yaml")
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(1));
}

#[tokio::test]
async fn initdb_and_dropdb_manage_the_ledger_tables() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = dir.path().join("ledger.db");
    let config = write_config(dir.path(), &ledger, "scp {batch} {user}@{host}:{dest}");

    let status = handoffd().arg("initdb").arg(&config).status().unwrap();
    assert_eq!(status.code(), Some(0));
    assert!(ledger.exists());

    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&format!("sqlite://{}", ledger.display()))
        .await
        .unwrap();
    let tables: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' \
         AND name IN ('files', 'transfer_batches', 'file_transfer_attempts')",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(tables, 3);
    pool.close().await;

    let status = handoffd().arg("dropdb").arg(&config).status().unwrap();
    assert_eq!(status.code(), Some(0));

    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&format!("sqlite://{}", ledger.display()))
        .await
        .unwrap();
    let tables: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(tables, 0);
}

#[test]
fn run_without_initdb_is_a_runtime_failure() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), &dir.path().join("ledger.db"), "scp {batch} {user}@{host}:{dest}");

    let output = handoffd().arg("run").arg(&config).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("initdb"), "stderr was: {stderr}");
}
