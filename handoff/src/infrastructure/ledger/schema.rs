// /////////////////////////////////////////////////////////////////////////////
// Handoff Buffer Manager
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Ledger schema management: pool connection plus `initdb`/`dropdb` support.
//!
//! Table creation is idempotent so `initdb` can be re-run safely on an
//! existing ledger.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info};

use handoff_domain::{HandoffError, Result};

use super::db_err;
use crate::infrastructure::config::DatabaseConfig;

const CREATE_FILES: &str = r#"
CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    relpath TEXT NOT NULL,
    filename TEXT NOT NULL,
    checksum TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    created_on TEXT NOT NULL,
    held_on TEXT,
    deleted_on TEXT
)
"#;

const CREATE_FILES_IDENTITY_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_files_identity ON files(relpath, filename, checksum)
"#;

const CREATE_BATCHES: &str = r#"
CREATE TABLE IF NOT EXISTS transfer_batches (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    pre_start_time TEXT,
    pre_duration REAL,
    trans_start_time TEXT,
    trans_duration REAL,
    post_start_time TEXT,
    post_duration REAL,
    size_bytes INTEGER,
    rate_mbytes_per_sec REAL,
    status INTEGER NOT NULL,
    err_msg TEXT
)
"#;

const CREATE_ASSOCIATION: &str = r#"
CREATE TABLE IF NOT EXISTS file_transfer_attempts (
    files_id INTEGER NOT NULL REFERENCES files(id),
    batch_id INTEGER NOT NULL REFERENCES transfer_batches(id)
)
"#;

/// Opens the connection pool described by the `database` section.
///
/// The database file is created on first use; a connection string the driver
/// cannot parse is a configuration error.
pub async fn connect(config: &DatabaseConfig) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.engine)
        .map_err(|e| HandoffError::invalid_config(format!("database engine '{}': {e}", config.engine)))?
        .create_if_missing(true);

    let mut pool_options = SqlitePoolOptions::new();
    if let Some(limit) = config.max_connections {
        pool_options = pool_options.max_connections(limit);
    }

    let pool = pool_options.connect_with(options).await.map_err(db_err)?;
    debug!(engine = %config.engine, "connected to ledger");
    Ok(pool)
}

/// Creates the ledger tables (idempotent).
pub async fn create_tables(pool: &SqlitePool) -> Result<()> {
    for statement in [
        CREATE_FILES,
        CREATE_FILES_IDENTITY_INDEX,
        CREATE_BATCHES,
        CREATE_ASSOCIATION,
    ] {
        sqlx::query(statement).execute(pool).await.map_err(db_err)?;
    }
    info!("ledger tables are in place");
    Ok(())
}

/// Drops the ledger tables (idempotent).
pub async fn drop_tables(pool: &SqlitePool) -> Result<()> {
    for statement in [
        "DROP TABLE IF EXISTS file_transfer_attempts",
        "DROP TABLE IF EXISTS transfer_batches",
        "DROP TABLE IF EXISTS files",
    ] {
        sqlx::query(statement).execute(pool).await.map_err(db_err)?;
    }
    info!("ledger tables removed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_pool() -> SqlitePool {
        // One connection: every connection to :memory: is its own database.
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    async fn table_count(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' \
             AND name IN ('files', 'transfer_batches', 'file_transfer_attempts')",
        )
        .fetch_one(pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_tables_is_idempotent() {
        let pool = memory_pool().await;
        create_tables(&pool).await.unwrap();
        create_tables(&pool).await.unwrap();
        assert_eq!(table_count(&pool).await, 3);
    }

    #[tokio::test]
    async fn test_drop_tables_removes_everything() {
        let pool = memory_pool().await;
        create_tables(&pool).await.unwrap();
        drop_tables(&pool).await.unwrap();
        assert_eq!(table_count(&pool).await, 0);
        // Dropping again must not fail.
        drop_tables(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_creates_missing_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let config = DatabaseConfig {
            engine: format!("sqlite://{}", path.display()),
            max_connections: Some(2),
            echo: false,
        };
        let pool = connect(&config).await.unwrap();
        create_tables(&pool).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_engine() {
        let config = DatabaseConfig {
            engine: "postgres://not-sqlite".to_string(),
            max_connections: None,
            echo: false,
        };
        let err = connect(&config).await.unwrap_err();
        assert_eq!(err.category(), "configuration");
    }
}
