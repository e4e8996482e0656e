// /////////////////////////////////////////////////////////////////////////////
// Handoff Buffer Manager
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Ledger Repository
//!
//! All SQL the pipeline runs against the ledger, in one place. The tracker
//! and recorder commit in chunk-sized transactions: a failed commit rolls
//! back the whole chunk and the affected files are simply rediscovered on a
//! later cycle, which is what makes ledger failures benign.
//!
//! Timestamps are stored as RFC 3339 TEXT, durations as REAL seconds.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use handoff_domain::{Result, TransferRecord};

use super::{db_err, schema};
use crate::infrastructure::config::DatabaseConfig;

/// Converts a fractional epoch timestamp into a UTC datetime.
///
/// Values outside chrono's representable range collapse to "now"; they can
/// only come from a clock that is itself broken.
pub fn datetime_from_epoch(secs: f64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs.trunc() as i64, (secs.fract() * 1e9) as u32).unwrap_or_else(Utc::now)
}

fn rfc3339(datetime: &DateTime<Utc>) -> String {
    datetime.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn epoch_to_rfc3339(secs: Option<f64>) -> Option<String> {
    secs.map(|s| rfc3339(&datetime_from_epoch(s)))
}

/// A persisted file entry.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FileRow {
    pub id: i64,
    pub relpath: String,
    pub filename: String,
    pub checksum: String,
    pub size_bytes: i64,
    pub created_on: String,
    pub held_on: Option<String>,
    pub deleted_on: Option<String>,
}

/// A file about to be tracked for the first time.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub relpath: String,
    pub filename: String,
    pub checksum: String,
    pub size_bytes: i64,
    pub created_on: DateTime<Utc>,
}

/// A pending `held_on` stamp for the latest row matching `(relpath, filename)`.
#[derive(Debug, Clone)]
pub struct HeldUpdate {
    pub relpath: String,
    pub filename: String,
    pub held_on: DateTime<Utc>,
}

/// Handle on the persistent file/batch ledger.
#[derive(Debug, Clone)]
pub struct Ledger {
    pool: SqlitePool,
    echo: bool,
}

impl Ledger {
    /// Wraps an existing pool.
    pub fn new(pool: SqlitePool, echo: bool) -> Self {
        Self { pool, echo }
    }

    /// Connects using the `database` configuration section.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = schema::connect(config).await?;
        Ok(Self::new(pool, config.echo))
    }

    /// The underlying pool, for schema management and tests.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn trace(&self, sql: &str) {
        if self.echo {
            debug!(target: "handoff::sql", statement = sql, "executing");
        }
    }

    /// Whether a file with this exact identity is already tracked.
    pub async fn is_tracked(&self, relpath: &str, filename: &str, checksum: &str) -> Result<bool> {
        let sql = "SELECT id FROM files WHERE relpath = ? AND filename = ? AND checksum = ? LIMIT 1";
        self.trace(sql);
        let row: Option<i64> = sqlx::query_scalar(sql)
            .bind(relpath)
            .bind(filename)
            .bind(checksum)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.is_some())
    }

    /// Inserts a chunk of newly discovered files in one transaction.
    pub async fn insert_files(&self, rows: &[NewFile]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let sql = "INSERT INTO files (relpath, filename, checksum, size_bytes, created_on) VALUES (?, ?, ?, ?, ?)";
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for row in rows {
            self.trace(sql);
            sqlx::query(sql)
                .bind(&row.relpath)
                .bind(&row.filename)
                .bind(&row.checksum)
                .bind(row.size_bytes)
                .bind(rfc3339(&row.created_on))
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)
    }

    /// Id of the most recently created row matching `(relpath, filename)`.
    ///
    /// A file recreated with different content has several rows; the latest
    /// one is the row transfers should attach to.
    pub async fn latest_file_id(&self, relpath: &str, filename: &str) -> Result<Option<i64>> {
        let sql = "SELECT id FROM files WHERE relpath = ? AND filename = ? ORDER BY id DESC LIMIT 1";
        self.trace(sql);
        sqlx::query_scalar(sql)
            .bind(relpath)
            .bind(filename)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    /// Persists a chunk of transfer records with their file associations in
    /// one transaction.
    pub async fn record_batches(&self, batches: &[(TransferRecord, Vec<i64>)]) -> Result<()> {
        if batches.is_empty() {
            return Ok(());
        }
        let insert_batch = "INSERT INTO transfer_batches \
             (pre_start_time, pre_duration, trans_start_time, trans_duration, \
              post_start_time, post_duration, size_bytes, rate_mbytes_per_sec, status, err_msg) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";
        let insert_link = "INSERT INTO file_transfer_attempts (files_id, batch_id) VALUES (?, ?)";

        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for (record, file_ids) in batches {
            self.trace(insert_batch);
            let inserted = sqlx::query(insert_batch)
                .bind(epoch_to_rfc3339(record.pre_start))
                .bind(record.pre_duration)
                .bind(epoch_to_rfc3339(record.trans_start))
                .bind(record.trans_duration)
                .bind(epoch_to_rfc3339(record.post_start))
                .bind(record.post_duration)
                .bind(record.size as i64)
                .bind(record.rate)
                .bind(record.status)
                .bind(record.error.as_ref().map(|e| e.trim().to_string()))
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
            let batch_id = inserted.last_insert_rowid();

            for file_id in file_ids {
                self.trace(insert_link);
                sqlx::query(insert_link)
                    .bind(file_id)
                    .bind(batch_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
            }
        }
        tx.commit().await.map_err(db_err)
    }

    /// Stamps `held_on` on the latest row of each `(relpath, filename)` pair
    /// in one transaction.
    pub async fn mark_held(&self, updates: &[HeldUpdate]) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }
        let sql = "UPDATE files SET held_on = ? WHERE id = \
             (SELECT id FROM files WHERE relpath = ? AND filename = ? ORDER BY id DESC LIMIT 1)";
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for update in updates {
            self.trace(sql);
            sqlx::query(sql)
                .bind(rfc3339(&update.held_on))
                .bind(&update.relpath)
                .bind(&update.filename)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)
    }

    /// All file rows, oldest first. Used by audits and tests.
    pub async fn files(&self) -> Result<Vec<FileRow>> {
        let sql = "SELECT * FROM files ORDER BY id";
        self.trace(sql);
        sqlx::query_as(sql).fetch_all(&self.pool).await.map_err(db_err)
    }

    /// Statuses of all recorded batches, oldest first.
    pub async fn batch_statuses(&self) -> Result<Vec<(i64, i32)>> {
        let sql = "SELECT id, status FROM transfer_batches ORDER BY id";
        self.trace(sql);
        sqlx::query_as(sql).fetch_all(&self.pool).await.map_err(db_err)
    }

    /// File ids associated with a batch.
    pub async fn batch_file_ids(&self, batch_id: i64) -> Result<Vec<i64>> {
        let sql = "SELECT files_id FROM file_transfer_attempts WHERE batch_id = ? ORDER BY files_id";
        self.trace(sql);
        sqlx::query_scalar(sql)
            .bind(batch_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)
    }
}
