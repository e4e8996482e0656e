// /////////////////////////////////////////////////////////////////////////////
// Handoff Buffer Manager
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Queue Messages
//!
//! Specifications of the messages allowed in inter-stage communication.
//!
//! Two value records flow through the pipeline queues: [`FileItem`] describes
//! a single file somewhere under a root directory, and [`TransferRecord`]
//! describes one transfer attempt for a batch of files. Both are plain
//! records with mostly-optional fields; each pipeline stage populates the
//! fields it is responsible for and leaves the rest untouched:
//!
//! ```text
//! Finder    -> FileItem { head, tail, name, size, timestamp(mtime) }
//! Porter    -> TransferRecord { timings, size, rate, status, error, files }
//! Recorder  -> FileItem { head, tail, name }           (successful members)
//! Mover     -> rewrites FileItem { head, timestamp }   (now in holding)
//! ```

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Subprocess exit-status sentinels recorded in transfer records.
///
/// Values other than [`SUCCESS`](status::SUCCESS) deliberately mirror the
/// errno-derived codes the transfer tooling has always reported, so existing
/// monitoring keeps working.
pub mod status {
    /// The command completed with exit status zero.
    pub const SUCCESS: i32 = 0;

    /// The command ran but exited non-zero (remote I/O failure).
    pub const REMOTE_IO_ERROR: i32 = 121;

    /// The command exceeded the configured timeout and was killed.
    pub const TIMED_OUT: i32 = 62;

    /// The command could not be parsed or spawned at all.
    pub const EXEC_FAILED: i32 = 127;
}

/// Seconds since the Unix epoch, as a fractional value.
///
/// Used to stamp file events and transfer phase starts with a uniform clock.
pub fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

/// A message containing information about a file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileItem {
    /// Root directory of discovery (the buffer, later the holding area).
    pub head: PathBuf,

    /// Path to the file relative to `head`, excluding the filename. Empty for
    /// files sitting directly in the root.
    pub tail: String,

    /// File name, equivalent to `basename path`.
    pub name: String,

    /// File size in bytes.
    pub size: Option<u64>,

    /// Timestamp for an arbitrary file event: the mtime when discovered, the
    /// wall clock when moved into the holding area.
    pub timestamp: Option<f64>,
}

impl FileItem {
    /// Absolute path of the file: `head/tail/name`.
    pub fn path(&self) -> PathBuf {
        let mut path = self.head.clone();
        if !self.tail.is_empty() {
            path.push(&self.tail);
        }
        path.push(&self.name);
        path
    }
}

/// A message containing information about a transfer batch.
///
/// One record is created per batch attempt and never mutated after it has
/// been persisted. Every phase that was attempted has both its start and
/// duration populated; phases never reached stay `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferRecord {
    /// Timestamp showing when pre-transfer actions started.
    pub pre_start: Option<f64>,

    /// Duration of pre-transfer actions, in seconds.
    pub pre_duration: Option<f64>,

    /// Timestamp showing when the transfer started.
    pub trans_start: Option<f64>,

    /// Duration of the transfer, in seconds.
    pub trans_duration: Option<f64>,

    /// Timestamp showing when post-transfer actions started.
    pub post_start: Option<f64>,

    /// Cumulative duration of post-transfer actions, in seconds.
    pub post_duration: Option<f64>,

    /// Amount of data in the batch, in bytes.
    pub size: u64,

    /// Transfer rate in MB/s, populated only for successful transfers.
    pub rate: Option<f64>,

    /// Attempt status: 0 for success, a sentinel from [`status`] otherwise.
    pub status: i32,

    /// Trimmed stderr of the failing command, when there was one.
    pub error: Option<String>,

    /// Files in the batch as `(head, tail, name)` triples.
    pub files: Vec<(PathBuf, String, String)>,
}

impl TransferRecord {
    /// Whether the attempt completed successfully.
    pub fn succeeded(&self) -> bool {
        self.status == status::SUCCESS
    }
}
