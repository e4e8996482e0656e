// /////////////////////////////////////////////////////////////////////////////
// Handoff Buffer Manager
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # The Ledger
//!
//! Persistent bookkeeping for files and transfer batches, backed by SQLite.
//!
//! Three tables:
//!
//! - `files` - one row per distinct `(relpath, filename, checksum)` identity
//!   ever seen in the buffer
//! - `transfer_batches` - one row per transfer attempt, success or failure
//! - `file_transfer_attempts` - the many-to-many association between them (a
//!   file appears in several batches when earlier attempts failed)
//!
//! The ledger is what lets the tracker re-recognize files across cycles and
//! restarts, and what downstream operators audit to answer "when did this
//! file actually leave the buffer".

pub mod repository;
pub mod schema;

pub use repository::{FileRow, HeldUpdate, Ledger, NewFile};

use handoff_domain::HandoffError;

pub(crate) fn db_err(err: sqlx::Error) -> HandoffError {
    HandoffError::database_error(err.to_string())
}
