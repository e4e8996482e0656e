// /////////////////////////////////////////////////////////////////////////////
// Handoff Buffer Manager
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Recorder
//!
//! Persists transfer records - successes and failures alike - and re-emits
//! file items for the members of successful batches so the mover can archive
//! them.
//!
//! Each record's members are resolved to ledger rows by `(relpath, filename)`;
//! a record whose members resolve to nothing (a race, or an untracked file
//! that slipped through) is discarded with a warning. Batches and their
//! associations commit one chunk per transaction; the mover only ever sees a
//! file *after* its batch row is durable, which is the ordering the whole
//! bookkeeping design leans on.

use std::sync::Arc;

use tracing::{error, warn};

use handoff_domain::{FileItem, TransferRecord};

use crate::infrastructure::ledger::repository::Ledger;
use crate::infrastructure::runtime::queues::MessageQueue;

/// Records transfer attempts in the ledger.
#[derive(Debug)]
pub struct Recorder {
    ledger: Ledger,
    chunk_size: usize,
    transfers: Arc<MessageQueue<TransferRecord>>,
    processed: Arc<MessageQueue<FileItem>>,
}

impl Recorder {
    pub fn new(
        ledger: Ledger,
        chunk_size: usize,
        transfers: Arc<MessageQueue<TransferRecord>>,
        processed: Arc<MessageQueue<FileItem>>,
    ) -> Self {
        Self {
            ledger,
            chunk_size,
            transfers,
            processed,
        }
    }

    /// Drains the transfers queue, committing one chunk per transaction.
    pub async fn run(&self) {
        while !self.transfers.is_empty() {
            let records = self.transfers.drain(self.chunk_size);

            let mut chunk: Vec<(TransferRecord, Vec<i64>)> = Vec::new();
            for record in records {
                let mut file_ids = Vec::new();
                for (_, tail, name) in &record.files {
                    match self.ledger.latest_file_id(tail, name).await {
                        Ok(Some(id)) => file_ids.push(id),
                        Ok(None) => {}
                        Err(e) => {
                            error!(error = %e, "retrieving records of files in a batch failed");
                        }
                    }
                }
                if file_ids.is_empty() {
                    warn!(
                        files = record.files.len(),
                        "discarding transfer record: no tracked members"
                    );
                    continue;
                }
                chunk.push((record, file_ids));
            }
            if chunk.is_empty() {
                continue;
            }

            if let Err(e) = self.ledger.record_batches(&chunk).await {
                error!(error = %e, "adding new transfer batches failed");
                continue;
            }

            // Only after the commit do successfully transferred files move
            // on toward the holding area.
            for (record, _) in &chunk {
                if !record.succeeded() {
                    continue;
                }
                for (head, tail, name) in &record.files {
                    self.processed.put(FileItem {
                        head: head.clone(),
                        tail: tail.clone(),
                        name: name.clone(),
                        ..Default::default()
                    });
                }
            }
        }
    }
}
