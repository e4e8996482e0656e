// /////////////////////////////////////////////////////////////////////////////
// Handoff Buffer Manager
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Tracker
//!
//! Reconciles discovered files against the ledger and stamps hold times.
//!
//! *Reconcile* drains the discovered queue in chunks: each file is hashed
//! (checksum cost dominates this stage, so digests run on the blocking
//! thread pool) and looked up by its `(tail, name, checksum)` identity. Known
//! files are forwarded as-is - presence in the buffer means they still need
//! a transfer. Unknown files are inserted, one transaction per chunk. A
//! failed commit discards the chunk for this cycle; the files remain in the
//! buffer and are rediscovered on the next pass, so nothing is lost.
//!
//! *Update* drains the completed queue and stamps `held_on` on the latest
//! ledger row of each moved file.

use std::sync::Arc;

use tracing::{error, warn};

use handoff_domain::{ChecksumAlgorithm, FileItem};

use crate::infrastructure::ledger::repository::{datetime_from_epoch, HeldUpdate, Ledger, NewFile};
use crate::infrastructure::runtime::queues::MessageQueue;

/// Reconciles file items with the persistent ledger.
#[derive(Debug)]
pub struct Tracker {
    ledger: Ledger,
    algorithm: ChecksumAlgorithm,
    chunk_size: usize,
    discovered: Arc<MessageQueue<FileItem>>,
    pending: Arc<MessageQueue<FileItem>>,
    completed: Arc<MessageQueue<FileItem>>,
}

impl Tracker {
    pub fn new(
        ledger: Ledger,
        algorithm: ChecksumAlgorithm,
        chunk_size: usize,
        discovered: Arc<MessageQueue<FileItem>>,
        pending: Arc<MessageQueue<FileItem>>,
        completed: Arc<MessageQueue<FileItem>>,
    ) -> Self {
        Self {
            ledger,
            algorithm,
            chunk_size,
            discovered,
            pending,
            completed,
        }
    }

    /// Registers newly discovered files and forwards everything that needs a
    /// transfer onto the pending queue.
    pub async fn reconcile(&self) {
        while !self.discovered.is_empty() {
            let items = self.discovered.drain(self.chunk_size);

            let mut tracked: Vec<FileItem> = Vec::new();
            let mut untracked: Vec<(FileItem, NewFile)> = Vec::new();

            for item in items {
                let checksum = match self.checksum_of(&item).await {
                    Some(checksum) => checksum,
                    None => continue,
                };

                match self.ledger.is_tracked(&item.tail, &item.name, &checksum).await {
                    Ok(true) => tracked.push(item),
                    Ok(false) => {
                        let row = NewFile {
                            relpath: item.tail.clone(),
                            filename: item.name.clone(),
                            checksum,
                            size_bytes: item.size.unwrap_or_default() as i64,
                            created_on: datetime_from_epoch(
                                item.timestamp.unwrap_or_else(handoff_domain::unix_timestamp),
                            ),
                        };
                        untracked.push((item, row));
                    }
                    Err(e) => {
                        error!(error = %e, "checking if file is tracked failed");
                    }
                }
            }

            if !untracked.is_empty() {
                let rows: Vec<NewFile> = untracked.iter().map(|(_, row)| row.clone()).collect();
                if let Err(e) = self.ledger.insert_files(&rows).await {
                    // Discard the chunk: the files stay in the buffer and
                    // will be rediscovered next cycle.
                    error!(error = %e, "adding new files failed");
                    continue;
                }
                tracked.extend(untracked.into_iter().map(|(item, _)| item));
            }

            for item in tracked {
                self.pending.put(item);
            }
        }
    }

    /// Stamps hold times for files the mover archived.
    pub async fn update(&self) {
        while !self.completed.is_empty() {
            let items = self.completed.drain(self.chunk_size);
            let updates: Vec<HeldUpdate> = items
                .into_iter()
                .map(|item| HeldUpdate {
                    relpath: item.tail,
                    filename: item.name,
                    held_on: datetime_from_epoch(item.timestamp.unwrap_or_else(handoff_domain::unix_timestamp)),
                })
                .collect();

            if let Err(e) = self.ledger.mark_held(&updates).await {
                error!(error = %e, "updating files' held times failed");
            }
        }
    }

    async fn checksum_of(&self, item: &FileItem) -> Option<String> {
        let path = item.path();
        let algorithm = self.algorithm;
        let digest = tokio::task::spawn_blocking(move || algorithm.hash_file(&path)).await;
        match digest {
            Ok(Ok(checksum)) => Some(checksum),
            Ok(Err(e)) => {
                // Typically the file disappeared between listing and read.
                warn!(path = %item.path().display(), error = %e, "cannot checksum file");
                None
            }
            Err(e) => {
                error!(error = %e, "checksum task failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ledger::schema;
    use std::fs;
    use std::path::Path;

    struct Fixture {
        tracker: Tracker,
        discovered: Arc<MessageQueue<FileItem>>,
        pending: Arc<MessageQueue<FileItem>>,
        completed: Arc<MessageQueue<FileItem>>,
        ledger: Ledger,
        _dir: tempfile::TempDir,
        root: std::path::PathBuf,
    }

    async fn fixture() -> Fixture {
        // One connection: every connection to :memory: is its own database.
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        schema::create_tables(&pool).await.unwrap();
        let ledger = Ledger::new(pool, false);

        let discovered = Arc::new(MessageQueue::new());
        let pending = Arc::new(MessageQueue::new());
        let completed = Arc::new(MessageQueue::new());
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();

        let tracker = Tracker::new(
            ledger.clone(),
            ChecksumAlgorithm::Blake2,
            10,
            discovered.clone(),
            pending.clone(),
            completed.clone(),
        );
        Fixture {
            tracker,
            discovered,
            pending,
            completed,
            ledger,
            _dir: dir,
            root,
        }
    }

    fn drop_file(root: &Path, tail: &str, name: &str, content: &[u8]) -> FileItem {
        let dir = if tail.is_empty() {
            root.to_path_buf()
        } else {
            root.join(tail)
        };
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(name), content).unwrap();
        FileItem {
            head: root.to_path_buf(),
            tail: tail.to_string(),
            name: name.to_string(),
            size: Some(content.len() as u64),
            timestamp: Some(1_700_000_000.0),
        }
    }

    #[tokio::test]
    async fn test_new_file_is_registered_and_forwarded() {
        let fx = fixture().await;
        let item = drop_file(&fx.root, "a/b", "x.dat", b"payload");
        fx.discovered.put(item.clone());

        fx.tracker.reconcile().await;

        assert_eq!(fx.pending.len(), 1);
        let rows = fx.ledger.files().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].relpath, "a/b");
        assert_eq!(rows[0].filename, "x.dat");
        assert_eq!(rows[0].size_bytes, 7);
        assert!(rows[0].held_on.is_none());
    }

    #[tokio::test]
    async fn test_unchanged_file_yields_no_duplicate_row() {
        let fx = fixture().await;
        let item = drop_file(&fx.root, "a", "x.dat", b"same bytes");

        fx.discovered.put(item.clone());
        fx.tracker.reconcile().await;
        fx.discovered.put(item.clone());
        fx.tracker.reconcile().await;

        // Second pass: already tracked, still forwarded for transfer.
        assert_eq!(fx.pending.len(), 2);
        assert_eq!(fx.ledger.files().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_changed_content_creates_new_row() {
        let fx = fixture().await;
        let item = drop_file(&fx.root, "a", "x.dat", b"first");
        fx.discovered.put(item.clone());
        fx.tracker.reconcile().await;

        let item = drop_file(&fx.root, "a", "x.dat", b"second");
        fx.discovered.put(item);
        fx.tracker.reconcile().await;

        let rows = fx.ledger.files().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_ne!(rows[0].checksum, rows[1].checksum);
    }

    #[tokio::test]
    async fn test_vanished_file_is_skipped() {
        let fx = fixture().await;
        let mut item = drop_file(&fx.root, "", "ghost.dat", b"x");
        fs::remove_file(fx.root.join("ghost.dat")).unwrap();
        item.size = Some(1);
        fx.discovered.put(item);

        fx.tracker.reconcile().await;

        assert!(fx.pending.is_empty());
        assert!(fx.ledger.files().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_stamps_held_on() {
        let fx = fixture().await;
        let item = drop_file(&fx.root, "a", "x.dat", b"data");
        fx.discovered.put(item.clone());
        fx.tracker.reconcile().await;
        fx.pending.drain(10);

        fx.completed.put(FileItem {
            timestamp: Some(1_700_000_123.0),
            ..item
        });
        fx.tracker.update().await;

        let rows = fx.ledger.files().await.unwrap();
        assert!(rows[0].held_on.as_deref().unwrap().starts_with("2023-11-14"));
    }
}
