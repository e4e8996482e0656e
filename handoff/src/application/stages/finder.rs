// /////////////////////////////////////////////////////////////////////////////
// Handoff Buffer Manager
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Finder
//!
//! Walks the buffer tree and emits one [`FileItem`] per regular file onto the
//! discovered queue. The finder keeps no state between passes; each run is a
//! complete, finite scan.
//!
//! Files that vanish between listing and stat, and entries the walker cannot
//! read, are logged and skipped - a racing upstream writer must never abort a
//! scan. Paths matching an exclude glob are dropped silently.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use tracing::warn;
use walkdir::WalkDir;

use handoff_domain::{FileItem, HandoffError, Result};

use crate::infrastructure::config::HandoffConfig;
use crate::infrastructure::runtime::queues::MessageQueue;

/// Discovers files dropped into the buffer.
#[derive(Debug)]
pub struct Finder {
    root: PathBuf,
    exclude: Vec<glob::Pattern>,
    discovered: Arc<MessageQueue<FileItem>>,
}

impl Finder {
    /// Creates a finder rooted at the configured buffer.
    ///
    /// The buffer must exist and be a directory; anything else is a
    /// configuration error. Exclude patterns are compiled here so malformed
    /// globs also abort startup.
    pub fn new(
        config: &HandoffConfig,
        discovered: Arc<MessageQueue<FileItem>>,
        exclude_list: &[String],
    ) -> Result<Self> {
        let root = config.buffer.clone();
        if !root.is_dir() {
            return Err(HandoffError::invalid_config(format!(
                "{}: directory not found",
                root.display()
            )));
        }
        let exclude = exclude_list
            .iter()
            .map(|pattern| {
                glob::Pattern::new(pattern)
                    .map_err(|e| HandoffError::invalid_config(format!("exclude pattern '{pattern}': {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            root,
            exclude,
            discovered,
        })
    }

    /// Scans the buffer recursively, enqueueing every regular file found.
    pub fn run(&self) {
        for entry in WalkDir::new(&self.root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                // Walk entries always live under the root.
                continue;
            };
            if self.exclude.iter().any(|p| p.matches_path(relative)) {
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "cannot stat file");
                    continue;
                }
            };
            let mtime = match metadata.modified() {
                Ok(time) => time
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_secs_f64())
                    .unwrap_or_default(),
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "cannot read mtime");
                    continue;
                }
            };

            let tail = relative
                .parent()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default();
            let name = entry.file_name().to_string_lossy().into_owned();

            self.discovered.put(FileItem {
                head: self.root.clone(),
                tail,
                name,
                size: Some(metadata.len()),
                timestamp: Some(mtime),
            });
        }
    }
}
