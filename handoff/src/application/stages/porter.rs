// /////////////////////////////////////////////////////////////////////////////
// Handoff Buffer Manager
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Porter
//!
//! Transfers files from the handoff site to the endpoint site.
//!
//! If only the endpoint's buffer is configured, files are transferred
//! directly to it. To make transfers look atomic to downstream readers, a
//! separate *staging* area can be configured: files land there first and are
//! promoted into the endpoint's buffer with an intra-host `mv` only after
//! the transfer finished, so consumers never observe a half-written file.
//!
//! Each worker iterates: pull a chunk off the pending queue, group it by
//! source directory, then per group run up to three phases:
//!
//! 1. **pre** - ensure the target directory exists (`mkdir -p`)
//! 2. **transfer** - one transfer command per batch (all files of the group
//!    in batch mode, one file each in file mode)
//! 3. **post** - ensure the buffer directory exists, then `mv` each
//!    surviving batch out of staging (skipped when staging is the buffer)
//!
//! Every batch produces exactly one [`TransferRecord`] - success or failure -
//! on the transfers queue. Phase timings land in the record as they happen;
//! a failed phase finalizes the records it affects and later phases are not
//! attempted for them.
//!
//! The porter is stateless apart from the two queues, so any number of
//! workers can run it concurrently.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use handoff_domain::{status, unix_timestamp, CommandTemplate, FileItem, Result, TransferRecord};

use crate::infrastructure::config::EndpointConfig;
use crate::infrastructure::process::{CommandOutcome, CommandRunner};
use crate::infrastructure::runtime::queues::MessageQueue;

/// Transfers pending files to the endpoint site.
#[derive(Debug)]
pub struct Porter {
    params: HashMap<String, String>,
    remote: CommandTemplate,
    transfer: CommandTemplate,
    batch_mode: bool,
    buffer: String,
    staging: Option<String>,
    chunk_size: usize,
    runner: CommandRunner,
    pending: Arc<MessageQueue<FileItem>>,
    transfers: Arc<MessageQueue<TransferRecord>>,
}

impl Porter {
    /// Builds a porter, validating the endpoint's command templates.
    ///
    /// Rejected here, not at first use: a `transfer` template without exactly
    /// one of `{batch}`/`{file}` or without `{dest}`, a `remote` template
    /// without `{command}`, and any placeholder that no parameter can ever
    /// satisfy.
    pub fn new(
        endpoint: &EndpointConfig,
        pending: Arc<MessageQueue<FileItem>>,
        transfers: Arc<MessageQueue<TransferRecord>>,
        chunk_size: usize,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        endpoint.validate_commands()?;
        let commands = endpoint.commands()?;

        let remote = CommandTemplate::parse(&commands.remote)?;
        let transfer = CommandTemplate::parse(&commands.transfer)?;

        // With the mode recorded, rewrite batch/file to the generic 'source'
        // so rendering concrete commands needs no further branching.
        let batch_mode = transfer.contains("batch");
        let transfer = transfer.rename_placeholder(if batch_mode { "batch" } else { "file" }, "source")?;

        Ok(Self {
            params: endpoint.params(),
            remote,
            transfer,
            batch_mode,
            buffer: endpoint.buffer.clone(),
            staging: endpoint.staging.clone(),
            chunk_size,
            runner: CommandRunner::new(timeout),
            pending,
            transfers,
        })
    }

    /// Whether the transfer template groups whole directories into one
    /// command invocation.
    pub fn batch_mode(&self) -> bool {
        self.batch_mode
    }

    /// Worker loop: drain the pending queue and transfer what was drained.
    ///
    /// Returns when a pull finds the queue empty. Several workers may run
    /// this concurrently; the queues are the only shared state.
    pub async fn run(&self) {
        let stage = self.staging.clone().unwrap_or_else(|| self.buffer.clone());
        while !self.pending.is_empty() {
            let files = self.pending.drain(self.chunk_size);
            if files.is_empty() {
                continue;
            }

            // Only files sharing a location may share a transfer command.
            let mut groups: BTreeMap<(PathBuf, String), Vec<FileItem>> = BTreeMap::new();
            for item in files {
                groups
                    .entry((item.head.clone(), item.tail.clone()))
                    .or_default()
                    .push(item);
            }

            for ((head, tail), items) in groups {
                self.transfer_group(&head, &tail, items, &stage).await;
            }
        }
    }

    async fn transfer_group(&self, head: &PathBuf, tail: &str, items: Vec<FileItem>, stage: &str) {
        let batches: Vec<Vec<FileItem>> = if self.batch_mode {
            vec![items]
        } else {
            items.into_iter().map(|item| vec![item]).collect()
        };

        let mut records: Vec<TransferRecord> = batches
            .iter()
            .map(|batch| TransferRecord {
                files: batch
                    .iter()
                    .map(|item| (head.clone(), tail.to_string(), item.name.clone()))
                    .collect(),
                size: batch.iter().map(|item| item.size.unwrap_or_default()).sum(),
                ..Default::default()
            })
            .collect();

        // 1. PRE-TRANSFER: create the target subdirectory at the stage.
        let dest = join_remote(stage, tail);
        let started = unix_timestamp();
        let outcome = self.run_remote(&format!("mkdir -p {dest}")).await;
        for record in &mut records {
            record.pre_start = Some(started);
            record.pre_duration = Some(outcome.duration);
            record.status = outcome.status;
            record.error = stderr_of(&outcome);
        }
        if !outcome.succeeded() {
            warn!(dest = %dest, stderr = %outcome.stderr, "pre-transfer actions failed");
            self.flush(records);
            return;
        }

        // 2. TRANSFER: one command per batch; failures drop out here, the
        // rest of the bucket keeps going.
        let mut survivors: Vec<(Vec<FileItem>, TransferRecord)> = Vec::new();
        for (batch, mut record) in batches.into_iter().zip(records) {
            let source = join_paths(batch.iter().map(FileItem::path));
            let command = match self.render_transfer(&source, &dest) {
                Ok(command) => command,
                Err(e) => {
                    record.status = status::EXEC_FAILED;
                    record.error = Some(e.to_string());
                    self.flush(vec![record]);
                    continue;
                }
            };
            let started = unix_timestamp();
            let outcome = self.runner.execute(&command).await;
            record.trans_start = Some(started);
            record.trans_duration = Some(outcome.duration);
            record.status = outcome.status;
            record.error = stderr_of(&outcome);

            if !outcome.succeeded() {
                warn!(command = %command, stderr = %outcome.stderr, "transfer failed");
                self.flush(vec![record]);
                continue;
            }

            if outcome.duration > 0.0 {
                record.rate = Some(record.size as f64 / outcome.duration / 1_048_576.0);
            }
            survivors.push((batch, record));
        }
        if survivors.is_empty() {
            return;
        }

        // Files that went straight into the endpoint's buffer are done.
        if stage == self.buffer {
            self.flush(survivors.into_iter().map(|(_, record)| record).collect());
            return;
        }

        // 3. POST-TRANSFER: create the buffer subdirectory, then promote
        // each batch out of staging with an intra-host rename.
        let dest = join_remote(&self.buffer, tail);
        let started = unix_timestamp();
        let outcome = self.run_remote(&format!("mkdir -p {dest}")).await;
        let mkdir_duration = outcome.duration;
        for (_, record) in &mut survivors {
            record.post_start = Some(started);
            record.post_duration = Some(mkdir_duration);
            record.status = outcome.status;
            record.error = stderr_of(&outcome);
        }
        if !outcome.succeeded() {
            warn!(dest = %dest, stderr = %outcome.stderr, "post-transfer actions failed");
            self.flush(survivors.into_iter().map(|(_, record)| record).collect());
            return;
        }

        let mut completed = Vec::new();
        for (batch, mut record) in survivors {
            let source = join_paths(batch.iter().map(|item| {
                let mut path = PathBuf::from(join_remote(stage, tail));
                path.push(&item.name);
                path
            }));
            let started = unix_timestamp();
            let outcome = self.run_remote(&format!("mv {source} {dest}")).await;
            record.post_start = Some(started);
            record.post_duration = Some(mkdir_duration + outcome.duration);
            record.status = outcome.status;
            record.error = stderr_of(&outcome);

            if !outcome.succeeded() {
                warn!(stderr = %outcome.stderr, "promoting batch to buffer failed");
                self.flush(vec![record]);
                continue;
            }
            completed.push(record);
        }
        self.flush(completed);
    }

    async fn run_remote(&self, command: &str) -> CommandOutcome {
        let mut params = self.params.clone();
        params.insert("command".to_string(), command.to_string());
        match self.remote.render(&params) {
            Ok(rendered) => self.runner.execute(&rendered).await,
            Err(e) => CommandOutcome {
                status: status::EXEC_FAILED,
                stdout: String::new(),
                stderr: e.to_string(),
                duration: 0.0,
            },
        }
    }

    fn render_transfer(&self, source: &str, dest: &str) -> Result<String> {
        let mut params = self.params.clone();
        params.insert("source".to_string(), source.to_string());
        params.insert("dest".to_string(), dest.to_string());
        self.transfer.render(&params)
    }

    fn flush(&self, records: Vec<TransferRecord>) {
        for record in records {
            self.transfers.put(record);
        }
    }
}

/// Joins a remote root and a relative tail with forward slashes.
fn join_remote(root: &str, tail: &str) -> String {
    if tail.is_empty() {
        root.to_string()
    } else {
        format!("{}/{}", root.trim_end_matches('/'), tail)
    }
}

fn join_paths(paths: impl Iterator<Item = PathBuf>) -> String {
    paths
        .map(|p| p.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

fn stderr_of(outcome: &CommandOutcome) -> Option<String> {
    let trimmed = outcome.stderr.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
