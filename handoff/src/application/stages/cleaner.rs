// /////////////////////////////////////////////////////////////////////////////
// Handoff Buffer Manager
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Cleaner
//!
//! Housekeeping after successful transfers, split into three tasks:
//!
//! - [`Mover`] archives transferred files from the buffer into the holding
//!   area and rewrites their `head`/`timestamp` for the tracker's hold-time
//!   stamping.
//! - [`Eraser`] reclaims empty buffer directories, but only ones unmodified
//!   for longer than the expiration time - a directory an upstream writer
//!   just finished populating must not be yanked away.
//! - [`Wiper`] removes empty directories left behind in the remote staging
//!   area after promotions.
//!
//! Mover and eraser run as a [`Sequence`](handoff_domain::Sequence) on the
//! background daemon; the wiper runs once per supervisor cycle.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tracing::{debug, warn};
use walkdir::WalkDir;

use handoff_domain::{unix_timestamp, FileItem, HandoffError, Result, Task};

use crate::infrastructure::config::{EndpointConfig, HandoffConfig};
use crate::infrastructure::process::CommandRunner;
use crate::infrastructure::runtime::queues::MessageQueue;

/// Moves successfully transferred files from the buffer to the holding area.
#[derive(Debug)]
pub struct Mover {
    root: PathBuf,
    processed: Arc<MessageQueue<FileItem>>,
    completed: Arc<MessageQueue<FileItem>>,
}

impl Mover {
    /// Creates a mover targeting the configured holding area, which must
    /// exist and be a directory.
    pub fn new(
        config: &HandoffConfig,
        processed: Arc<MessageQueue<FileItem>>,
        completed: Arc<MessageQueue<FileItem>>,
    ) -> Result<Self> {
        let root = config.holding.clone();
        if !root.is_dir() {
            return Err(HandoffError::invalid_config(format!(
                "{}: directory not found",
                root.display()
            )));
        }
        Ok(Self {
            root,
            processed,
            completed,
        })
    }
}

#[async_trait]
impl Task for Mover {
    fn name(&self) -> &'static str {
        "mover"
    }

    /// Drains the processed queue, moving each file under the holding root
    /// and forwarding it with a rewritten `head` and a fresh timestamp.
    /// OS-level failures skip the file for this cycle.
    async fn run(&self) -> Result<()> {
        while let Some(mut item) = self.processed.get() {
            let target_dir = if item.tail.is_empty() {
                self.root.clone()
            } else {
                self.root.join(&item.tail)
            };
            if let Err(e) = fs::create_dir_all(&target_dir) {
                warn!(dir = %target_dir.display(), error = %e, "cannot create holding directory");
                continue;
            }

            let src = item.path();
            let dst = target_dir.join(&item.name);
            debug!(src = %src.display(), dst = %dst.display(), "moving");
            if let Err(e) = move_file(&src, &dst) {
                warn!(src = %src.display(), error = %e, "cannot move file");
                continue;
            }

            item.head = self.root.clone();
            item.timestamp = Some(unix_timestamp());
            self.completed.put(item);
        }
        Ok(())
    }
}

/// Renames `src` to `dst`, falling back to copy-and-delete when the rename
/// crosses filesystems.
fn move_file(src: &Path, dst: &Path) -> std::io::Result<()> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(src, dst)?;
            fs::remove_file(src)
        }
    }
}

/// Removes stale empty directories from the buffer.
pub struct Eraser {
    root: PathBuf,
    expiration: Duration,
}

impl Eraser {
    /// Creates an eraser for the configured buffer, which must exist and be
    /// a directory.
    pub fn new(config: &HandoffConfig, expiration: Duration) -> Result<Self> {
        let root = config.buffer.clone();
        if !root.is_dir() {
            return Err(HandoffError::invalid_config(format!(
                "{}: directory not found",
                root.display()
            )));
        }
        Ok(Self { root, expiration })
    }
}

#[async_trait]
impl Task for Eraser {
    fn name(&self) -> &'static str {
        "eraser"
    }

    /// Collects empty directories bottom-up and removes the ones whose mtime
    /// is older than the expiration time. The guard avoids racing upstream
    /// writers that created a directory moments ago.
    async fn run(&self) -> Result<()> {
        let mut empty_dirs = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1).contents_first(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }
            match fs::read_dir(entry.path()) {
                Ok(mut listing) => {
                    if listing.next().is_none() {
                        empty_dirs.push(entry.path().to_path_buf());
                    }
                }
                Err(e) => warn!(dir = %entry.path().display(), error = %e, "cannot list directory"),
            }
        }
        debug!(count = empty_dirs.len(), "empty directories found");

        let now = SystemTime::now();
        for path in empty_dirs {
            let age = fs::metadata(&path)
                .and_then(|m| m.modified())
                .map(|mtime| now.duration_since(mtime).unwrap_or_default());
            match age {
                Ok(age) if age > self.expiration => {
                    if let Err(e) = fs::remove_dir(&path) {
                        warn!(dir = %path.display(), error = %e, "cannot remove directory");
                    } else {
                        debug!(dir = %path.display(), "directory removed");
                    }
                }
                Ok(_) => {}
                Err(e) => warn!(dir = %path.display(), error = %e, "cannot stat directory"),
            }
        }
        Ok(())
    }
}

/// Removes empty directories from the remote staging area.
#[derive(Debug)]
pub struct Wiper {
    params: std::collections::HashMap<String, String>,
    remote: handoff_domain::CommandTemplate,
    staging: Option<String>,
    runner: CommandRunner,
}

impl Wiper {
    /// Creates a wiper from the endpoint configuration; validates the remote
    /// command template even when no staging area is configured.
    pub fn new(endpoint: &EndpointConfig, timeout: Option<Duration>) -> Result<Self> {
        endpoint.validate_commands()?;
        let commands = endpoint.commands()?;
        Ok(Self {
            params: endpoint.params(),
            remote: handoff_domain::CommandTemplate::parse(&commands.remote)?,
            staging: endpoint.staging.clone(),
            runner: CommandRunner::new(timeout),
        })
    }

    /// Issues the remote empty-directory sweep. A missing staging area makes
    /// this a silent no-op; command failures are logged, never fatal.
    pub async fn run(&self) {
        let Some(staging) = &self.staging else {
            return;
        };
        let mut params = self.params.clone();
        params.insert(
            "command".to_string(),
            format!("find {staging} -type d -empty -mindepth 1 -delete"),
        );
        let command = match self.remote.render(&params) {
            Ok(command) => command,
            Err(e) => {
                warn!(error = %e, "cannot render wipe command");
                return;
            }
        };
        let outcome = self.runner.execute(&command).await;
        if !outcome.succeeded() {
            warn!(command = %command, stderr = %outcome.stderr, "wiping staging area failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::CommandsConfig;
    use std::fs;

    fn handoff_config(buffer: &Path, holding: &Path) -> HandoffConfig {
        HandoffConfig {
            buffer: buffer.to_path_buf(),
            holding: holding.to_path_buf(),
        }
    }

    #[test]
    fn test_mover_requires_existing_holding_area() {
        let buffer = tempfile::tempdir().unwrap();
        let config = handoff_config(buffer.path(), Path::new("/not/a/path"));
        let err = Mover::new(&config, Arc::new(MessageQueue::new()), Arc::new(MessageQueue::new())).unwrap_err();
        assert_eq!(err.category(), "configuration");
    }

    #[tokio::test]
    async fn test_mover_archives_and_rewrites_item() {
        let buffer = tempfile::tempdir().unwrap();
        let holding = tempfile::tempdir().unwrap();
        fs::create_dir_all(buffer.path().join("a/b")).unwrap();
        fs::write(buffer.path().join("a/b/x.dat"), b"payload").unwrap();

        let processed = Arc::new(MessageQueue::new());
        let completed = Arc::new(MessageQueue::new());
        processed.put(FileItem {
            head: buffer.path().to_path_buf(),
            tail: "a/b".to_string(),
            name: "x.dat".to_string(),
            ..Default::default()
        });

        let mover = Mover::new(
            &handoff_config(buffer.path(), holding.path()),
            processed.clone(),
            completed.clone(),
        )
        .unwrap();
        mover.run().await.unwrap();

        assert!(!buffer.path().join("a/b/x.dat").exists());
        assert_eq!(
            fs::read(holding.path().join("a/b/x.dat")).unwrap(),
            b"payload".to_vec()
        );

        let item = completed.get().unwrap();
        assert_eq!(item.head, holding.path());
        assert_eq!(item.tail, "a/b");
        assert!(item.timestamp.unwrap() > 0.0);
    }

    #[tokio::test]
    async fn test_mover_skips_vanished_file() {
        let buffer = tempfile::tempdir().unwrap();
        let holding = tempfile::tempdir().unwrap();

        let processed = Arc::new(MessageQueue::new());
        let completed = Arc::new(MessageQueue::new());
        processed.put(FileItem {
            head: buffer.path().to_path_buf(),
            tail: String::new(),
            name: "ghost.dat".to_string(),
            ..Default::default()
        });

        let mover = Mover::new(
            &handoff_config(buffer.path(), holding.path()),
            processed.clone(),
            completed.clone(),
        )
        .unwrap();
        mover.run().await.unwrap();

        assert!(completed.is_empty());
        assert!(processed.is_empty());
    }

    #[tokio::test]
    async fn test_eraser_keeps_fresh_directories() {
        let buffer = tempfile::tempdir().unwrap();
        let holding = tempfile::tempdir().unwrap();
        fs::create_dir_all(buffer.path().join("fresh")).unwrap();

        let eraser = Eraser::new(
            &handoff_config(buffer.path(), holding.path()),
            Duration::from_secs(3600),
        )
        .unwrap();
        eraser.run().await.unwrap();

        assert!(buffer.path().join("fresh").exists());
    }

    #[tokio::test]
    async fn test_eraser_removes_expired_empty_tree() {
        let buffer = tempfile::tempdir().unwrap();
        let holding = tempfile::tempdir().unwrap();
        let nested = buffer.path().join("old/empty");
        fs::create_dir_all(&nested).unwrap();

        let past = filetime::FileTime::from_unix_time(1_500_000_000, 0);
        filetime::set_file_mtime(&nested, past).unwrap();
        filetime::set_file_mtime(nested.parent().unwrap(), past).unwrap();

        let eraser = Eraser::new(
            &handoff_config(buffer.path(), holding.path()),
            Duration::from_secs(60),
        )
        .unwrap();
        eraser.run().await.unwrap();

        // The leaf goes now; its parent becomes empty and goes on a later
        // pass once it has aged past the expiration time.
        assert!(!nested.exists());
        assert!(buffer.path().join("old").exists());
        assert!(buffer.path().exists());
    }

    #[tokio::test]
    async fn test_eraser_spares_directories_with_content() {
        let buffer = tempfile::tempdir().unwrap();
        let holding = tempfile::tempdir().unwrap();
        let dir = buffer.path().join("occupied");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("data.dat"), b"x").unwrap();
        filetime::set_file_mtime(&dir, filetime::FileTime::from_unix_time(1_500_000_000, 0)).unwrap();

        let eraser = Eraser::new(
            &handoff_config(buffer.path(), holding.path()),
            Duration::from_secs(60),
        )
        .unwrap();
        eraser.run().await.unwrap();

        assert!(dir.join("data.dat").exists());
    }

    fn endpoint_with_staging(staging: Option<&str>) -> EndpointConfig {
        EndpointConfig {
            user: "alice".to_string(),
            host: "endpoint".to_string(),
            buffer: "/remote/buffer".to_string(),
            staging: staging.map(|s| s.to_string()),
            port: None,
            commands: Some(CommandsConfig {
                remote: "{command}".to_string(),
                transfer: "cp {batch} {dest}".to_string(),
            }),
        }
    }

    #[tokio::test]
    async fn test_wiper_is_noop_without_staging() {
        // The rendered command would fail loudly if executed; without a
        // staging area it must never run at all.
        let wiper = Wiper::new(&endpoint_with_staging(None), None).unwrap();
        wiper.run().await;
    }

    #[tokio::test]
    async fn test_wiper_sweeps_staging_area() {
        let staging = tempfile::tempdir().unwrap();
        let stale = staging.path().join("left/behind");
        fs::create_dir_all(&stale).unwrap();

        let wiper = Wiper::new(
            &endpoint_with_staging(Some(staging.path().to_str().unwrap())),
            None,
        )
        .unwrap();
        wiper.run().await;

        assert!(!staging.path().join("left").exists());
        assert!(staging.path().exists());
    }
}
