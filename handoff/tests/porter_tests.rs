// /////////////////////////////////////////////////////////////////////////////
// Handoff Buffer Manager
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Porter integration tests.
//!
//! The endpoint command templates are pointed at local tools: the `remote`
//! template is just `{command}` (so `mkdir -p`, `mv`, and `find` run on this
//! host) and the transfer tool is `cp`. That exercises the real three-phase
//! protocol - subprocess spawning, timing, status mapping - without a remote
//! host in the loop.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use handoff::application::stages::Porter;
use handoff::infrastructure::config::{CommandsConfig, EndpointConfig};
use handoff::infrastructure::runtime::queues::MessageQueue;
use handoff_domain::{status, FileItem, TransferRecord};

struct Rig {
    porter: Porter,
    pending: Arc<MessageQueue<FileItem>>,
    transfers: Arc<MessageQueue<TransferRecord>>,
}

fn rig(remote: &str, transfer: &str, buffer: &Path, staging: Option<&Path>, timeout: Option<u64>) -> Rig {
    let endpoint = EndpointConfig {
        user: "tester".to_string(),
        host: "localhost".to_string(),
        buffer: buffer.to_string_lossy().into_owned(),
        staging: staging.map(|p| p.to_string_lossy().into_owned()),
        port: None,
        commands: Some(CommandsConfig {
            remote: remote.to_string(),
            transfer: transfer.to_string(),
        }),
    };
    let pending = Arc::new(MessageQueue::new());
    let transfers = Arc::new(MessageQueue::new());
    let porter = Porter::new(
        &endpoint,
        pending.clone(),
        transfers.clone(),
        10,
        timeout.map(Duration::from_secs),
    )
    .unwrap();
    Rig {
        porter,
        pending,
        transfers,
    }
}

fn drop_file(root: &Path, tail: &str, name: &str, content: &[u8]) -> FileItem {
    let dir = if tail.is_empty() { root.to_path_buf() } else { root.join(tail) };
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

fn drain(transfers: &MessageQueue<TransferRecord>) -> Vec<TransferRecord> {
    let mut records = Vec::new();
    while let Some(record) = transfers.get() {
        records.push(record);
    }
    records
}

#[tokio::test]
async fn batch_mode_groups_by_source_directory() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();

    let rig = rig("{command}", "cp {batch} {dest}", dst.path(), None, None);
    rig.pending.put(drop_file(src.path(), "a", "f1.dat", b"one"));
    rig.pending.put(drop_file(src.path(), "a", "f2.dat", b"two"));
    rig.pending.put(drop_file(src.path(), "b", "f3.dat", b"three"));

    rig.porter.run().await;

    assert!(rig.pending.is_empty());
    let mut records = drain(&rig.transfers);
    records.sort_by(|a, b| a.files.len().cmp(&b.files.len()).reverse());
    assert_eq!(records.len(), 2, "one record per source directory");

    let double = &records[0];
    assert_eq!(double.files.len(), 2);
    assert_eq!(double.status, status::SUCCESS);
    assert_eq!(double.size, 6);
    assert!(double.rate.unwrap() > 0.0);
    assert!(double.pre_start.is_some() && double.pre_duration.is_some());
    assert!(double.trans_start.is_some() && double.trans_duration.is_some());

    let single = &records[1];
    assert_eq!(single.files.len(), 1);
    assert_eq!(single.files[0].2, "f3.dat");

    assert!(dst.path().join("a/f1.dat").exists());
    assert!(dst.path().join("a/f2.dat").exists());
    assert!(dst.path().join("b/f3.dat").exists());
}

#[tokio::test]
async fn file_mode_isolates_each_file() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();

    let rig = rig("{command}", "cp {file} {dest}", dst.path(), None, None);
    rig.pending.put(drop_file(src.path(), "a", "f1.dat", b"one"));
    rig.pending.put(drop_file(src.path(), "a", "f2.dat", b"two"));

    rig.porter.run().await;

    let records = drain(&rig.transfers);
    assert_eq!(records.len(), 2, "one record per file in file mode");
    assert!(records.iter().all(|r| r.files.len() == 1));
    assert!(records.iter().all(|r| r.status == status::SUCCESS));
}

#[tokio::test]
async fn without_staging_post_phase_is_skipped() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();

    let rig = rig("{command}", "cp {batch} {dest}", dst.path(), None, None);
    rig.pending.put(drop_file(src.path(), "a", "x.dat", b"data"));

    rig.porter.run().await;

    let records = drain(&rig.transfers);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, status::SUCCESS);
    assert!(records[0].post_start.is_none());
    assert!(records[0].post_duration.is_none());
}

#[tokio::test]
async fn staging_promotes_batches_into_the_buffer() {
    let src = tempfile::tempdir().unwrap();
    let buffer = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();

    let rig = rig(
        "{command}",
        "cp {batch} {dest}",
        buffer.path(),
        Some(staging.path()),
        None,
    );
    rig.pending.put(drop_file(src.path(), "a/b", "x.dat", b"payload"));

    rig.porter.run().await;

    let records = drain(&rig.transfers);
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.status, status::SUCCESS);
    assert!(record.post_start.is_some());
    assert!(record.post_duration.is_some());

    // Promoted out of staging, visible in the buffer.
    assert!(buffer.path().join("a/b/x.dat").exists());
    assert!(!staging.path().join("a/b/x.dat").exists());
}

#[tokio::test]
async fn pre_phase_failure_abandons_the_bucket() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();

    // Every remote command exits 1 without doing anything.
    let rig = rig("false {command}", "cp {file} {dest}", dst.path(), None, None);
    rig.pending.put(drop_file(src.path(), "a", "f1.dat", b"one"));
    rig.pending.put(drop_file(src.path(), "a", "f2.dat", b"two"));

    rig.porter.run().await;

    let records = drain(&rig.transfers);
    assert_eq!(records.len(), 2, "every batch reports the pre-phase failure");
    for record in &records {
        assert_eq!(record.status, status::REMOTE_IO_ERROR);
        assert!(record.pre_start.is_some());
        assert!(record.trans_start.is_none(), "transfer must not be attempted");
    }
    assert!(!dst.path().join("a/f1.dat").exists());
}

#[tokio::test]
async fn transfer_failure_keeps_other_batches_going() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();

    // cp fails for the vanished file, succeeds for the real one.
    let rig = rig("{command}", "cp {file} {dest}", dst.path(), None, None);
    let ghost = drop_file(src.path(), "a", "ghost.dat", b"x");
    fs::remove_file(src.path().join("a/ghost.dat")).unwrap();
    rig.pending.put(ghost);
    rig.pending.put(drop_file(src.path(), "a", "real.dat", b"y"));

    rig.porter.run().await;

    let records = drain(&rig.transfers);
    assert_eq!(records.len(), 2);
    let failed = records.iter().find(|r| r.files[0].2 == "ghost.dat").unwrap();
    assert_eq!(failed.status, status::REMOTE_IO_ERROR);
    assert!(failed.error.as_ref().is_some_and(|e| !e.is_empty()));
    assert!(failed.rate.is_none());

    let succeeded = records.iter().find(|r| r.files[0].2 == "real.dat").unwrap();
    assert_eq!(succeeded.status, status::SUCCESS);
    assert!(dst.path().join("a/real.dat").exists());
}

#[tokio::test]
async fn slow_transfer_times_out() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();

    let rig = rig(
        "{command}",
        "sh -c \"sleep 10\" {file} {dest}",
        dst.path(),
        None,
        Some(1),
    );
    rig.pending.put(drop_file(src.path(), "a", "x.dat", b"data"));

    rig.porter.run().await;

    let records = drain(&rig.transfers);
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.status, status::TIMED_OUT);
    let duration = record.trans_duration.unwrap();
    assert!((0.9..3.0).contains(&duration), "duration was {duration}");
    assert!(record.error.as_ref().is_some_and(|e| e.contains("timed out")));
    assert!(record.rate.is_none());
}

#[tokio::test]
async fn concurrent_workers_share_the_queue() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();

    let rig = rig("{command}", "cp {file} {dest}", dst.path(), None, None);
    for n in 0..20 {
        rig.pending.put(drop_file(src.path(), "a", &format!("f{n}.dat"), b"x"));
    }

    let porter = Arc::new(rig.porter);
    let workers: Vec<_> = (0..4)
        .map(|_| {
            let porter = porter.clone();
            tokio::spawn(async move { porter.run().await })
        })
        .collect();
    for worker in workers {
        worker.await.unwrap();
    }

    let records = drain(&rig.transfers);
    assert_eq!(records.len(), 20);
    assert!(records.iter().all(|r| r.status == status::SUCCESS));
    for n in 0..20 {
        assert!(dst.path().join(format!("a/f{n}.dat")).exists());
    }
}
