// /////////////////////////////////////////////////////////////////////////////
// Handoff Buffer Manager
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Manager
//!
//! The supervisor loop driving the pipeline. Each cycle:
//!
//! 1. scan the buffer (finder)
//! 2. nothing found? stamp any outstanding hold times and sleep
//! 3. reconcile discoveries with the ledger (tracker)
//! 4. transfer with a pool of porter workers, sized
//!    `min(num_threads, pending)`
//! 5. persist transfer records (recorder)
//! 6. sweep the remote staging area (wiper)
//! 7. stamp hold times for files the cleaner archived (tracker)
//! 8. sleep
//!
//! Cycles are serial at this level; the porter pool is the only parallel
//! stage inside a cycle, which gives a clean happens-before between ledger
//! commits and file moves. The cleaner (mover + eraser) runs on its own
//! daemon task with the same pause cadence, sharing nothing with the cycle
//! but the processed and completed queues.
//!
//! Cancellation is cooperative: the token is checked between steps and raced
//! against the sleeps, the porter chunk in flight finishes or is abandoned
//! with its records already queued, and the daemon stops at its next wakeup.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info};

use handoff_bootstrap::CancellationToken;
use handoff_domain::{FileItem, Result, Sequence, Task, TransferRecord};

use crate::application::stages::{Eraser, Finder, Mover, Porter, Recorder, Tracker, Wiper};
use crate::infrastructure::config::Config;
use crate::infrastructure::ledger::repository::Ledger;
use crate::infrastructure::runtime::queues::MessageQueue;
use crate::infrastructure::runtime::supervisor::{join_supervised, spawn_supervised};

/// The handoff buffer manager.
///
/// Owns the queues, the pipeline stages, and the ledger session they share.
#[derive(Debug)]
pub struct Manager {
    discovered: Arc<MessageQueue<FileItem>>,
    pending: Arc<MessageQueue<FileItem>>,
    transfers: Arc<MessageQueue<TransferRecord>>,
    finder: Finder,
    tracker: Tracker,
    porter: Arc<Porter>,
    recorder: Recorder,
    cleaner: Arc<Sequence>,
    wiper: Wiper,
    num_threads: usize,
    pause: Duration,
}

impl Manager {
    /// Wires queues and stages from the configuration. Any constructor
    /// rejecting its part of the configuration aborts startup here.
    pub fn new(config: &Config, ledger: Ledger) -> Result<Self> {
        let general = &config.general;

        let discovered = Arc::new(MessageQueue::new());
        let pending = Arc::new(MessageQueue::new());
        let processed = Arc::new(MessageQueue::new());
        let completed = Arc::new(MessageQueue::new());
        let transfers = Arc::new(MessageQueue::new());

        let finder = Finder::new(&config.handoff, discovered.clone(), &general.exclude_list)?;
        let tracker = Tracker::new(
            ledger.clone(),
            general.checksum,
            general.chunk_size,
            discovered.clone(),
            pending.clone(),
            completed.clone(),
        );
        let porter = Arc::new(Porter::new(
            &config.endpoint,
            pending.clone(),
            transfers.clone(),
            general.chunk_size,
            general.timeout_duration(),
        )?);
        let recorder = Recorder::new(ledger, general.chunk_size, transfers.clone(), processed.clone());

        let mover = Mover::new(&config.handoff, processed, completed)?;
        let eraser = Eraser::new(&config.handoff, Duration::from_secs(general.expiration_time))?;
        let mut cleaner = Sequence::new();
        cleaner.add(Box::new(mover));
        cleaner.add(Box::new(eraser));

        let wiper = Wiper::new(&config.endpoint, general.timeout_duration())?;

        Ok(Self {
            discovered,
            pending,
            transfers,
            finder,
            tracker,
            porter,
            recorder,
            cleaner: Arc::new(cleaner),
            wiper,
            num_threads: general.num_threads,
            pause: general.pause_duration(),
        })
    }

    /// Runs the manager until the token is cancelled.
    pub async fn run(&self, token: CancellationToken) -> Result<()> {
        info!("starting to monitor the buffer");

        let daemon = {
            let cleaner = self.cleaner.clone();
            let token = token.clone();
            let pause = self.pause;
            spawn_supervised("cleaner-daemon", async move {
                while !token.is_cancelled() {
                    if let Err(e) = cleaner.run().await {
                        error!(error = %e, "cleaner pass failed");
                    }
                    tokio::select! {
                        _ = token.cancelled() => {}
                        _ = tokio::time::sleep(pause) => {}
                    }
                }
                Ok(())
            })
        };

        while !token.is_cancelled() {
            self.cycle(&token).await;

            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(self.pause) => {}
            }
        }

        if let Err(e) = join_supervised(daemon).await {
            error!(error = %e, "cleaner daemon terminated abnormally");
        }
        info!("manager stopped");
        Ok(())
    }

    async fn cycle(&self, token: &CancellationToken) {
        info!("scanning buffer for new files");
        let started = Instant::now();
        self.finder.run();
        info!(
            duration = started.elapsed().as_secs_f64(),
            found = self.discovered.len(),
            "scan completed"
        );

        if self.discovered.is_empty() {
            // Still stamp hold times for files the daemon archived at the
            // tail of the previous cycle.
            self.tracker.update().await;
            return;
        }

        self.tracker.reconcile().await;
        if token.is_cancelled() {
            return;
        }

        info!("transferring files");
        let started = Instant::now();
        let workers = self.num_threads.min(self.pending.len());
        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let porter = self.porter.clone();
            handles.push(spawn_supervised("porter", async move {
                porter.run().await;
                Ok(())
            }));
        }
        for handle in handles {
            if let Err(e) = join_supervised(handle).await {
                error!(error = %e, "porter worker failed");
            }
        }
        info!(
            duration = started.elapsed().as_secs_f64(),
            records = self.transfers.len(),
            "transfer attempts completed"
        );

        self.recorder.run().await;
        self.wiper.run().await;
        self.tracker.update().await;
    }
}
