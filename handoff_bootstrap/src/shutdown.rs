// /////////////////////////////////////////////////////////////////////////////
// Handoff Buffer Manager
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Shutdown Coordination
//!
//! Graceful shutdown for the supervisor loop and the cleaner daemon.
//!
//! A [`CancellationToken`] is cloned into every long-running task. When a
//! signal arrives the [`ShutdownCoordinator`] cancels the token once; tasks
//! observe the cancellation either by polling [`CancellationToken::is_cancelled`]
//! between steps or by racing [`CancellationToken::cancelled`] against their
//! sleep in a `tokio::select!`.
//!
//! Invariants honored by the manager on cancellation: the in-flight porter
//! chunk completes or is abandoned, any open ledger transaction commits or
//! rolls back, and the daemon stops at its next wakeup.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Cancellation token for signaling shutdown.
///
/// Lightweight, cloneable, safe to hand to any number of tasks.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancellationToken {
    /// Create a new, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel this token, waking every waiter.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Check if cancelled (non-blocking).
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Wait for cancellation.
    pub async fn cancelled(&self) {
        // notify_waiters only wakes already-registered waiters, so register
        // first (enable), then re-check the flag to close the race.
        loop {
            if self.is_cancelled() {
                return;
            }
            let mut notified = std::pin::pin!(self.notify.notified());
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Coordinates a single, idempotent shutdown across components.
#[derive(Clone, Debug)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    initiated: Arc<AtomicBool>,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            initiated: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get a cancellation token to pass to tasks.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Check whether shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.initiated.load(Ordering::SeqCst)
    }

    /// Initiate shutdown. Only the first call has any effect.
    pub fn initiate_shutdown(&self) {
        if self
            .initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            tracing::info!("Initiating graceful shutdown");
            self.token.cancel();
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
