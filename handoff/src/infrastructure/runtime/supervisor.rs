// /////////////////////////////////////////////////////////////////////////////
// Handoff Buffer Manager
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Task Supervision Utilities
//!
//! Thin wrappers around `tokio::spawn` for the porter worker pool and the
//! cleaner daemon. Spawned handles must be awaited; panics surface as typed
//! errors instead of disappearing into a detached task.

use tokio::task::JoinHandle;
use tracing::{debug, error};

use handoff_domain::{HandoffError, Result};

/// Spawns a supervised task with lifecycle logging.
///
/// The returned `JoinHandle` must be awaited through [`join_supervised`];
/// outcomes are logged either way so a worker that fails mid-cycle is
/// visible immediately.
pub fn spawn_supervised<F, T>(name: &'static str, fut: F) -> JoinHandle<Result<T>>
where
    F: std::future::Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    debug!(task = name, "task starting");

    tokio::spawn(async move {
        let result = fut.await;

        match &result {
            Ok(_) => debug!(task = name, "task completed"),
            Err(e) => error!(task = name, error = %e, "task failed"),
        }

        result
    })
}

/// Awaits a supervised task handle, converting panics and cancellations into
/// typed errors.
pub async fn join_supervised<T>(handle: JoinHandle<Result<T>>) -> Result<T> {
    match handle.await {
        Ok(task_result) => task_result,
        Err(e) if e.is_panic() => Err(HandoffError::internal_error(format!("task panicked: {e}"))),
        Err(e) if e.is_cancelled() => Err(HandoffError::cancelled()),
        Err(e) => Err(HandoffError::internal_error(format!("task join failed: {e}"))),
    }
}
