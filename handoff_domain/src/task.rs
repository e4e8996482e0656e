// /////////////////////////////////////////////////////////////////////////////
// Handoff Buffer Manager
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Task Capability
//!
//! Every pipeline stage exposes the same minimal capability: `run()`. The
//! supervisor composes stages without knowing what they do, and [`Sequence`]
//! provides the composite that executes several stages in a fixed order (the
//! cleaner is a `Sequence` of mover and eraser).
//!
//! No inheritance hierarchy is needed; a trait object behind `Box<dyn Task>`
//! is the whole polymorphism story.

use std::fmt;

use async_trait::async_trait;

use crate::error::Result;

/// A runnable unit of pipeline work.
#[async_trait]
pub trait Task: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Execute the task once. Tasks drain their input queues to exhaustion
    /// and return; looping is the caller's concern.
    async fn run(&self) -> Result<()>;
}

/// A sequence of tasks executed in insertion order.
pub struct Sequence {
    tasks: Vec<Box<dyn Task>>,
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence")
            .field("tasks", &self.tasks.iter().map(|t| t.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl Sequence {
    /// Create an empty sequence.
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    /// Append a task to the sequence.
    pub fn add(&mut self, task: Box<dyn Task>) {
        self.tasks.push(task);
    }

    /// Number of tasks in the sequence.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the sequence holds no tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Task for Sequence {
    fn name(&self) -> &'static str {
        "sequence"
    }

    async fn run(&self) -> Result<()> {
        for task in &self.tasks {
            task.run().await?;
        }
        Ok(())
    }
}
