// /////////////////////////////////////////////////////////////////////////////
// Handoff Buffer Manager
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Message Queues
//!
//! Multi-producer / multi-consumer FIFO queues with non-blocking `get`
//! semantics. Porter workers poll and exit their drain loop when an attempt
//! comes back empty; the queues are the only mutable state shared between
//! workers, so everything else stays free of locking.
//!
//! Backed by `crossbeam`'s lock-free `SegQueue`; this wrapper adds the
//! chunked drain the tracker, recorder, and porter all use to bound their
//! transaction and batch sizes.

use crossbeam::queue::SegQueue;

/// An unbounded MPMC FIFO queue.
#[derive(Debug)]
pub struct MessageQueue<T> {
    inner: SegQueue<T>,
}

impl<T> MessageQueue<T> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self { inner: SegQueue::new() }
    }

    /// Enqueues an item.
    pub fn put(&self, item: T) {
        self.inner.push(item);
    }

    /// Dequeues one item without blocking; `None` when the queue is empty.
    pub fn get(&self) -> Option<T> {
        self.inner.pop()
    }

    /// Number of items currently queued.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the queue is currently empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Grabs up to `max` items. Returns fewer (possibly zero) when the queue
    /// runs dry first.
    pub fn drain(&self, max: usize) -> Vec<T> {
        let mut chunk = Vec::with_capacity(max.min(self.inner.len()));
        for _ in 0..max {
            match self.inner.pop() {
                Some(item) => chunk.push(item),
                None => break,
            }
        }
        chunk
    }
}

impl<T> Default for MessageQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
