// /////////////////////////////////////////////////////////////////////////////
// Handoff Buffer Manager
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Handoff Buffer Manager
//!
//! A long-running daemon that continuously relocates files written into a
//! local *buffer* directory to a remote *endpoint*, then archives the
//! transferred files in a local *holding area* and reclaims empty subtrees.
//!
//! ## Pipeline
//!
//! Five cooperating stages are coupled through non-blocking queues:
//!
//! ```text
//! Finder -> discovered -> Tracker -> pending -> Porter (xN) -> transfers
//!        -> Recorder -> processed -> Mover -> completed -> Tracker.update
//! ```
//!
//! The [`application::manager::Manager`] drives one cycle after another,
//! running the porter stage on a pool of worker tasks and the cleaner
//! (mover + eraser) on a background daemon task. Transfers use a two-phase
//! protocol (stage, then promote with an intra-host rename) so downstream
//! consumers watching the endpoint's buffer never observe half-written
//! files. Every file and every transfer attempt is recorded in a SQLite
//! ledger, which is what makes rediscovery after a crash or a failed batch
//! idempotent.
//!
//! ## Layout
//!
//! - [`application`] - pipeline stages and the supervisor cycle
//! - [`infrastructure`] - configuration, logging, ledger, subprocesses,
//!   queues, and task supervision

pub mod application;
pub mod infrastructure;
