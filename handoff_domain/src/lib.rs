// /////////////////////////////////////////////////////////////////////////////
// Handoff Buffer Manager
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Handoff Domain
//!
//! Domain layer for the handoff buffer manager. This crate holds the pure
//! vocabulary of the system, independent of the async runtime, the database,
//! and the filesystem layout of any particular deployment:
//!
//! - **Messages** - [`FileItem`] and [`TransferRecord`], the values that flow
//!   through the pipeline queues, plus the subprocess status sentinels.
//! - **Value objects** - [`ChecksumAlgorithm`] for content identity and
//!   [`CommandTemplate`] for `{name}`-placeholder command rendering.
//! - **Task capability** - the [`Task`] trait implemented by every pipeline
//!   stage, and the [`Sequence`] composite that runs several in order.
//! - **Errors** - [`HandoffError`], the single error type used across the
//!   workspace.
//!
//! ## Layering
//!
//! The domain crate is at the bottom of the dependency graph: the application
//! and bootstrap crates depend on it, never the other way around. Anything
//! that talks to the operating system (queues, subprocesses, the ledger)
//! lives in the `handoff` crate and only *uses* the types defined here.

pub mod error;
pub mod messages;
pub mod task;
pub mod value_objects;

// Re-export commonly used types
pub use error::{HandoffError, Result};
pub use messages::{status, unix_timestamp, FileItem, TransferRecord};
pub use task::{Sequence, Task};
pub use value_objects::checksum::ChecksumAlgorithm;
pub use value_objects::command_template::CommandTemplate;
