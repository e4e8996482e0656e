// /////////////////////////////////////////////////////////////////////////////
// Handoff Buffer Manager
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Bootstrap Module
//!
//! The bootstrap crate sits outside the application layers and owns process
//! lifecycle concerns:
//!
//! - **Argument parsing** - the `handoffd` CLI surface (clap)
//! - **Exit codes** - the small, scripting-friendly exit code contract
//! - **Signal handling** - SIGTERM / SIGINT / SIGHUP for graceful shutdown
//! - **Shutdown coordination** - cancellation tokens handed to long-running
//!   tasks
//!
//! The application crate depends on bootstrap, never the other way around;
//! bootstrap knows nothing about buffers, ledgers, or transfer commands.

pub mod cli;
pub mod exit_code;
pub mod shutdown;
pub mod signals;

// Re-export commonly used types
pub use cli::{parse_cli, Cli, Commands};
pub use exit_code::ExitCode;
pub use shutdown::{CancellationToken, ShutdownCoordinator};
pub use signals::{create_signal_handler, NoOpSignalHandler, SystemSignals};
