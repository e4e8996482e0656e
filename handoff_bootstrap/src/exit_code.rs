// /////////////////////////////////////////////////////////////////////////////
// Handoff Buffer Manager
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Exit Code Management
//!
//! The daemon keeps a deliberately small exit-code contract so wrapper
//! scripts and service managers can branch on it without a lookup table:
//!
//! - **0** - success
//! - **1** - configuration error (bad file, bad templates, missing paths)
//! - **2** - runtime failure (ledger bootstrap, irrecoverable loop error)

use std::fmt;

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum ExitCode {
    /// Successful termination (0)
    #[default]
    Success = 0,

    /// Configuration error (1)
    /// - Unreadable or malformed configuration file
    /// - Undefined template parameters
    /// - Nonexistent buffer or holding directory
    ConfigError = 1,

    /// Runtime failure (2)
    /// - Ledger bootstrap failure
    /// - Unexpected error escaping the supervisor loop
    RuntimeFailure = 2,
}

impl ExitCode {
    /// Convert to i32 for use with `std::process::exit`
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get a human-readable description of the exit code
    pub fn description(self) -> &'static str {
        match self {
            ExitCode::Success => "Success",
            ExitCode::ConfigError => "Configuration error",
            ExitCode::RuntimeFailure => "Runtime failure",
        }
    }

    /// Check if this is a success exit code
    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Success)
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_i32())
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code.as_i32()
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> std::process::ExitCode {
        std::process::ExitCode::from(code.as_i32() as u8)
    }
}
