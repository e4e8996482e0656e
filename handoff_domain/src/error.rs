// /////////////////////////////////////////////////////////////////////////////
// Handoff Buffer Manager
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Error System
//!
//! This module provides the error type shared by every crate in the handoff
//! buffer manager workspace. Failures are classified by *kind* rather than by
//! source, which keeps the retry policy of the supervisor loop simple:
//!
//! - **Configuration errors** abort startup. They are raised at component
//!   construction time (missing keys, unresolvable template placeholders,
//!   nonexistent directories) and map to the configuration exit code.
//! - **Database errors** roll back the active chunk transaction; the affected
//!   files stay in the buffer and are picked up again on a later cycle.
//! - **I/O and timeout errors** are retry-safe by design: the file or batch
//!   they affect is skipped for the cycle and rediscovered later.
//! - **Internal errors** indicate a defect (a panicked worker, a poisoned
//!   invariant) and are surfaced loudly.
//!
//! ## Error Handling Strategy
//!
//! Errors are cheap, cloneable values carrying a rendered message. Callers
//! that need to branch on failure class use [`HandoffError::category`] or
//! [`HandoffError::is_recoverable`] instead of matching exhaustively.

use thiserror::Error;

/// Result type alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, HandoffError>;

/// Domain-specific errors for the handoff buffer manager.
///
/// Each variant includes a descriptive message designed to give an operator
/// enough context to act without reading the source.
#[derive(Error, Debug, Clone)]
pub enum HandoffError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Timeout error: {0}")]
    TimeoutError(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl HandoffError {
    /// Creates a new configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Creates a new IO error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::IoError(msg.into())
    }

    /// Creates a new database error
    pub fn database_error(msg: impl Into<String>) -> Self {
        Self::DatabaseError(msg.into())
    }

    /// Creates a new command error
    pub fn command_failed(msg: impl Into<String>) -> Self {
        Self::CommandFailed(msg.into())
    }

    /// Creates a new timeout error
    pub fn timeout_error(msg: impl Into<String>) -> Self {
        Self::TimeoutError(msg.into())
    }

    /// Creates a new cancellation error
    pub fn cancelled() -> Self {
        Self::Cancelled("operation cancelled".to_string())
    }

    /// Creates a new internal error
    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    /// Checks if the error is recoverable
    ///
    /// Recoverable errors leave the affected files in the buffer, so a later
    /// supervisor cycle retries the work without operator intervention.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            HandoffError::TimeoutError(_)
                | HandoffError::IoError(_)
                | HandoffError::DatabaseError(_)
                | HandoffError::CommandFailed(_)
        )
    }

    /// Gets the error category
    pub fn category(&self) -> &'static str {
        match self {
            HandoffError::InvalidConfiguration(_) => "configuration",
            HandoffError::IoError(_) => "io",
            HandoffError::DatabaseError(_) => "database",
            HandoffError::SerializationError(_) => "serialization",
            HandoffError::CommandFailed(_) => "command",
            HandoffError::TimeoutError(_) => "timeout",
            HandoffError::Cancelled(_) => "cancellation",
            HandoffError::InternalError(_) => "internal",
        }
    }
}

// Implement conversion from standard library errors
impl From<std::io::Error> for HandoffError {
    fn from(err: std::io::Error) -> Self {
        HandoffError::IoError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_mapping() {
        assert_eq!(HandoffError::invalid_config("x").category(), "configuration");
        assert_eq!(HandoffError::database_error("x").category(), "database");
        assert_eq!(HandoffError::timeout_error("x").category(), "timeout");
        assert_eq!(HandoffError::internal_error("x").category(), "internal");
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(HandoffError::io_error("disk hiccup").is_recoverable());
        assert!(HandoffError::timeout_error("slow endpoint").is_recoverable());
        assert!(HandoffError::command_failed("scp exited 1").is_recoverable());
        assert!(!HandoffError::invalid_config("missing key").is_recoverable());
        assert!(!HandoffError::internal_error("bug").is_recoverable());
    }

    #[test]
    fn test_from_io_error() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let converted: HandoffError = err.into();
        assert_eq!(converted.category(), "io");
        assert!(converted.to_string().contains("gone"));
    }

    #[test]
    fn test_display_includes_message() {
        let err = HandoffError::invalid_config("buffer not specified");
        assert_eq!(err.to_string(), "Invalid configuration: buffer not specified");
    }
}
