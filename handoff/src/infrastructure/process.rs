// /////////////////////////////////////////////////////////////////////////////
// Handoff Buffer Manager
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Subprocess Execution
//!
//! All external tools - the remote shell, the transfer command, the remote
//! `mv` and `find` - are invoked through one wrapper so exit-code translation
//! lives in exactly one place and callers only ever see
//! [`CommandOutcome`]s.
//!
//! Command lines are split with shell-lexical rules (`shlex`); no shell is
//! involved in the actual spawn. Output is captured as text, wall-clock
//! duration is measured, and the configured timeout is enforced by killing
//! the child when it expires.
//!
//! Status mapping:
//!
//! | condition | status |
//! |---|---|
//! | exit 0 | [`status::SUCCESS`] |
//! | non-zero exit | [`status::REMOTE_IO_ERROR`] |
//! | timeout, child killed | [`status::TIMED_OUT`] |
//! | unparsable line / spawn failure | [`status::EXEC_FAILED`] |

use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::debug;

use handoff_domain::status;

/// The observable result of one subprocess invocation.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    /// Mapped exit status (see module docs).
    pub status: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Wall-clock duration of the attempt, in seconds.
    pub duration: f64,
}

impl CommandOutcome {
    /// Whether the command completed with exit status zero.
    pub fn succeeded(&self) -> bool {
        self.status == status::SUCCESS
    }

    fn failed(status: i32, stderr: String, duration: f64) -> Self {
        Self {
            status,
            stdout: String::new(),
            stderr,
            duration,
        }
    }
}

/// Executes shell-like command lines with an optional timeout.
#[derive(Debug, Clone, Default)]
pub struct CommandRunner {
    timeout: Option<Duration>,
}

impl CommandRunner {
    /// Creates a runner; `timeout` of `None` waits indefinitely.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    /// Runs a command line to completion and maps its result.
    ///
    /// Never returns an error: every failure mode is folded into the
    /// outcome's status so callers record it instead of branching on it.
    pub async fn execute(&self, cmdline: &str) -> CommandOutcome {
        debug!(command = cmdline, "executing");
        let started = Instant::now();

        let argv = match shlex::split(cmdline) {
            Some(argv) if !argv.is_empty() => argv,
            _ => {
                return CommandOutcome::failed(
                    status::EXEC_FAILED,
                    format!("cannot parse command line: '{cmdline}'"),
                    started.elapsed().as_secs_f64(),
                );
            }
        };

        let mut command = Command::new(&argv[0]);
        command
            .args(&argv[1..])
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            // Dropping the in-flight future on timeout must reap the child.
            .kill_on_drop(true);

        let output = command.output();
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, output).await {
                Ok(result) => result,
                Err(_) => {
                    let duration = started.elapsed().as_secs_f64();
                    let outcome = CommandOutcome::failed(
                        status::TIMED_OUT,
                        format!("command timed out after {} s: '{cmdline}'", limit.as_secs_f64()),
                        duration,
                    );
                    debug!(status = outcome.status, duration, "execution timed out");
                    return outcome;
                }
            },
            None => output.await,
        };
        let duration = started.elapsed().as_secs_f64();

        let outcome = match result {
            Ok(output) => CommandOutcome {
                status: if output.status.success() {
                    status::SUCCESS
                } else {
                    status::REMOTE_IO_ERROR
                },
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                duration,
            },
            Err(e) => CommandOutcome::failed(status::EXEC_FAILED, format!("cannot spawn '{cmdline}': {e}"), duration),
        };

        debug!(
            status = outcome.status,
            duration = outcome.duration,
            "execution completed"
        );
        outcome
    }
}
