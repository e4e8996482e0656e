// /////////////////////////////////////////////////////////////////////////////
// Handoff Buffer Manager
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Command-Line Interface
//!
//! CLI structure for the `handoffd` binary. Every subcommand takes the path
//! to the YAML configuration file; semantic validation of that file happens
//! in the application layer, so this module stays a thin parsing shell.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Main CLI structure
#[derive(Parser, Debug, Clone)]
#[command(name = "handoffd")]
#[command(about = concat!("Handoff buffer manager v", env!("CARGO_PKG_VERSION")))]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Create the ledger tables required by the manager
    Initdb {
        /// Configuration file path
        config: PathBuf,
    },

    /// Remove existing ledger tables
    Dropdb {
        /// Configuration file path
        config: PathBuf,
    },

    /// Validate the configuration file
    Validate {
        /// Configuration file path
        config: PathBuf,
    },

    /// Start the manager
    Run {
        /// Configuration file path
        config: PathBuf,
    },
}

impl Commands {
    /// The configuration file path every subcommand carries.
    pub fn config_path(&self) -> &PathBuf {
        match self {
            Commands::Initdb { config }
            | Commands::Dropdb { config }
            | Commands::Validate { config }
            | Commands::Run { config } => config,
        }
    }
}

/// Parse CLI arguments.
///
/// Clap exits the process with a usage message if parsing fails, and handles
/// `--help` and `--version` itself.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_subcommand() {
        let cli = Cli::try_parse_from(["handoffd", "run", "/etc/handoff.yaml"]).unwrap();
        match cli.command {
            Commands::Run { ref config } => {
                assert_eq!(config, &PathBuf::from("/etc/handoff.yaml"));
            }
            _ => panic!("expected run subcommand"),
        }
        assert_eq!(cli.command.config_path(), &PathBuf::from("/etc/handoff.yaml"));
    }

    #[test]
    fn test_parse_all_subcommands() {
        for name in ["initdb", "dropdb", "validate", "run"] {
            let cli = Cli::try_parse_from(["handoffd", name, "cfg.yaml"]).unwrap();
            assert_eq!(cli.command.config_path(), &PathBuf::from("cfg.yaml"));
        }
    }

    #[test]
    fn test_missing_config_is_an_error() {
        assert!(Cli::try_parse_from(["handoffd", "run"]).is_err());
    }

    #[test]
    fn test_unknown_subcommand_is_an_error() {
        assert!(Cli::try_parse_from(["handoffd", "restart", "cfg.yaml"]).is_err());
    }
}
