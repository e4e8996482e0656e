// /////////////////////////////////////////////////////////////////////////////
// Handoff Buffer Manager
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Logging Setup
//!
//! Initializes the global `tracing` subscriber from the `logging` section of
//! the configuration. The `level` value accepts either a plain level name
//! (`info`, `debug`, ...) or a full tracing filter directive
//! (`info,handoff=debug,sqlx=warn`), which is how statement-level noise gets
//! tuned in the field without a rebuild.

use std::fs::File;
use std::str::FromStr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use handoff_domain::{HandoffError, Result};

use super::config::{LogFormat, LoggingConfig};

/// Builds the filter, rejecting level names tracing does not know.
fn parse_filter(level: &str) -> Result<EnvFilter> {
    // A bare word must be a level name; anything with directives is handed
    // to EnvFilter, which validates each directive on its own.
    if !level.contains([',', '=']) {
        tracing::Level::from_str(level)
            .map_err(|_| HandoffError::invalid_config(format!("unknown log level '{level}'")))?;
    }
    EnvFilter::try_new(level).map_err(|e| HandoffError::invalid_config(format!("log filter '{level}': {e}")))
}

/// Installs the global subscriber. May only be called once per process;
/// a second call reports an internal error.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = parse_filter(&config.level)?;

    match &config.file {
        Some(path) => {
            let file = File::options()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| HandoffError::invalid_config(format!("log file '{}': {e}", path.display())))?;
            install(filter, config.format, Arc::new(file))
        }
        None => install(filter, config.format, std::io::stderr),
    }
}

fn install<W>(filter: EnvFilter, format: LogFormat, writer: W) -> Result<()>
where
    W: for<'a> tracing_subscriber::fmt::MakeWriter<'a> + Send + Sync + 'static,
{
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(true);

    let installed = match format {
        LogFormat::Plain => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    installed.map_err(|e| HandoffError::internal_error(format!("logging already initialized: {e}")))
}
