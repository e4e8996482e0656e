// /////////////////////////////////////////////////////////////////////////////
// Handoff Buffer Manager
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # handoffd
//!
//! Entry point wiring the bootstrap CLI to the application:
//!
//! - `initdb <config>` - create the ledger tables
//! - `dropdb <config>` - drop the ledger tables
//! - `validate <config>` - structural + semantic configuration check
//! - `run <config>` - start the manager until a shutdown signal arrives
//!
//! Exit codes: 0 success, 1 configuration error, 2 runtime failure.

use std::path::Path;

use tracing::error;

use handoff::application::manager::Manager;
use handoff::infrastructure::config::Config;
use handoff::infrastructure::ledger::repository::Ledger;
use handoff::infrastructure::ledger::schema;
use handoff::infrastructure::logging::init_logging;
use handoff_bootstrap::{create_signal_handler, parse_cli, Commands, ExitCode, ShutdownCoordinator};
use handoff_domain::{HandoffError, Result};

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = parse_cli();

    match dispatch(cli.command).await {
        Ok(()) => ExitCode::Success.into(),
        Err(e) => {
            // Logging may not be initialized yet (e.g. a bad config file),
            // so report on stderr as well.
            eprintln!("handoffd: {e}");
            error!(error = %e, "command failed");
            let code = match e.category() {
                "configuration" | "serialization" => ExitCode::ConfigError,
                _ => ExitCode::RuntimeFailure,
            };
            code.into()
        }
    }
}

async fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Initdb { config } => {
            let config = setup(&config)?;
            let pool = schema::connect(&config.database).await?;
            schema::create_tables(&pool).await
        }
        Commands::Dropdb { config } => {
            let config = setup(&config)?;
            let pool = schema::connect(&config.database).await?;
            schema::drop_tables(&pool).await
        }
        Commands::Validate { config } => {
            let config = Config::load(&config)?;
            config.validate()
        }
        Commands::Run { config } => {
            let config = setup(&config)?;
            config.validate()?;
            run_manager(&config).await
        }
    }
}

/// Loads the configuration and initializes logging from it.
fn setup(path: &Path) -> Result<Config> {
    let config = Config::load(path)?;
    init_logging(&config.logging)?;
    Ok(config)
}

async fn run_manager(config: &Config) -> Result<()> {
    let ledger = Ledger::connect(&config.database).await?;
    ensure_bootstrapped(&ledger).await?;
    let manager = Manager::new(config, ledger.clone())?;

    let coordinator = ShutdownCoordinator::new();
    let token = coordinator.token();
    tokio::spawn(async move {
        let handler = create_signal_handler();
        handler
            .wait_for_signal(Box::new(move || coordinator.initiate_shutdown()))
            .await;
    });

    let result = manager.run(token).await;
    ledger.pool().close().await;
    result
}

/// A missing ledger schema is a bootstrap failure, not something to discover
/// mid-cycle: fail fast with a pointer at `initdb`.
async fn ensure_bootstrapped(ledger: &Ledger) -> Result<()> {
    let present: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' \
         AND name IN ('files', 'transfer_batches', 'file_transfer_attempts')",
    )
    .fetch_one(ledger.pool())
    .await
    .map_err(|e| HandoffError::database_error(e.to_string()))?;

    if present != 3 {
        return Err(HandoffError::database_error(
            "ledger tables are missing; run 'handoffd initdb <config>' first",
        ));
    }
    Ok(())
}
