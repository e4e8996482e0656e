// /////////////////////////////////////////////////////////////////////////////
// Handoff Buffer Manager
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Configuration
//!
//! Typed configuration for the daemon, loaded from a YAML file:
//!
//! ```yaml
//! handoff:
//!   buffer: /data/buffer
//!   holding: /data/holding
//! endpoint:
//!   user: alice
//!   host: endpoint.example.org
//!   buffer: /remote/buffer
//!   staging: /remote/staging
//!   commands:
//!     remote: "ssh {user}@{host} {command}"
//!     transfer: "scp -BCpq {batch} {user}@{host}:{dest}"
//! database:
//!   engine: "sqlite:///var/lib/handoff/ledger.db"
//! general:
//!   chunk_size: 10
//!   num_threads: 4
//! ```
//!
//! Structural validation is the deserialization itself; the semantic checks
//! (template placeholders, glob syntax, value ranges) live in
//! [`Config::validate`] and are also what the `validate` subcommand runs.
//! Directory existence is deliberately *not* checked here - that belongs to
//! component construction, so `validate` can be used on a machine that is
//! not the handoff host.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use handoff_domain::{ChecksumAlgorithm, CommandTemplate, HandoffError, Result};

/// Substitution names the porter computes at runtime; templates may use them
/// in addition to the endpoint parameters.
pub const COMPUTED_PARAMETERS: &[&str] = &["command", "source", "dest", "batch", "file"];

/// Top-level configuration document.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub handoff: HandoffConfig,
    pub endpoint: EndpointConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub general: GeneralConfig,
}

/// Local directories on the handoff host.
#[derive(Debug, Clone, Deserialize)]
pub struct HandoffConfig {
    /// Directory upstream writers drop files into.
    pub buffer: PathBuf,
    /// Directory where successfully transferred files are archived.
    pub holding: PathBuf,
}

/// The remote endpoint receiving files.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    pub user: String,
    pub host: String,
    /// Remote directory downstream consumers watch.
    pub buffer: String,
    /// Intermediate landing zone; transfers go here first and are promoted
    /// to `buffer` with an intra-host rename. Unset means direct transfers.
    #[serde(default)]
    pub staging: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub commands: Option<CommandsConfig>,
}

/// Endpoint command templates.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandsConfig {
    /// Runs a shell command at the remote host; must use `{command}`.
    pub remote: String,
    /// Copies files to the remote host; must use exactly one of `{batch}`
    /// or `{file}`, plus `{dest}`.
    pub transfer: String,
}

/// Ledger connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Connection string, e.g. `sqlite:///var/lib/handoff/ledger.db`.
    pub engine: String,
    /// Connection-pool size cap; the driver default applies when unset.
    #[serde(default)]
    pub max_connections: Option<u32>,
    /// Log every executed statement at debug level.
    #[serde(default)]
    pub echo: bool,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or tracing filter directive (default `info`).
    pub level: String,
    /// Log to this file instead of stderr.
    pub file: Option<PathBuf>,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            format: LogFormat::Plain,
        }
    }
}

/// General tuning knobs with their defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Maximal number of messages to retrieve from an input queue at once.
    /// For transfers this bounds how many files a single transfer command
    /// may carry.
    pub chunk_size: usize,
    /// Number of concurrent porter workers.
    pub num_threads: usize,
    /// Seconds after which a child process is terminated; unset waits
    /// indefinitely.
    pub timeout: Option<u64>,
    /// Seconds the supervisor idles between cycles.
    pub pause: u64,
    /// Seconds an empty directory must remain unmodified before the eraser
    /// may remove it.
    pub expiration_time: u64,
    /// Glob patterns (relative to the buffer root) excluded from discovery.
    pub exclude_list: Vec<String>,
    /// Content digest used for file identity.
    pub checksum: ChecksumAlgorithm,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            chunk_size: 10,
            num_threads: 1,
            timeout: None,
            pause: 1,
            expiration_time: 86_400,
            exclude_list: Vec::new(),
            checksum: ChecksumAlgorithm::default(),
        }
    }
}

impl GeneralConfig {
    /// Subprocess timeout as a `Duration`, when configured.
    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }

    /// Supervisor pause between cycles.
    pub fn pause_duration(&self) -> Duration {
        Duration::from_secs(self.pause)
    }
}

impl EndpointConfig {
    /// The substitution parameters templates may reference: every configured
    /// endpoint key except `commands`.
    pub fn params(&self) -> HashMap<String, String> {
        let mut params = HashMap::new();
        params.insert("user".to_string(), self.user.clone());
        params.insert("host".to_string(), self.host.clone());
        params.insert("buffer".to_string(), self.buffer.clone());
        if let Some(staging) = &self.staging {
            params.insert("staging".to_string(), staging.clone());
        }
        if let Some(port) = self.port {
            params.insert("port".to_string(), port.to_string());
        }
        params
    }

    /// The command templates, or a configuration error when the section is
    /// missing.
    pub fn commands(&self) -> Result<&CommandsConfig> {
        self.commands
            .as_ref()
            .ok_or_else(|| HandoffError::invalid_config("endpoint commands not provided"))
    }

    /// Validates the command templates without constructing any component:
    /// the `remote` template must use `{command}`, the `transfer` template
    /// exactly one of `{batch}`/`{file}` plus `{dest}`, and every placeholder
    /// must resolve from the endpoint parameters or the computed names.
    pub fn validate_commands(&self) -> Result<()> {
        let commands = self.commands()?;

        let mut available: HashSet<String> = self.params().into_keys().collect();
        available.extend(COMPUTED_PARAMETERS.iter().map(|s| s.to_string()));

        let remote = CommandTemplate::parse(&commands.remote)?;
        if !remote.contains("command") {
            return Err(HandoffError::invalid_config(format!(
                "remote template '{}' does not use {{command}}",
                commands.remote
            )));
        }
        remote.ensure_resolvable(&available)?;

        let transfer = CommandTemplate::parse(&commands.transfer)?;
        match (transfer.contains("batch"), transfer.contains("file")) {
            (true, false) | (false, true) => {}
            _ => {
                return Err(HandoffError::invalid_config(format!(
                    "transfer template '{}' must use exactly one of {{batch}} or {{file}}",
                    commands.transfer
                )));
            }
        }
        if !transfer.contains("dest") {
            return Err(HandoffError::invalid_config(format!(
                "transfer template '{}' does not use {{dest}}",
                commands.transfer
            )));
        }
        transfer.ensure_resolvable(&available)?;

        Ok(())
    }
}

impl Config {
    /// Loads and deserializes the configuration file.
    ///
    /// Both read and parse failures are configuration errors: the daemon
    /// cannot start without a usable file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| HandoffError::invalid_config(format!("{}: {e}", path.display())))?;
        serde_yaml::from_str(&raw)
            .map_err(|e| HandoffError::invalid_config(format!("{}: {e}", path.display())))
    }

    /// Semantic validation beyond the type structure.
    pub fn validate(&self) -> Result<()> {
        let general = &self.general;
        if general.chunk_size == 0 {
            return Err(HandoffError::invalid_config("chunk_size must be at least 1"));
        }
        if general.num_threads == 0 {
            return Err(HandoffError::invalid_config("num_threads must be at least 1"));
        }
        if general.pause == 0 {
            return Err(HandoffError::invalid_config("pause must be at least 1"));
        }
        if general.expiration_time == 0 {
            return Err(HandoffError::invalid_config("expiration_time must be at least 1"));
        }
        if general.timeout == Some(0) {
            return Err(HandoffError::invalid_config("timeout must be at least 1 when set"));
        }
        for pattern in &general.exclude_list {
            glob::Pattern::new(pattern)
                .map_err(|e| HandoffError::invalid_config(format!("exclude pattern '{pattern}': {e}")))?;
        }
        if self.database.engine.trim().is_empty() {
            return Err(HandoffError::invalid_config("database engine not specified"));
        }
        self.endpoint.validate_commands()?;
        Ok(())
    }
}
