// /////////////////////////////////////////////////////////////////////////////
// Handoff Buffer Manager
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Command Templates
//!
//! Endpoint commands are configured as strings with named placeholders in
//! `{name}` form, e.g.
//!
//! ```text
//! remote:   "ssh {user}@{host} {command}"
//! transfer: "scp -BCpq {batch} {user}@{host}:{dest}"
//! ```
//!
//! A [`CommandTemplate`] parses such a string once, remembers its
//! placeholders, and renders concrete command lines from a parameter map.
//! Placeholder validation happens at component construction, never at first
//! use: a template referencing a parameter nobody can supply is a
//! configuration error that must abort startup.

use std::collections::{HashMap, HashSet};

use regex::Regex;

use crate::error::{HandoffError, Result};

/// A command-line template with `{name}` placeholders.
#[derive(Debug, Clone)]
pub struct CommandTemplate {
    raw: String,
    placeholders: Vec<String>,
}

impl CommandTemplate {
    /// Parses a template string, extracting its placeholder names.
    pub fn parse(template: &str) -> Result<Self> {
        if template.trim().is_empty() {
            return Err(HandoffError::invalid_config("command template is empty"));
        }
        // Unwrap is safe: the pattern is a literal and compiles.
        let pattern = Regex::new(r"\{(\w+)\}").map_err(|e| HandoffError::internal_error(e.to_string()))?;
        let mut placeholders = Vec::new();
        for capture in pattern.captures_iter(template) {
            let name = capture[1].to_string();
            if !placeholders.contains(&name) {
                placeholders.push(name);
            }
        }
        Ok(Self {
            raw: template.to_string(),
            placeholders,
        })
    }

    /// The raw template string.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Placeholder names in order of first appearance.
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    /// Whether the template references the given placeholder.
    pub fn contains(&self, name: &str) -> bool {
        self.placeholders.iter().any(|p| p == name)
    }

    /// Verifies every placeholder can be satisfied from `available`.
    pub fn ensure_resolvable(&self, available: &HashSet<String>) -> Result<()> {
        let undefined: Vec<&str> = self
            .placeholders
            .iter()
            .filter(|p| !available.contains(p.as_str()))
            .map(|p| p.as_str())
            .collect();
        if undefined.is_empty() {
            Ok(())
        } else {
            Err(HandoffError::invalid_config(format!(
                "parameters {} are used, but not defined in '{}'",
                undefined.join(", "),
                self.raw
            )))
        }
    }

    /// Returns a copy of the template with placeholder `from` renamed to `to`.
    pub fn rename_placeholder(&self, from: &str, to: &str) -> Result<Self> {
        let rewritten = self.raw.replace(&format!("{{{from}}}"), &format!("{{{to}}}"));
        Self::parse(&rewritten)
    }

    /// Renders a concrete command line from the parameter map.
    ///
    /// Every placeholder must have a value; an unresolved one is reported as
    /// a configuration error (construction-time validation should have made
    /// this unreachable).
    pub fn render(&self, params: &HashMap<String, String>) -> Result<String> {
        let mut rendered = self.raw.clone();
        for name in &self.placeholders {
            let value = params.get(name).ok_or_else(|| {
                HandoffError::invalid_config(format!("no value for parameter '{name}' in '{}'", self.raw))
            })?;
            rendered = rendered.replace(&format!("{{{name}}}"), value);
        }
        Ok(rendered)
    }
}
