/*!
config.rs - application configuration.

Sources, highest priority first:
  1. launcher flags (applied by the binary)
  2. CLI_TOOL_COMMANDS_DIR environment variable
  3. config file (JSON, or YAML when the extension is .yaml / .yml)
  4. defaults

`validate()` requires a non-empty name and version. A configured commands
directory that does not exist is only warned about at startup.
*/

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::CliError;
use crate::schema::{OptionSpec, global_options};

pub const ENV_COMMANDS_DIR: &str = "CLI_TOOL_COMMANDS_DIR";

/// A titled block of commands in the global help screen.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct CommandGroup {
    pub title: String,
    #[serde(default)]
    pub commands: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub name: String,
    pub version: String,
    #[serde(alias = "desc")]
    pub description: String,
    /// Program name shown in usage lines (falls back to `name`).
    pub bin: Option<String>,
    pub commands_dir: Option<PathBuf>,
    /// Commands listed first, in this order.
    pub commands_sort: Vec<String>,
    pub commands_group: Vec<CommandGroup>,
    /// Extra global options bound for every command.
    pub options: Vec<OptionSpec>,
}

impl AppConfig {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Default::default()
        }
    }

    /// Load from a JSON or YAML file.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        read_structured(path).map_err(|e| CliError::Config(format!("{e:#}")))
    }

    /// Environment fallback for the commands directory.
    pub fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var(ENV_COMMANDS_DIR)
            && !dir.trim().is_empty()
        {
            self.commands_dir = Some(PathBuf::from(dir.trim()));
        }
    }

    pub fn validate(&self) -> Result<(), CliError> {
        let mut failed = Vec::new();
        if self.name.trim().is_empty() {
            failed.push("name");
        }
        if self.version.trim().is_empty() {
            failed.push("version");
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(CliError::Config(format!(
                "need setting \"{}\" options for App",
                failed.join(", ")
            )))
        }
    }

    pub fn bin_name(&self) -> &str {
        self.bin.as_deref().unwrap_or(&self.name)
    }

    /// Built-in `help` / `quiet` followed by configured extras.
    pub fn global_options(&self) -> Vec<OptionSpec> {
        let mut all = global_options();
        for opt in &self.options {
            if !all.iter().any(|g| g.name == opt.name) {
                all.push(opt.clone());
            }
        }
        all
    }
}

/// Deserialize a JSON or YAML file, picking the format by extension.
pub(crate) fn read_structured<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if ext == "yaml" || ext == "yml" {
        serde_yaml::from_str(&raw).context("failed to parse YAML")
    } else {
        serde_json::from_str(&raw).context("failed to parse JSON")
    }
}
