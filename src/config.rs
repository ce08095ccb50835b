//! Relay configuration parsing and validation.
//!
//! Every section and field is optional; an empty file yields the defaults.
//!
//! ```toml
//! [process]
//! timeout_seconds = 600
//! inherit_env = true
//!
//! [bridge]
//! tool_debounce_ms = 500
//! verbose_tool_results = false
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::bridge::{BridgeOptions, ToolResultVerbosity};
use crate::process::{EnvPolicy, InvocationDescriptor};
use crate::{AppError, Result};

/// Subprocess execution settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ProcessConfig {
    /// Wall-clock limit per invocation.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Pass the full host environment to the child; when `false`, only the
    /// allowlisted variables are passed.
    #[serde(default = "default_true")]
    pub inherit_env: bool,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            inherit_env: true,
        }
    }
}

/// Agent event bridge settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct BridgeConfig {
    /// Quiet period before tool summaries are flushed.
    #[serde(default = "default_tool_debounce_ms")]
    pub tool_debounce_ms: u64,
    /// Report every finished tool individually as well.
    #[serde(default)]
    pub verbose_tool_results: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            tool_debounce_ms: default_tool_debounce_ms(),
            verbose_tool_results: false,
        }
    }
}

fn default_timeout_seconds() -> u64 {
    600
}

fn default_tool_debounce_ms() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

/// Top-level configuration parsed from TOML.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct RelayConfig {
    /// Subprocess settings.
    #[serde(default)]
    pub process: ProcessConfig,
    /// Bridge settings.
    #[serde(default)]
    pub bridge: BridgeConfig,
}

impl RelayConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read, contains
    /// invalid TOML, or fails validation.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse and validate configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Per-invocation timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.process.timeout_seconds)
    }

    /// Environment policy for spawned children.
    #[must_use]
    pub fn env_policy(&self) -> EnvPolicy {
        if self.process.inherit_env {
            EnvPolicy::Inherit
        } else {
            EnvPolicy::Allowlist
        }
    }

    /// Apply the configured timeout and environment policy to `descriptor`.
    #[must_use]
    pub fn apply_to(&self, descriptor: InvocationDescriptor) -> InvocationDescriptor {
        descriptor
            .with_timeout(self.timeout())
            .with_env_policy(self.env_policy())
    }

    /// Bridge options reflecting this configuration, with a fresh run id.
    #[must_use]
    pub fn bridge_options(&self) -> BridgeOptions {
        BridgeOptions {
            tool_debounce: Duration::from_millis(self.bridge.tool_debounce_ms),
            verbose_tool_results: if self.bridge.verbose_tool_results {
                ToolResultVerbosity::On
            } else {
                ToolResultVerbosity::Off
            },
            ..BridgeOptions::default()
        }
    }

    fn validate(&self) -> Result<()> {
        if self.process.timeout_seconds == 0 {
            return Err(AppError::Config(
                "process.timeout_seconds must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
