//! Binding configuration
//!
//! Settings can come from a TOML document:
//!
//! ```toml
//! log_allocations = true
//! capture_backtraces = false
//! ```
//!
//! or from the environment (`SKBIND_LOG_ALLOCATIONS`,
//! `SKBIND_CAPTURE_BACKTRACES`). Nothing takes effect until
//! [`BindingConfig::apply`] is called.

use crate::alloc_log;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

pub const LOG_ALLOCATIONS_ENV: &str = "SKBIND_LOG_ALLOCATIONS";
pub const CAPTURE_BACKTRACES_ENV: &str = "SKBIND_CAPTURE_BACKTRACES";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct BindingConfig {
    /// Report proxy construction and finalization to the allocation hooks
    #[serde(default)]
    pub log_allocations: bool,
    /// Record a backtrace as the allocation site of every proxy
    #[serde(default)]
    pub capture_backtraces: bool,
}

impl BindingConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reads the settings from the environment. Unset variables are `false`.
    pub fn from_env() -> Self {
        Self {
            log_allocations: env_flag(LOG_ALLOCATIONS_ENV),
            capture_backtraces: env_flag(CAPTURE_BACKTRACES_ENV),
        }
    }

    /// Installs the settings process-wide.
    pub fn apply(&self) {
        tracing::debug!(
            target: "skbind::alloc",
            log_allocations = self.log_allocations,
            capture_backtraces = self.capture_backtraces,
            "applying binding configuration"
        );
        alloc_log::set_capture_backtraces(self.capture_backtraces);
        alloc_log::set_allocation_logging(self.log_allocations);
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).map_or(false, |value| parse_flag(&value))
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
