//! Engine configuration via `trellis.toml`
//!
//! A small config file read at startup. When the engine is built with
//! [`EngineBuilder::config_file`](crate::EngineBuilder::config_file) and the
//! file does not exist yet, a commented default is written in its place. To
//! change settings, edit the file and rebuild the engine.

use serde::{Deserialize, Serialize};
use std::path::Path;
use trellis_core::{LanguageId, TrellisError, TrellisResult};

/// Config file name used by convention.
pub const CONFIG_FILE_NAME: &str = "trellis.toml";

/// Engine configuration loaded from `trellis.toml`.
///
/// # Example
///
/// ```toml
/// system_language = "en-GB"
/// strict_reads = false
/// # max_limit = 500
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Last language of every translation fallback chain.
    #[serde(default = "default_system_language")]
    pub system_language: String,
    /// Whether reads fail on missing ids unless told otherwise.
    #[serde(default)]
    pub strict_reads: bool,
    /// Upper bound applied to every criteria limit (uncapped when absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_limit: Option<usize>,
}

fn default_system_language() -> String {
    "en-GB".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            system_language: default_system_language(),
            strict_reads: false,
            max_limit: None,
        }
    }
}

impl EngineConfig {
    /// The system language as a [`LanguageId`].
    pub fn system_language(&self) -> LanguageId {
        LanguageId::new(self.system_language.clone())
    }

    /// Limit to apply for a criteria that asked for `requested`.
    pub fn effective_limit(&self, requested: Option<usize>) -> Option<usize> {
        match (requested, self.max_limit) {
            (Some(r), Some(max)) => Some(r.min(max)),
            (Some(r), None) => Some(r),
            (None, max) => max,
        }
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Trellis engine configuration
#
# Language consulted last when resolving translated fields (default: "en-GB").
# The chain is: requested language, context fallback language, system language.
system_language = "en-GB"

# Fail reads on missing ids instead of omitting them (default: false).
strict_reads = false

# Cap applied to every criteria limit. Leave commented out for no cap.
# max_limit = 500
"#
    }

    /// Parse config from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if the content cannot be parsed or holds an
    /// invalid value.
    pub fn from_toml_str(content: &str) -> TrellisResult<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> TrellisResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TrellisError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            TrellisError::Config(msg) => {
                TrellisError::Config(format!("{} ({})", msg, path.display()))
            }
            other => other,
        })
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> TrellisResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                TrellisError::Config(format!(
                    "failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> TrellisResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| TrellisError::Config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            TrellisError::Config(format!(
                "failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    fn validate(&self) -> TrellisResult<()> {
        if self.system_language.trim().is_empty() {
            return Err(TrellisError::Config(
                "system_language must not be empty".to_string(),
            ));
        }
        if self.max_limit == Some(0) {
            return Err(TrellisError::Config(
                "max_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
