//! Configuration parsing for dcmforge.toml
//!
//! ```toml
//! [site]
//! code = "PS1"
//!
//! [store]
//! dir = "./artifacts"
//!
//! [defaults]
//! severity = "Critical"
//! is_64bit = true
//! script_language = "PowerShell"
//! remediate = true
//! noncompliant_when_not_found = true
//! verify_references = false
//!
//! [logging]
//! format = "compact"
//! filter = "dcmforge=info"
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};

use dcmforge::observability::{LogFormat, ObservabilityConfig};
use dcmforge::setting::ScriptLanguage;
use dcmforge::{ComposeConfig, Severity};

use crate::error::{CliError, Result};

/// Root configuration structure for dcmforge.toml
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DcmforgeConfig {
    /// Site context for Direct mode
    #[serde(default)]
    pub site: SiteConfig,

    /// Where committed documents are written
    #[serde(default)]
    pub store: StoreConfig,

    /// Request defaults
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SiteConfig {
    /// Site code; `DCM_SITE_CODE` is used when unset
    pub code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_dir")]
    pub dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: default_store_dir(),
        }
    }
}

fn default_store_dir() -> PathBuf {
    PathBuf::from(".")
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefaultsConfig {
    pub severity: Option<Severity>,
    pub is_64bit: Option<bool>,
    pub script_language: Option<ScriptLanguage>,
    pub remediate: Option<bool>,
    pub noncompliant_when_not_found: Option<bool>,
    pub verify_references: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    pub format: Option<LogFormat>,
    pub filter: Option<String>,
}

impl DcmforgeConfig {
    /// Load configuration, falling back to defaults when the file is absent
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::from_file(path)
    }

    /// Load configuration from a file path
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| CliError::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::from_str(&content, path)
    }

    /// Parse configuration from a string
    pub fn from_str(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| CliError::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Engine configuration: environment first, then file values on top
    pub fn compose_config(&self) -> ComposeConfig {
        let env = ComposeConfig::from_env();
        let defaults = &self.defaults;

        let mut builder = ComposeConfig::builder()
            .is_64bit(defaults.is_64bit.unwrap_or(env.is_64bit))
            .script_language(defaults.script_language.unwrap_or(env.script_language))
            .severity(defaults.severity.unwrap_or(env.severity))
            .remediate(defaults.remediate.unwrap_or(env.remediate))
            .noncompliant_when_not_found(
                defaults
                    .noncompliant_when_not_found
                    .unwrap_or(env.noncompliant_when_not_found),
            )
            .verify_setting_reference(
                defaults
                    .verify_references
                    .unwrap_or(env.verify_setting_reference),
            );

        if let Some(code) = self.site.code.clone().or(env.site_code) {
            builder = builder.site_code(code);
        }
        builder.build()
    }

    /// Logging configuration; `verbose` raises the filter to debug
    pub fn observability_config(&self, verbose: bool) -> ObservabilityConfig {
        let env = ObservabilityConfig::from_env();
        let filter = if verbose {
            "dcmforge=debug".to_string()
        } else {
            self.logging.filter.clone().unwrap_or(env.log_filter)
        };

        ObservabilityConfig::builder()
            .log_format(self.logging.format.unwrap_or(env.log_format))
            .log_filter(filter)
            .build()
    }
}
