//! Composition configuration
//!
//! Provides a builder-pattern configuration threaded explicitly through
//! every [`Composer`](crate::compose::Composer). Nothing in the engine reads
//! configuration from global state.

use crate::rule::{RuleOptions, RulePolicy, Severity};
use crate::setting::ScriptLanguage;

/// Defaults and site context for composite operations.
///
/// # Example
///
/// ```ignore
/// use dcmforge::ComposeConfig;
///
/// // Load from environment variables
/// let config = ComposeConfig::from_env();
///
/// // Or build programmatically
/// let config = ComposeConfig::builder()
///     .site_code("PS1")
///     .severity(Severity::Critical)
///     .verify_setting_reference(true)
///     .build();
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeConfig {
    /// Site code of the configuration store
    /// Required for Direct mode only
    pub site_code: Option<String>,

    /// Run discovery and remediation in 64-bit context unless a request says otherwise
    pub is_64bit: bool,

    /// Language assumed for caller-supplied scripts
    pub script_language: ScriptLanguage,

    /// Rule severity when a request does not set one
    pub severity: Severity,

    /// Remediation flag when a request does not set one
    pub remediate: bool,

    /// Not-found policy when a request does not set one
    pub noncompliant_when_not_found: bool,

    /// Check that a referenced Setting exists before merging its Rule
    pub verify_setting_reference: bool,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            site_code: None,
            is_64bit: true,
            script_language: ScriptLanguage::VbScript,
            severity: Severity::Warning,
            remediate: true,
            noncompliant_when_not_found: true,
            verify_setting_reference: false,
        }
    }
}

impl ComposeConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `DCM_SITE_CODE`: site code for Direct mode (default: unset)
    /// - `DCM_IS_64BIT`: "true"/"false" (default: "true")
    /// - `DCM_SCRIPT_LANGUAGE`: "VBScript", "JScript", "PowerShell" (default: "VBScript")
    /// - `DCM_SEVERITY`: "None", "Warning", "Critical", "CriticalWithEvent" (default: "Warning")
    /// - `DCM_REMEDIATE`: "true"/"false" (default: "true")
    /// - `DCM_NONCOMPLIANT_WHEN_NOT_FOUND`: "true"/"false" (default: "true")
    /// - `DCM_VERIFY_REFERENCES`: "true"/"false" (default: "false")
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let site_code = std::env::var("DCM_SITE_CODE")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let is_64bit = std::env::var("DCM_IS_64BIT")
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(defaults.is_64bit);

        let script_language = std::env::var("DCM_SCRIPT_LANGUAGE")
            .ok()
            .and_then(|s| ScriptLanguage::parse(&s).ok())
            .unwrap_or(defaults.script_language);

        let severity = std::env::var("DCM_SEVERITY")
            .ok()
            .and_then(|s| Severity::parse(&s).ok())
            .unwrap_or(defaults.severity);

        let remediate = std::env::var("DCM_REMEDIATE")
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(defaults.remediate);

        let noncompliant_when_not_found = std::env::var("DCM_NONCOMPLIANT_WHEN_NOT_FOUND")
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(defaults.noncompliant_when_not_found);

        let verify_setting_reference = std::env::var("DCM_VERIFY_REFERENCES")
            .map(|s| s.to_lowercase() == "true")
            .unwrap_or(defaults.verify_setting_reference);

        Self {
            site_code,
            is_64bit,
            script_language,
            severity,
            remediate,
            noncompliant_when_not_found,
            verify_setting_reference,
        }
    }

    /// Create a new builder for programmatic configuration.
    pub fn builder() -> ComposeConfigBuilder {
        ComposeConfigBuilder::default()
    }

    /// Resolve per-request options against these defaults
    pub fn resolve(&self, options: &RuleOptions, fallback_name: &str) -> RulePolicy {
        let display_name = options
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(fallback_name)
            .to_string();

        RulePolicy {
            display_name,
            description: options.description.clone(),
            severity: options.severity.unwrap_or(self.severity),
            remediate: options.remediate.unwrap_or(self.remediate),
            noncompliant_when_not_found: options
                .noncompliant_when_not_found
                .unwrap_or(self.noncompliant_when_not_found),
        }
    }
}

/// Builder for ComposeConfig
#[derive(Debug, Clone, Default)]
pub struct ComposeConfigBuilder {
    config: ComposeConfig,
}

impl ComposeConfigBuilder {
    /// Set the site code used for Direct mode.
    pub fn site_code(mut self, code: impl Into<String>) -> Self {
        self.config.site_code = Some(code.into());
        self
    }

    /// Set the default 32/64-bit execution context.
    pub fn is_64bit(mut self, is_64bit: bool) -> Self {
        self.config.is_64bit = is_64bit;
        self
    }

    /// Set the default script language.
    pub fn script_language(mut self, language: ScriptLanguage) -> Self {
        self.config.script_language = language;
        self
    }

    /// Set the default rule severity.
    pub fn severity(mut self, severity: Severity) -> Self {
        self.config.severity = severity;
        self
    }

    /// Set the default remediation flag.
    pub fn remediate(mut self, remediate: bool) -> Self {
        self.config.remediate = remediate;
        self
    }

    /// Set the default not-found policy.
    pub fn noncompliant_when_not_found(mut self, noncompliant: bool) -> Self {
        self.config.noncompliant_when_not_found = noncompliant;
        self
    }

    /// Enable existence checks for referenced Settings.
    pub fn verify_setting_reference(mut self, verify: bool) -> Self {
        self.config.verify_setting_reference = verify;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ComposeConfig {
        self.config
    }
}
