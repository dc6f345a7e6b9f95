//! Composite operations
//!
//! A [`Composer`] turns requests into Setting and Rule fragments and merges
//! them into a document. Every request is validated and prepared before the
//! document is touched; the merge then runs against an in-memory copy, so a
//! failure anywhere leaves both the caller's document and the store
//! untouched.
//!
//! # Execution modes
//!
//! - [`ExecutionMode::Direct`]: mutate a [`LiveArtifact`] and commit it to an
//!   [`ArtifactStore`] once, after every step has succeeded.
//! - [`ExecutionMode::Transform`]: return the updated document text.
//!
//! # Example
//!
//! ```ignore
//! use dcmforge::{Composer, ComposeConfig, ExecutionMode, RegistryValueRequest};
//! use dcmforge::registry::{Hive, RegistryValueKind};
//!
//! let composer = Composer::new(ComposeConfig::default());
//! let request = RegistryValueRequest::new(
//!     Hive::LocalMachine, r"Software\Test", "foo", "bar", RegistryValueKind::String,
//! );
//! let outcome = composer.registry_compose(
//!     ExecutionMode::Transform { document: &xml, source_identity: "ScopeId_1/Application_2/1" },
//!     &[request],
//! )?;
//! ```

mod request;

pub use request::{Descriptors, RegistryValueRequest, RuleRequest, ScriptRequest};

use std::fmt;

use crate::artifact::{Artifact, SourceArtifactIdentity};
use crate::config::ComposeConfig;
use crate::error::{ComposeError, Result};
use crate::registry::{RegistryDataType, RegistryValueKind, ScalarType};
use crate::rule::{ConstantValue, Rule, RulePolicy, SettingReference};
use crate::script::{self, RegistryTarget, ScriptValue, COMPLIANT};
use crate::setting::{
    LogicalName, RegistrySetting, ScriptBody, ScriptSetting, Setting, SettingKind,
};
use crate::store::{ArtifactStore, LiveArtifact};
use crate::xml;

/// Where a composite operation reads from and writes to
pub enum ExecutionMode<'a> {
    /// Mutate a live document and persist it through the store
    Direct {
        handle: &'a mut LiveArtifact,
        store: &'a mut dyn ArtifactStore,
    },
    /// Return the updated document without persisting anything
    Transform {
        document: &'a str,
        source_identity: &'a str,
    },
}

impl ExecutionMode<'_> {
    fn name(&self) -> &'static str {
        match self {
            Self::Direct { .. } => "direct",
            Self::Transform { .. } => "transform",
        }
    }
}

impl fmt::Debug for ExecutionMode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct { handle, .. } => f
                .debug_struct("Direct")
                .field("identity", &handle.identity)
                .finish_non_exhaustive(),
            Self::Transform {
                source_identity, ..
            } => f
                .debug_struct("Transform")
                .field("source_identity", source_identity)
                .finish_non_exhaustive(),
        }
    }
}

/// Result of a composite operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposeOutcome {
    /// The document was committed; the live handle holds the new text
    Persisted { logical_names: Vec<LogicalName> },
    /// The updated document text
    Transformed {
        document: String,
        logical_names: Vec<LogicalName>,
    },
}

impl ComposeOutcome {
    /// Logical names of the Settings the Rules reference, in request order
    pub fn logical_names(&self) -> &[LogicalName] {
        match self {
            Self::Persisted { logical_names } | Self::Transformed { logical_names, .. } => {
                logical_names
            }
        }
    }

    /// Updated document, in Transform mode
    pub fn document(&self) -> Option<&str> {
        match self {
            Self::Persisted { .. } => None,
            Self::Transformed { document, .. } => Some(document),
        }
    }
}

/// A Rule, and optionally the new Setting it checks, ready to merge
struct Prepared {
    setting: Option<Setting>,
    reference: PreparedReference,
    constant: ConstantValue,
    policy: RulePolicy,
}

enum PreparedReference {
    NewSetting,
    Existing {
        logical_name: String,
        kind: SettingKind,
        data_type: ScalarType,
    },
}

/// Builds and merges Settings and Rules
#[derive(Debug, Clone, Default)]
pub struct Composer {
    config: ComposeConfig,
}

impl Composer {
    pub fn new(config: ComposeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ComposeConfig {
        &self.config
    }

    /// Add a script Setting and a Rule comparing its output to the compliant value
    pub fn script_compose(
        &self,
        mode: ExecutionMode<'_>,
        request: &ScriptRequest,
    ) -> Result<ComposeOutcome> {
        let prepared = self.prepare_script(request)?;
        self.execute(mode, vec![prepared])
    }

    /// Add a Setting and Rule for each registry value descriptor
    ///
    /// Natively remediable kinds become registry Settings; everything else
    /// becomes a script Setting with synthesized VBScript. In Direct mode the
    /// whole batch is committed once.
    pub fn registry_compose(
        &self,
        mode: ExecutionMode<'_>,
        requests: &[RegistryValueRequest],
    ) -> Result<ComposeOutcome> {
        if requests.is_empty() {
            return Err(ComposeError::invalid(
                "registry values",
                "at least one value descriptor is required",
            ));
        }
        let prepared = requests
            .iter()
            .map(|request| self.prepare_registry(request))
            .collect::<Result<Vec<_>>>()?;
        self.execute(mode, prepared)
    }

    /// Add Rules against Settings already present in the document
    ///
    /// Like [`Composer::registry_compose`], the batch is merged and committed
    /// as a unit.
    pub fn rule_compose(
        &self,
        mode: ExecutionMode<'_>,
        requests: &[RuleRequest],
    ) -> Result<ComposeOutcome> {
        if requests.is_empty() {
            return Err(ComposeError::invalid(
                "rules",
                "at least one rule request is required",
            ));
        }
        let prepared = requests
            .iter()
            .map(|request| self.prepare_rule(request))
            .collect::<Result<Vec<_>>>()?;
        self.execute(mode, prepared)
    }

    fn prepare_rule(&self, request: &RuleRequest) -> Result<Prepared> {
        if request.setting_logical_name.trim().is_empty() {
            return Err(ComposeError::invalid(
                "setting logical name",
                "must not be empty",
            ));
        }
        let policy = self
            .config
            .resolve(&request.options, &request.setting_logical_name);
        Ok(Prepared {
            setting: None,
            reference: PreparedReference::Existing {
                logical_name: request.setting_logical_name.clone(),
                kind: request.setting_kind,
                data_type: request.data_type,
            },
            constant: ConstantValue {
                value: request.compliant_value.clone(),
                data_type: request.data_type,
            },
            policy,
        })
    }

    fn prepare_script(&self, request: &ScriptRequest) -> Result<Prepared> {
        let has_name = request
            .options
            .name
            .as_deref()
            .is_some_and(|n| !n.trim().is_empty());
        if !has_name {
            return Err(ComposeError::invalid(
                "name",
                "a script setting needs a display name",
            ));
        }
        if request.detection.trim().is_empty() {
            return Err(ComposeError::invalid(
                "detection script",
                "must not be empty",
            ));
        }

        let policy = self.config.resolve(&request.options, "");
        let language = request.language.unwrap_or(self.config.script_language);
        let setting = Setting::script(
            policy.display_name.clone(),
            policy.description.clone(),
            ScriptSetting {
                detection: ScriptBody::new(language, request.detection.clone()),
                remediation: ScriptBody::new(language, request.remediation.clone()),
                per_user: request.per_user,
                is_64bit: request.is_64bit.unwrap_or(self.config.is_64bit),
            },
        );

        Ok(Prepared {
            setting: Some(setting),
            reference: PreparedReference::NewSetting,
            constant: ConstantValue {
                value: request.compliant_value.clone(),
                data_type: ScalarType::String,
            },
            policy,
        })
    }

    fn prepare_registry(&self, request: &RegistryValueRequest) -> Result<Prepared> {
        if request.key_path.trim_matches('\\').trim().is_empty() {
            return Err(ComposeError::invalid("key path", "must not be empty"));
        }

        let policy = self
            .config
            .resolve(&request.options, &request.default_display_name());
        let is_64bit = request.is_64bit.unwrap_or(self.config.is_64bit);
        let kind = request.kind;

        let (setting, constant) = match kind.native_data_type(request.convert_dword_to_qword) {
            Some(data_type) => {
                let value = match (data_type, kind) {
                    (RegistryDataType::String, _) => request.data.text(kind)?,
                    (RegistryDataType::Int64, RegistryValueKind::DWord) => {
                        request.data.dword()?.to_string()
                    }
                    (RegistryDataType::Int64, _) => request.data.integer(kind)?.to_string(),
                };
                let setting = Setting::registry(
                    policy.display_name.clone(),
                    policy.description.clone(),
                    RegistrySetting {
                        hive: request.hive,
                        key_path: request.key_path.clone(),
                        value_name: request.value_name.clone(),
                        data_type,
                        is_64bit,
                    },
                );
                let constant = ConstantValue {
                    value,
                    data_type: data_type.into(),
                };
                (setting, constant)
            }
            None => {
                let value = ScriptValue::encode(kind, &request.data)?;
                let target = RegistryTarget {
                    hive: request.hive,
                    key_path: &request.key_path,
                    value_name: &request.value_name,
                };
                let scripts = script::synthesize(target, kind, &value);
                let setting = Setting::script(
                    policy.display_name.clone(),
                    policy.description.clone(),
                    ScriptSetting {
                        detection: ScriptBody::new(scripts.language, scripts.detection),
                        remediation: ScriptBody::new(scripts.language, scripts.remediation),
                        per_user: request.hive.is_per_user(),
                        is_64bit,
                    },
                );
                let constant = ConstantValue {
                    value: COMPLIANT.to_string(),
                    data_type: ScalarType::String,
                };
                (setting, constant)
            }
        };

        Ok(Prepared {
            setting: Some(setting),
            reference: PreparedReference::NewSetting,
            constant,
            policy,
        })
    }

    fn execute(&self, mode: ExecutionMode<'_>, prepared: Vec<Prepared>) -> Result<ComposeOutcome> {
        let mode_name = mode.name();
        let count = prepared.len();

        let outcome = match mode {
            ExecutionMode::Direct { handle, store } => {
                let site_code = self.config.site_code.as_deref().ok_or_else(|| {
                    ComposeError::environment("no site code configured for direct mode")
                })?;
                store.ensure_available(site_code)?;

                let mut artifact = Artifact::parse(&handle.document)?;
                let logical_names = self.fold(&mut artifact, &handle.identity, prepared)?;
                let document = artifact.to_xml()?;

                store.commit(site_code, &handle.identity, &document)?;
                handle.document = document;
                ComposeOutcome::Persisted { logical_names }
            }
            ExecutionMode::Transform {
                document,
                source_identity,
            } => {
                let identity = SourceArtifactIdentity::parse(source_identity)?;
                let mut artifact = Artifact::parse(document)?;
                let logical_names = self.fold(&mut artifact, &identity, prepared)?;
                ComposeOutcome::Transformed {
                    document: artifact.to_xml()?,
                    logical_names,
                }
            }
        };

        tracing::info!(mode = mode_name, count, "Composite operation complete");
        Ok(outcome)
    }

    /// Merge every prepared item into the working copy
    fn fold(
        &self,
        artifact: &mut Artifact,
        source: &SourceArtifactIdentity,
        prepared: Vec<Prepared>,
    ) -> Result<Vec<LogicalName>> {
        let mut logical_names = Vec::with_capacity(prepared.len());

        for item in prepared {
            let reference = match (&item.setting, item.reference) {
                (Some(setting), PreparedReference::NewSetting) => {
                    artifact.insert_setting(setting.to_fragment()?)?;
                    logical_names.push(setting.logical_name().clone());
                    SettingReference::to_setting(setting, source.clone())
                }
                (
                    _,
                    PreparedReference::Existing {
                        logical_name,
                        kind,
                        data_type,
                    },
                ) => SettingReference {
                    source: source.clone(),
                    setting_logical_name: logical_name,
                    kind,
                    data_type,
                },
                (None, PreparedReference::NewSetting) => {
                    return Err(ComposeError::invalid(
                        "setting",
                        "no setting was prepared for the rule",
                    ))
                }
            };

            if self.config.verify_setting_reference
                && !artifact.contains_setting(&reference.setting_logical_name)
            {
                return Err(ComposeError::SettingNotFound {
                    logical_name: reference.setting_logical_name,
                });
            }

            let rule = Rule::new(item.policy, reference, item.constant);
            artifact.insert_rule(xml::round_trip(&rule.to_element()?)?)?;
        }

        Ok(logical_names)
    }
}
