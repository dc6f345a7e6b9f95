//! dcmforge CLI - Compose Settings and Rules into configuration item documents
//!
//! Reads a desired-configuration document, adds Settings and Rules for
//! registry values or scripts, and writes the updated document or commits it
//! to the configured store.

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

mod config;
mod error;
mod output;

use config::DcmforgeConfig;
use dcmforge::registry::{Hive, RegistryValueData, RegistryValueKind};
use dcmforge::setting::ScriptLanguage;
use dcmforge::{
    Artifact, ComposeOutcome, Composer, Descriptors, ExecutionMode, FileStore, LiveArtifact,
    RegistryValueRequest, RuleOptions, ScriptRequest, Severity, SourceArtifactIdentity,
};
use error::{CliError, Result};

/// dcmforge - Desired configuration composer
#[derive(Parser)]
#[command(name = "dcmforge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to dcmforge.toml configuration file
    #[arg(short, long, default_value = "dcmforge.toml", global = true)]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a Setting and Rule for one registry value
    Registry {
        /// Hive: HKLM, HKCU, HKCR, HKU, HKCC or a long form
        #[arg(long)]
        hive: Hive,

        /// Key path below the hive
        #[arg(long)]
        key: String,

        /// Value name; empty for the default value
        #[arg(long, default_value = "")]
        value_name: String,

        /// Value data; repeat for multi-string or binary lists
        #[arg(long, required = true)]
        data: Vec<String>,

        /// Value kind: REG_SZ, REG_MULTI_SZ, REG_EXPAND_SZ, REG_DWORD, REG_QWORD, REG_BINARY
        #[arg(long)]
        kind: RegistryValueKind,

        /// Check a DWORD as a native Int64 Setting instead of scripts
        #[arg(long)]
        convert_dword_to_qword: bool,

        #[command(flatten)]
        rule: RuleArgs,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Add a script Setting and Rule
    Script {
        /// Detection script file
        #[arg(long)]
        detection: PathBuf,

        /// Remediation script file
        #[arg(long)]
        remediation: Option<PathBuf>,

        /// Value the detection script prints when compliant
        #[arg(long)]
        compliant_value: String,

        /// Script language: VBScript, JScript, PowerShell
        #[arg(long)]
        language: Option<ScriptLanguage>,

        /// Run scripts as the logged-on user
        #[arg(long)]
        per_user: bool,

        /// Run scripts in a 32-bit context
        #[arg(long)]
        x86: bool,

        #[command(flatten)]
        rule: RuleArgs,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Add Settings and Rules for every registry value in a descriptor file
    Batch {
        /// Descriptor file (.toml or .json) with [[registry]] entries
        #[arg(long)]
        descriptors: PathBuf,

        /// Commit to the configured store instead of writing output
        #[arg(long)]
        commit: bool,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Summarize a document's flavor, identity, Settings and Rules
    Inspect {
        /// Document to inspect
        #[arg(long)]
        document: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Naming and policy flags shared by registry and script commands
#[derive(Args)]
struct RuleArgs {
    /// Display name for the Setting and Rule
    #[arg(long)]
    name: Option<String>,

    /// Description
    #[arg(long, default_value = "")]
    description: String,

    /// Severity: None, Warning, Critical, CriticalWithEvent
    #[arg(long)]
    severity: Option<Severity>,

    /// Do not allow remediation
    #[arg(long)]
    no_remediate: bool,

    /// Treat a missing value as compliant
    #[arg(long)]
    compliant_when_not_found: bool,
}

impl RuleArgs {
    fn into_options(self) -> RuleOptions {
        RuleOptions {
            name: self.name,
            description: self.description,
            severity: self.severity,
            remediate: self.no_remediate.then_some(false),
            noncompliant_when_not_found: self.compliant_when_not_found.then_some(false),
        }
    }
}

/// Document input and output
#[derive(Args)]
struct TargetArgs {
    /// Document to update
    #[arg(long)]
    document: PathBuf,

    /// Composite identifier of the source document (<scope>/<logical name>/<version>);
    /// read from the document when omitted
    #[arg(long)]
    source_id: Option<String>,

    /// Write the updated document here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = run(cli);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = DcmforgeConfig::load(&cli.config)?;
    dcmforge::observability::init(&config.observability_config(cli.verbose))?;
    let composer = Composer::new(config.compose_config());

    match cli.command {
        Commands::Registry {
            hive,
            key,
            value_name,
            data,
            kind,
            convert_dword_to_qword,
            rule,
            target,
        } => {
            let data = value_data(kind, data);
            let request = RegistryValueRequest::new(hive, key, value_name, data, kind)
                .convert_dword_to_qword(convert_dword_to_qword)
                .options(rule.into_options());
            cmd_registry(&composer, &target, &request)
        }

        Commands::Script {
            detection,
            remediation,
            compliant_value,
            language,
            per_user,
            x86,
            rule,
            target,
        } => {
            let mut request = ScriptRequest::new(
                rule.name.clone().unwrap_or_default(),
                read_input(&detection)?,
                remediation.as_deref().map(read_input).transpose()?.unwrap_or_default(),
                compliant_value,
            );
            request.language = language;
            request.per_user = per_user;
            request.is_64bit = x86.then_some(false);
            request.options = rule.into_options();
            cmd_script(&composer, &target, &request)
        }

        Commands::Batch {
            descriptors,
            commit,
            target,
        } => cmd_batch(&composer, &config, &target, &descriptors, commit),

        Commands::Inspect { document, json } => cmd_inspect(&document, json),
    }
}

// =============================================================================
// Command Implementations
// =============================================================================

fn cmd_registry(
    composer: &Composer,
    target: &TargetArgs,
    request: &RegistryValueRequest,
) -> Result<()> {
    let document = read_input(&target.document)?;
    let source_id = source_id(target, &document)?;

    let outcome = composer.registry_compose(
        ExecutionMode::Transform {
            document: &document,
            source_identity: &source_id,
        },
        std::slice::from_ref(request),
    )?;
    write_outcome(target, &outcome)
}

fn cmd_script(composer: &Composer, target: &TargetArgs, request: &ScriptRequest) -> Result<()> {
    let document = read_input(&target.document)?;
    let source_id = source_id(target, &document)?;

    let outcome = composer.script_compose(
        ExecutionMode::Transform {
            document: &document,
            source_identity: &source_id,
        },
        request,
    )?;
    write_outcome(target, &outcome)
}

fn cmd_batch(
    composer: &Composer,
    config: &DcmforgeConfig,
    target: &TargetArgs,
    descriptors_path: &Path,
    commit: bool,
) -> Result<()> {
    let descriptors = load_descriptors(descriptors_path)?;
    output::info(&format!(
        "Loaded {} registry value(s) from {}",
        descriptors.values.len(),
        descriptors_path.display()
    ));

    let document = read_input(&target.document)?;
    let source_id = source_id(target, &document)?;

    if !commit {
        let outcome = composer.registry_compose(
            ExecutionMode::Transform {
                document: &document,
                source_identity: &source_id,
            },
            &descriptors.values,
        )?;
        return write_outcome(target, &outcome);
    }

    let mut store = FileStore::new(&config.store.dir);
    let mut handle = LiveArtifact::new(SourceArtifactIdentity::parse(&source_id)?, document);
    let outcome = composer.registry_compose(
        ExecutionMode::Direct {
            handle: &mut handle,
            store: &mut store,
        },
        &descriptors.values,
    )?;

    output::print_logical_names(outcome.logical_names());
    output::success(&format!(
        "Committed {} setting(s) to {}",
        outcome.logical_names().len(),
        store.path_for(&handle.identity).display()
    ));
    Ok(())
}

fn cmd_inspect(document: &Path, json: bool) -> Result<()> {
    let artifact = Artifact::parse(&read_input(document)?)?;
    let summary = artifact.inspect();

    if json {
        output::print_json(&summary)?;
    } else {
        output::print_summary(&summary);
    }
    Ok(())
}

// =============================================================================
// Helpers
// =============================================================================

/// Multi-string and repeated values become a list; everything else is one value
fn value_data(kind: RegistryValueKind, mut data: Vec<String>) -> RegistryValueData {
    if kind == RegistryValueKind::MultiString || data.len() > 1 {
        RegistryValueData::List(data)
    } else {
        RegistryValueData::Single(data.pop().unwrap_or_default())
    }
}

fn read_input(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| CliError::InputRead {
        path: path.to_path_buf(),
        source: e,
    })
}

fn source_id(target: &TargetArgs, document: &str) -> Result<String> {
    if let Some(id) = &target.source_id {
        return Ok(id.clone());
    }
    Artifact::parse(document)?
        .identity()
        .map(|identity| identity.to_string())
        .ok_or_else(|| CliError::missing("--source-id (the document declares no identity)"))
}

fn load_descriptors(path: &Path) -> Result<Descriptors> {
    let content = read_input(path)?;
    let parsed = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content).map_err(|e| e.to_string()),
        _ => toml::from_str(&content).map_err(|e| e.to_string()),
    };
    parsed.map_err(|message| CliError::DescriptorParse {
        path: path.to_path_buf(),
        message,
    })
}

fn write_outcome(target: &TargetArgs, outcome: &ComposeOutcome) -> Result<()> {
    let document = outcome.document().unwrap_or_default();

    match &target.output {
        Some(path) => {
            std::fs::write(path, document).map_err(|e| CliError::FileWrite {
                path: path.clone(),
                source: e,
            })?;
            output::print_logical_names(outcome.logical_names());
            output::success(&format!(
                "Wrote {} setting(s) to {}",
                outcome.logical_names().len(),
                path.display()
            ));
        }
        None => println!("{}", document),
    }
    Ok(())
}
