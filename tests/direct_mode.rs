//! Direct-mode persistence: single commit per batch, nothing persisted on failure.

use std::collections::HashSet;

use dcmforge::registry::{Hive, RegistryValueData, RegistryValueKind};
use dcmforge::store::read_committed;
use dcmforge::{
    Artifact, ComposeConfig, ComposeError, Composer, ErrorClass, ExecutionMode, FileStore,
    LiveArtifact, MemoryStore, RegistryValueRequest, SourceArtifactIdentity,
};

const OPERATING_SYSTEM: &str = r#"<DesiredConfigurationDigest xmlns="http://schemas.microsoft.com/SystemsCenterConfigurationManager/2009/07/10/DesiredConfiguration">
  <OperatingSystem AuthoringScopeId="ScopeId_ABC" LogicalName="OperatingSystem_9" Version="2">
    <Settings>
      <RootComplexSetting />
    </Settings>
  </OperatingSystem>
</DesiredConfigurationDigest>"#;

fn handle() -> LiveArtifact {
    LiveArtifact::new(
        SourceArtifactIdentity::parse("ScopeId_ABC/OperatingSystem_9/2").unwrap(),
        OPERATING_SYSTEM,
    )
}

fn composer() -> Composer {
    Composer::new(ComposeConfig::builder().site_code("PS1").build())
}

fn batch() -> Vec<RegistryValueRequest> {
    vec![
        RegistryValueRequest::new(
            Hive::LocalMachine,
            r"Software\Test",
            "name",
            "bar",
            RegistryValueKind::String,
        ),
        RegistryValueRequest::new(
            Hive::LocalMachine,
            r"Software\Test",
            "count",
            "0x10",
            RegistryValueKind::DWord,
        ),
        RegistryValueRequest::new(
            Hive::CurrentUser,
            r"Software\Test",
            "paths",
            RegistryValueData::List(vec![r"C:\one".into(), r"C:\two".into()]),
            RegistryValueKind::MultiString,
        ),
    ]
}

#[test]
fn batch_commits_once_with_distinct_names() {
    let mut handle = handle();
    let mut store = MemoryStore::new();

    let outcome = composer()
        .registry_compose(
            ExecutionMode::Direct {
                handle: &mut handle,
                store: &mut store,
            },
            &batch(),
        )
        .unwrap();

    let names: HashSet<_> = outcome.logical_names().iter().collect();
    assert_eq!(names.len(), 3);
    assert!(outcome.document().is_none());

    assert_eq!(store.commits().len(), 1);
    let commit = &store.commits()[0];
    assert_eq!(commit.site_code, "PS1");
    assert_eq!(commit.document, handle.document);

    let artifact = Artifact::parse(&handle.document).unwrap();
    assert_eq!(artifact.setting_names().len(), 3);
    assert_eq!(artifact.rule_ids().len(), 3);
}

#[test]
fn failing_batch_persists_nothing() {
    let mut requests = batch();
    requests.push(RegistryValueRequest::new(
        Hive::LocalMachine,
        r"Software\Test",
        "blob",
        "0g",
        RegistryValueKind::Binary,
    ));

    let mut handle = handle();
    let mut store = MemoryStore::new();
    let err = composer()
        .registry_compose(
            ExecutionMode::Direct {
                handle: &mut handle,
                store: &mut store,
            },
            &requests,
        )
        .unwrap_err();

    assert_eq!(err.class(), ErrorClass::InputValidation);
    assert!(store.commits().is_empty());
    assert_eq!(handle.document, OPERATING_SYSTEM);
}

#[test]
fn structural_failure_persists_nothing() {
    let mut handle = LiveArtifact::new(
        SourceArtifactIdentity::parse("a/b/c").unwrap(),
        "<DesiredConfigurationDigest><Baseline/></DesiredConfigurationDigest>",
    );
    let mut store = MemoryStore::new();
    let err = composer()
        .registry_compose(
            ExecutionMode::Direct {
                handle: &mut handle,
                store: &mut store,
            },
            &batch(),
        )
        .unwrap_err();

    assert!(matches!(err, ComposeError::Structural { .. }));
    assert!(store.commits().is_empty());
}

#[test]
fn unavailable_store_is_environment_error() {
    let mut handle = handle();
    let mut store = MemoryStore::unavailable();
    let err = composer()
        .registry_compose(
            ExecutionMode::Direct {
                handle: &mut handle,
                store: &mut store,
            },
            &batch(),
        )
        .unwrap_err();

    assert_eq!(err.class(), ErrorClass::Environment);
    assert_eq!(handle.document, OPERATING_SYSTEM);
}

#[test]
fn file_store_receives_committed_document() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = FileStore::new(dir.path());
    let mut handle = handle();

    composer()
        .registry_compose(
            ExecutionMode::Direct {
                handle: &mut handle,
                store: &mut store,
            },
            &batch()[..1],
        )
        .unwrap();

    let written = read_committed(&store, &handle.identity).unwrap();
    assert_eq!(written, handle.document);
    assert_eq!(Artifact::parse(&written).unwrap().setting_names().len(), 1);
}
