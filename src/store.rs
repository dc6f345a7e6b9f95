//! Persistence collaborators for Direct mode
//!
//! The engine never owns the configuration store. It asks an
//! [`ArtifactStore`] whether the site is reachable before touching a live
//! document, and hands over the finished document exactly once per
//! composite call.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use crate::artifact::SourceArtifactIdentity;
use crate::error::{ComposeError, Result};

/// Save/commit interface of the external configuration store
pub trait ArtifactStore {
    /// Check that the store and its site context can accept a commit
    fn ensure_available(&self, site_code: &str) -> Result<()>;

    /// Persist a complete document
    fn commit(
        &mut self,
        site_code: &str,
        identity: &SourceArtifactIdentity,
        document: &str,
    ) -> Result<()>;
}

/// A live document handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveArtifact {
    pub identity: SourceArtifactIdentity,
    pub document: String,
}

impl LiveArtifact {
    pub fn new(identity: SourceArtifactIdentity, document: impl Into<String>) -> Self {
        Self {
            identity,
            document: document.into(),
        }
    }
}

/// One recorded commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub site_code: String,
    pub identity: SourceArtifactIdentity,
    pub document: String,
}

/// In-memory store that records every commit
#[derive(Debug, Default)]
pub struct MemoryStore {
    commits: Vec<Commit>,
    unavailable: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose site is unreachable
    pub fn unavailable() -> Self {
        Self {
            commits: Vec::new(),
            unavailable: true,
        }
    }

    pub fn commits(&self) -> &[Commit] {
        &self.commits
    }
}

impl ArtifactStore for MemoryStore {
    fn ensure_available(&self, site_code: &str) -> Result<()> {
        if self.unavailable {
            return Err(ComposeError::environment(format!(
                "site '{}' is not reachable",
                site_code
            )));
        }
        Ok(())
    }

    fn commit(
        &mut self,
        site_code: &str,
        identity: &SourceArtifactIdentity,
        document: &str,
    ) -> Result<()> {
        self.ensure_available(site_code)?;
        self.commits.push(Commit {
            site_code: site_code.to_string(),
            identity: identity.clone(),
            document: document.to_string(),
        });
        Ok(())
    }
}

/// Store that writes each committed document to `<dir>/<scope>_<logical>_<version>.xml`
///
/// Writes go to a temporary file in the same directory which is then
/// renamed over the target, so readers never observe a partial document.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path a document with this identity is committed to
    pub fn path_for(&self, identity: &SourceArtifactIdentity) -> PathBuf {
        self.dir.join(format!("{}.xml", identity.file_stem()))
    }
}

impl ArtifactStore for FileStore {
    fn ensure_available(&self, site_code: &str) -> Result<()> {
        if !self.dir.is_dir() {
            return Err(ComposeError::environment(format!(
                "store directory {} for site '{}' does not exist",
                self.dir.display(),
                site_code
            )));
        }
        Ok(())
    }

    fn commit(
        &mut self,
        site_code: &str,
        identity: &SourceArtifactIdentity,
        document: &str,
    ) -> Result<()> {
        self.ensure_available(site_code)?;
        let path = self.path_for(identity);
        let write_err = |source| ComposeError::StoreWrite {
            path: path.clone(),
            source,
        };

        let mut staged = tempfile::NamedTempFile::new_in(&self.dir).map_err(write_err)?;
        staged.write_all(document.as_bytes()).map_err(write_err)?;
        staged.as_file().sync_all().map_err(write_err)?;
        staged.persist(&path).map_err(|e| write_err(e.error))?;

        tracing::info!(
            site_code,
            identity = %identity,
            path = %path.display(),
            bytes = document.len(),
            "Committed artifact"
        );
        Ok(())
    }
}

/// Read a previously committed document back
pub fn read_committed(store: &FileStore, identity: &SourceArtifactIdentity) -> Result<String> {
    Ok(fs::read_to_string(store.path_for(identity))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;

    fn identity() -> SourceArtifactIdentity {
        SourceArtifactIdentity::parse("ScopeId_A/Application_B/1").unwrap()
    }

    #[test]
    fn test_memory_store_records_commits() {
        let mut store = MemoryStore::new();
        store.commit("PS1", &identity(), "<doc/>").unwrap();
        assert_eq!(store.commits().len(), 1);
        assert_eq!(store.commits()[0].site_code, "PS1");
        assert_eq!(store.commits()[0].document, "<doc/>");
    }

    #[test]
    fn test_unavailable_memory_store() {
        let store = MemoryStore::unavailable();
        let err = store.ensure_available("PS1").unwrap_err();
        assert_eq!(err.class(), ErrorClass::Environment);
    }

    #[test]
    fn test_file_store_writes_document() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path());

        store.commit("PS1", &identity(), "<doc/>").unwrap();
        assert_eq!(read_committed(&store, &identity()).unwrap(), "<doc/>");
        assert!(store
            .path_for(&identity())
            .ends_with("ScopeId_A_Application_B_1.xml"));

        store.commit("PS1", &identity(), "<doc2/>").unwrap();
        assert_eq!(read_committed(&store, &identity()).unwrap(), "<doc2/>");
    }

    #[test]
    fn test_file_store_missing_dir_is_environment_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("missing"));
        let err = store.ensure_available("PS1").unwrap_err();
        assert_eq!(err.class(), ErrorClass::Environment);
    }
}
