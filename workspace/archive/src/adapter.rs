use std::path::{Path, PathBuf};

use crate::error::ArchiveError;
use crate::registry;
use crate::reprepro::{self, ListEntry, ShowEntry};

/// Wraps one repository's reprepro archive, serializing every call through
/// a registry-wide lock keyed by the base directory so two concurrent
/// operations on the same archive never interleave (§4.6).
#[derive(Debug, Clone)]
pub struct ArchiveAdapter {
    basedir: PathBuf,
}

impl ArchiveAdapter {
    pub fn new(basedir: PathBuf) -> Self {
        ArchiveAdapter { basedir }
    }

    fn key(&self) -> String {
        self.basedir.display().to_string()
    }

    /// Includes `changes` and its files into `distribution`; failure leaves
    /// the archive unchanged.
    pub fn install(&self, changes: &Path, distribution: &str) -> Result<(), ArchiveError> {
        let lock = registry::lock_for(&self.key());
        let _guard = lock.lock().expect("archive lock poisoned");
        reprepro::install(&self.basedir, distribution, &changes.display().to_string())
    }

    pub fn migrate(
        &self,
        package: &str,
        src: &str,
        dst: &str,
        version: Option<&str>,
    ) -> Result<(), ArchiveError> {
        let lock = registry::lock_for(&self.key());
        let _guard = lock.lock().expect("archive lock poisoned");
        reprepro::migrate(&self.basedir, package, src, dst, version)
    }

    pub fn remove(
        &self,
        package: &str,
        distribution: &str,
        version: Option<&str>,
    ) -> Result<(), ArchiveError> {
        let lock = registry::lock_for(&self.key());
        let _guard = lock.lock().expect("archive lock poisoned");
        reprepro::remove(&self.basedir, package, distribution, version)
    }

    /// Whether `package` is present in `distribution` at exactly `version`.
    ///
    /// Scans every entry `reprepro listmatched` returns rather than capping
    /// at one: more than one version of `package` can be present in
    /// `distribution` at once (a normal transient state during a migration),
    /// and capping the result set before checking the version would risk a
    /// false negative if the single entry returned isn't the one asked about.
    pub fn find(&self, package: &str, distribution: &str, version: &str) -> Result<bool, ArchiveError> {
        let entries = self.list(package, distribution, None, u32::MAX)?;
        Ok(entries.iter().any(|e| e.version == version))
    }

    pub fn list(
        &self,
        pattern: &str,
        distribution: &str,
        kind: Option<&str>,
        max: u32,
    ) -> Result<Vec<ListEntry>, ArchiveError> {
        let lock = registry::lock_for(&self.key());
        let _guard = lock.lock().expect("archive lock poisoned");
        reprepro::list(&self.basedir, pattern, distribution, kind, max)
    }

    pub fn show(&self, package: &str) -> Result<Vec<ShowEntry>, ArchiveError> {
        let lock = registry::lock_for(&self.key());
        let _guard = lock.lock().expect("archive lock poisoned");
        reprepro::show(&self.basedir, package)
    }

    /// Drops stale index files under `dists/`, rebuilds them, and removes
    /// vanished entries.
    pub fn reindex(&self) -> Result<(), ArchiveError> {
        let lock = registry::lock_for(&self.key());
        let _guard = lock.lock().expect("archive lock poisoned");
        reprepro::reindex(&self.basedir)
    }
}
