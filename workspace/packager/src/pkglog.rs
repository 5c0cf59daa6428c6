//! Per-package log tree (§6 Log layout): `LOG_DIR/REPO/[_failed/]PACKAGE/VERSION/ARCH/`.
//! Each per-arch directory holds the build log and the build-result changes
//! file; the incoming changes file lives in the top `VERSION/` directory.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::PackagerError;

#[derive(Debug, Clone)]
pub struct PkgLog {
    log_dir: PathBuf,
}

impl PkgLog {
    pub fn new(log_dir: PathBuf) -> Self {
        PkgLog { log_dir }
    }

    /// The `VERSION/` directory a package's changes file and all its
    /// per-arch subdirectories live under.
    pub fn package_dir(&self, repository: &str, package: &str, version: &str, failed: bool) -> PathBuf {
        let mut dir = self.log_dir.join(repository);
        if failed {
            dir = dir.join("_failed");
        }
        dir.join(package).join(version)
    }

    /// The per-architecture directory for one build-result.
    pub fn arch_dir(&self, repository: &str, package: &str, version: &str, arch: &str, failed: bool) -> PathBuf {
        self.package_dir(repository, package, version, failed).join(arch)
    }

    /// Creates `arch_dir` and moves `buildlog`/`changes` into it.
    pub fn store_arch_result(
        &self,
        repository: &str,
        package: &str,
        version: &str,
        arch: &str,
        failed: bool,
        buildlog: &Path,
        changes: &Path,
    ) -> Result<PathBuf, PackagerError> {
        let dir = self.arch_dir(repository, package, version, arch, failed);
        fs::create_dir_all(&dir)?;
        if buildlog.exists() {
            fs::rename(buildlog, dir.join("build.log"))?;
        }
        if changes.exists() {
            let name = changes.file_name().expect("changes path has a filename");
            fs::rename(changes, dir.join(name))?;
        }
        Ok(dir)
    }

    /// Moves the incoming changes file into the top `VERSION/` directory.
    pub fn store_upload(
        &self,
        repository: &str,
        package: &str,
        version: &str,
        failed: bool,
        upload_changes: &Path,
    ) -> Result<PathBuf, PackagerError> {
        let dir = self.package_dir(repository, package, version, failed);
        fs::create_dir_all(&dir)?;
        let name = upload_changes.file_name().expect("changes path has a filename");
        let dest = dir.join(name);
        if upload_changes != dest {
            fs::rename(upload_changes, &dest)?;
        }
        Ok(dest)
    }

    /// On a successful install, the matching `_failed/` tree for the same
    /// version (if any) is stale and removed (§6).
    pub fn remove_failed_tree(&self, repository: &str, package: &str, version: &str) -> Result<(), PackagerError> {
        let dir = self.package_dir(repository, package, version, true);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
            debug!("removed stale failed-log tree at {}", dir.display());
        }
        Ok(())
    }

    /// Lists the buildlog/changes filenames directly under a package's
    /// `VERSION/` directory and all its per-arch subdirectories, for
    /// notification bodies and observability endpoints.
    pub fn list_entries(&self, repository: &str, package: &str, version: &str, failed: bool) -> Vec<PathBuf> {
        let dir = self.package_dir(repository, package, version, failed);
        let mut entries = Vec::new();
        collect_files(&dir, &mut entries);
        entries
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(read_dir) = fs::read_dir(dir) else {
        return;
    };
    for entry in read_dir.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, out);
        } else {
            out.push(path);
        }
    }
}
