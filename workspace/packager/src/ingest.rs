//! Ingest Queue (§4.3): watches the spool directory, classifies incoming
//! `.changes` files, and feeds them to the Packager/Builder in a stable
//! order — uploads before build-results — so a coordinator restart cannot
//! misattribute an orphan build-result to a package it no longer tracks.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use types::manifest::ManifestKind;

use crate::error::PackagerError;

/// One manifest file discovered in the spool, tagged with its classified
/// kind so callers can sort/dispatch without re-reading the filename.
#[derive(Debug, Clone)]
pub struct IngestEntry {
    pub path: PathBuf,
    pub kind: ManifestKind,
}

/// Scans `spool_dir` for `*.changes` files and returns them ordered with a
/// stable sort key (`is-buildresult ? 1 : 0`) so uploads are re-enqueued
/// before build-results at startup (§4.3, testable property 10).
pub fn scan(spool_dir: &Path) -> Result<Vec<IngestEntry>, PackagerError> {
    let mut entries = Vec::new();
    if !spool_dir.exists() {
        return Ok(entries);
    }
    for entry in fs::read_dir(spool_dir)? {
        let entry = entry?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.ends_with(".changes") {
            continue;
        }
        let kind = codec::classify(name);
        entries.push(IngestEntry { path, kind });
    }
    entries.sort_by_key(sort_key);
    Ok(entries)
}

fn sort_key(entry: &IngestEntry) -> u8 {
    match entry.kind {
        ManifestKind::BuildResult => 1,
        ManifestKind::Upload | ManifestKind::BuildRequest => 0,
    }
}

/// Removes any file (or directory) in the spool not referenced by some
/// `.changes` file's `Files:` list and not itself a `.changes`/sentinel
/// file, on startup and after each FTP session closes (§4.3).
pub fn sweep_cruft(spool_dir: &Path) -> Result<usize, PackagerError> {
    if !spool_dir.exists() {
        return Ok(0);
    }

    let mut referenced = std::collections::HashSet::new();
    for entry in scan(spool_dir)? {
        referenced.insert(entry.path.file_name().unwrap().to_os_string());
        if let Ok(manifest) = codec::parse(&entry.path) {
            for file in &manifest.files {
                referenced.insert(std::ffi::OsString::from(&file.name));
            }
        }
        let mut upload_sentinel = entry.path.file_name().unwrap().to_os_string();
        upload_sentinel.push(".upload");
        referenced.insert(upload_sentinel);
    }

    let mut removed = 0;
    for entry in fs::read_dir(spool_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if referenced.contains(&name) {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        debug!("removed unreferenced spool entry {}", path.display());
        removed += 1;
    }
    if removed > 0 {
        info!("cruft sweep removed {removed} unreferenced spool entr(y/ies)");
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_changes(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(name), body).unwrap();
    }

    const MINIMAL: &str = "Source: foo\nVersion: 1.0-1\nDistribution: bookworm-test-unstable\nArchitecture: amd64\nFiles:\n deadbeef 1234 foo_1.0-1_amd64.deb\n";

    #[test]
    fn scan_orders_uploads_before_build_results() {
        let dir = tempfile::tempdir().unwrap();
        write_changes(dir.path(), "foo_1.0-1_mini-buildd-buildresult_amd64.changes", MINIMAL);
        write_changes(dir.path(), "foo_1.0-1_mini-buildd-buildresult_i386.changes", MINIMAL);
        write_changes(dir.path(), "foo_1.0-1_amd64.changes", MINIMAL);

        let entries = scan(dir.path()).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].kind, ManifestKind::Upload);
        assert_eq!(entries[1].kind, ManifestKind::BuildResult);
        assert_eq!(entries[2].kind, ManifestKind::BuildResult);
    }

    #[test]
    fn scan_of_missing_dir_is_empty() {
        let entries = scan(Path::new("/nonexistent/spool/path")).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn sweep_removes_file_not_referenced_by_any_manifest() {
        let dir = tempfile::tempdir().unwrap();
        write_changes(dir.path(), "foo_1.0-1_amd64.changes", MINIMAL);
        fs::write(dir.path().join("foo_1.0-1_amd64.deb"), b"deb contents").unwrap();
        fs::write(dir.path().join("orphan.txt"), b"leftover").unwrap();

        let removed = sweep_cruft(dir.path()).unwrap();
        assert_eq!(removed, 1);
        assert!(dir.path().join("foo_1.0-1_amd64.deb").exists());
        assert!(!dir.path().join("orphan.txt").exists());
    }
}
