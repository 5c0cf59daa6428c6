use std::fs::{self, File};
use std::path::{Path, PathBuf};

use glob::Pattern;
use types::manifest::Manifest;

use crate::error::CodecError;

/// Builds an uncompressed tar containing the manifest file itself, each file
/// listed in `manifest.files` (found alongside `manifest_path`, skipping
/// anything matching `exclude_globs`), and every path in `add_files` (§4.1,
/// used by the Packager to bundle apt sources/preferences/keys, the SSL
/// cert, a chroot-setup script and an sbuild config snippet into a
/// build-request).
pub fn tar(
    manifest: &Manifest,
    manifest_path: &Path,
    output_path: &Path,
    add_files: &[PathBuf],
    exclude_globs: &[String],
) -> Result<(), CodecError> {
    let patterns: Vec<Pattern> = exclude_globs
        .iter()
        .filter_map(|g| Pattern::new(g).ok())
        .collect();
    let source_dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));

    let file = File::create(output_path)?;
    let mut builder = tar::Builder::new(file);

    let manifest_name = manifest_path
        .file_name()
        .ok_or_else(|| CodecError::MalformedManifest("manifest path has no filename".into()))?;
    builder.append_path_with_name(manifest_path, manifest_name)?;

    for entry in &manifest.files {
        if patterns.iter().any(|p| p.matches(&entry.name)) {
            continue;
        }
        let path = source_dir.join(&entry.name);
        builder.append_path_with_name(&path, &entry.name)?;
    }

    for path in add_files {
        let name = path
            .file_name()
            .ok_or_else(|| CodecError::MalformedManifest("add_files entry has no filename".into()))?;
        builder.append_path_with_name(path, name)?;
    }

    builder.finish()?;
    Ok(())
}

/// Extracts a sidecar tar into `dest_dir`. A no-op if `tar_path` does not
/// exist, mirroring the original's tolerance for manifests with no attached
/// artifacts (e.g. a dispatch-failure synthesized build-result).
pub fn untar(tar_path: &Path, dest_dir: &Path) -> Result<(), CodecError> {
    if !tar_path.exists() {
        return Ok(());
    }
    fs::create_dir_all(dest_dir)?;
    let file = File::open(tar_path)?;
    let mut archive = tar::Archive::new(file);
    archive.unpack(dest_dir)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::manifest::{FileEntry, ManifestKind};
    use types::version::Version;

    fn sample_manifest() -> Manifest {
        let mut m = Manifest::new(
            ManifestKind::Upload,
            "foo".to_string(),
            Version::try_from("1.0-1").unwrap(),
            "bookworm-test-unstable".to_string(),
            "amd64".to_string(),
        );
        m.files.push(FileEntry {
            name: "foo.dsc".to_string(),
            md5: "deadbeef".to_string(),
            size: 10,
        });
        m.files.push(FileEntry {
            name: "foo.tar.xz".to_string(),
            md5: "beadfeed".to_string(),
            size: 20,
        });
        m
    }

    #[test]
    fn tar_then_untar_round_trips_listed_files() {
        let dir = tempfile::tempdir().unwrap();
        let manifest_path = dir.path().join("foo_1.0-1_amd64.changes");
        fs::write(&manifest_path, "Source: foo\n").unwrap();
        fs::write(dir.path().join("foo.dsc"), b"dsc contents").unwrap();
        fs::write(dir.path().join("foo.tar.xz"), b"tarball contents").unwrap();

        let manifest = sample_manifest();
        let output = dir.path().join("bundle.tar");
        tar(&manifest, &manifest_path, &output, &[], &[]).unwrap();

        let extract_dir = dir.path().join("extracted");
        untar(&output, &extract_dir).unwrap();
        assert!(extract_dir.join("foo.dsc").exists());
        assert!(extract_dir.join("foo.tar.xz").exists());
        assert!(extract_dir.join("foo_1.0-1_amd64.changes").exists());
    }

    #[test]
    fn exclude_globs_skip_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        let manifest_path = dir.path().join("foo_1.0-1_amd64.changes");
        fs::write(&manifest_path, "Source: foo\n").unwrap();
        fs::write(dir.path().join("foo.dsc"), b"dsc contents").unwrap();
        fs::write(dir.path().join("foo.tar.xz"), b"tarball contents").unwrap();

        let manifest = sample_manifest();
        let output = dir.path().join("bundle.tar");
        tar(&manifest, &manifest_path, &output, &[], &["*.tar.xz".to_string()]).unwrap();

        let extract_dir = dir.path().join("extracted");
        untar(&output, &extract_dir).unwrap();
        assert!(extract_dir.join("foo.dsc").exists());
        assert!(!extract_dir.join("foo.tar.xz").exists());
    }

    #[test]
    fn untar_is_noop_without_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.tar");
        let dest = dir.path().join("dest");
        untar(&missing, &dest).unwrap();
        assert!(!dest.exists());
    }
}
