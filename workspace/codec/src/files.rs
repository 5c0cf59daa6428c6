use std::fs;
use std::path::Path;

use md5::{Digest, Md5};
use types::manifest::Manifest;

use crate::error::CodecError;

/// Checks the §3 invariant that every file listed in a manifest's `Files:`
/// field exists alongside the manifest with matching md5 and size. Returns
/// the name of the first file that fails to satisfy the invariant.
pub fn verify_files_present(manifest: &Manifest, dir: &Path) -> Result<(), CodecError> {
    for file in &manifest.files {
        let path = dir.join(&file.name);
        let bytes = fs::read(&path).map_err(|_| {
            CodecError::MalformedManifest(format!("referenced file missing: {}", file.name))
        })?;

        if bytes.len() as u64 != file.size {
            return Err(CodecError::MalformedManifest(format!(
                "size mismatch for {}: expected {}, found {}",
                file.name,
                file.size,
                bytes.len()
            )));
        }

        let mut hasher = Md5::new();
        hasher.update(&bytes);
        let digest = format!("{:x}", hasher.finalize());
        if digest != file.md5 {
            return Err(CodecError::MalformedManifest(format!(
                "md5 mismatch for {}: expected {}, found {digest}",
                file.name, file.md5
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::manifest::{FileEntry, ManifestKind};
    use types::version::Version;

    fn sample_manifest(file: FileEntry) -> Manifest {
        let mut m = Manifest::new(
            ManifestKind::Upload,
            "foo".to_string(),
            Version::try_from("1.0-1").unwrap(),
            "bookworm-test-unstable".to_string(),
            "amd64".to_string(),
        );
        m.files.push(file);
        m
    }

    #[test]
    fn matching_md5_and_size_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("foo_1.0-1.dsc"), b"hello world").unwrap();
        let mut hasher = Md5::new();
        hasher.update(b"hello world");
        let md5 = format!("{:x}", hasher.finalize());
        let manifest = sample_manifest(FileEntry {
            name: "foo_1.0-1.dsc".to_string(),
            md5,
            size: 11,
        });
        assert!(verify_files_present(&manifest, dir.path()).is_ok());
    }

    #[test]
    fn missing_file_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = sample_manifest(FileEntry {
            name: "missing.dsc".to_string(),
            md5: "deadbeef".to_string(),
            size: 0,
        });
        assert!(matches!(
            verify_files_present(&manifest, dir.path()),
            Err(CodecError::MalformedManifest(_))
        ));
    }

    #[test]
    fn size_mismatch_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("foo_1.0-1.dsc"), b"hello world").unwrap();
        let manifest = sample_manifest(FileEntry {
            name: "foo_1.0-1.dsc".to_string(),
            md5: "irrelevant".to_string(),
            size: 999,
        });
        assert!(matches!(
            verify_files_present(&manifest, dir.path()),
            Err(CodecError::MalformedManifest(_))
        ));
    }

    #[test]
    fn md5_mismatch_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("foo_1.0-1.dsc"), b"hello world").unwrap();
        let manifest = sample_manifest(FileEntry {
            name: "foo_1.0-1.dsc".to_string(),
            md5: "0".repeat(32),
            size: 11,
        });
        assert!(matches!(
            verify_files_present(&manifest, dir.path()),
            Err(CodecError::MalformedManifest(_))
        ));
    }
}
