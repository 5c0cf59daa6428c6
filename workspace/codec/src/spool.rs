use std::path::{Path, PathBuf};

use types::manifest::{Manifest, ManifestKind};

use crate::error::CodecError;

/// Directory a manifest's sidecar tar and build artifacts live under:
/// `base/{kind}-{spool-id}` (§4.1).
pub fn gen_spool_dir(manifest: &Manifest, base: &Path) -> Result<PathBuf, CodecError> {
    let spool_id = manifest.spool_id.as_deref().ok_or_else(|| {
        CodecError::MalformedManifest("manifest has no spool-id yet".to_string())
    })?;
    Ok(base.join(format!("{}-{}", kind_label(manifest.kind), spool_id)))
}

fn kind_label(kind: ManifestKind) -> &'static str {
    match kind {
        ManifestKind::Upload => "upload",
        ManifestKind::BuildRequest => "buildrequest",
        ManifestKind::BuildResult => "buildresult",
    }
}
