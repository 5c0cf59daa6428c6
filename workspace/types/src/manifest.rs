use std::collections::BTreeMap;
use std::fmt;

use crate::version::Version;

/// Which of the three manifest shapes a `.changes` file represents, per the
/// filename marker convention (`_mini-buildd-buildrequest` /
/// `_mini-buildd-buildresult` / none).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManifestKind {
    Upload,
    BuildRequest,
    BuildResult,
}

impl ManifestKind {
    pub fn marker(&self) -> &'static str {
        match self {
            ManifestKind::Upload => "",
            ManifestKind::BuildRequest => "_mini-buildd-buildrequest",
            ManifestKind::BuildResult => "_mini-buildd-buildresult",
        }
    }
}

/// One entry in the manifest's `Files:` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub md5: String,
    pub size: u64,
}

/// Well-known field names the core reads or writes on a manifest, beyond the
/// mandatory `Source`/`Version`/`Distribution`/`Architecture`/`Files`.
pub mod field {
    pub const UPLOAD_RESULT_TO: &str = "Upload-Result-To";
    pub const BASE_DISTRIBUTION: &str = "Base-Distribution";
    pub const BUILD_DEP_RESOLVER: &str = "Build-Dep-Resolver";
    pub const APT_ALLOW_UNAUTHENTICATED: &str = "Apt-Allow-Unauthenticated";
    pub const ARCH_ALL: &str = "Arch-All";
    pub const RUN_LINTIAN: &str = "Run-Lintian";
    pub const DEB_BUILD_OPTIONS: &str = "Deb-Build-Options";
    pub const SBUILDRETVAL: &str = "Sbuildretval";
    pub const SBUILD_STATUS: &str = "Sbuild-Status";
    pub const SBUILD_LINTIAN: &str = "Sbuild-Lintian";
    pub const BUILT_BY: &str = "Built-By";
    pub const BUILT_ON: &str = "Built-On";
}

/// A parsed `.changes`-family manifest: an upload, a build-request, or a
/// build-result. Fields beyond the mandatory ones are kept in a free-form bag
/// rather than a fixed struct, mirroring the dynamic nature of the original
/// RFC822 control file (new marker fields are added at each stage of the
/// pipeline without redefining the type).
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub kind: ManifestKind,
    pub source: String,
    pub version: Version,
    pub distribution: String,
    pub architecture: String,
    pub files: Vec<FileEntry>,
    pub changes: String,
    fields: BTreeMap<String, String>,
    /// SHA1 content hash of the manifest file; set by the codec on parse,
    /// `None` for an in-memory manifest not yet written to disk.
    pub spool_id: Option<String>,
}

impl Manifest {
    pub fn new(
        kind: ManifestKind,
        source: String,
        version: Version,
        distribution: String,
        architecture: String,
    ) -> Self {
        Manifest {
            kind,
            source,
            version,
            distribution,
            architecture,
            files: Vec::new(),
            changes: String::new(),
            fields: BTreeMap::new(),
            spool_id: None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Correlation key for a package across all its architectures.
    pub fn source_version(&self) -> String {
        format!("{}_{}", self.source, self.version)
    }

    /// Correlation key for one build-request / build-result.
    pub fn source_version_arch(&self) -> String {
        format!("{}_{}_{}", self.source, self.version, self.architecture)
    }

    pub fn sbuildretval(&self) -> Option<i32> {
        self.field(field::SBUILDRETVAL).and_then(|v| v.parse().ok())
    }

    pub fn sbuild_status(&self) -> Option<&str> {
        self.field(field::SBUILD_STATUS)
    }

    pub fn sbuild_lintian(&self) -> Option<&str> {
        self.field(field::SBUILD_LINTIAN)
    }
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}{}_{}.changes",
            self.source,
            self.version.strip_epoch(),
            self.kind.marker(),
            self.architecture
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Manifest {
        Manifest::new(
            ManifestKind::Upload,
            "foo".to_string(),
            Version::try_from("1.0-1").unwrap(),
            "buster-test-unstable".to_string(),
            "amd64".to_string(),
        )
    }

    #[test]
    fn filename_uses_stripped_version() {
        let mut m = sample();
        m.version = Version::try_from("7:1.0-1").unwrap();
        assert_eq!(m.to_string(), "foo_1.0-1_amd64.changes");
    }

    #[test]
    fn build_request_filename_carries_marker() {
        let mut m = sample();
        m.kind = ManifestKind::BuildRequest;
        assert_eq!(m.to_string(), "foo_1.0-1_mini-buildd-buildrequest_amd64.changes");
    }

    #[test]
    fn source_version_arch_is_stable_correlation_key() {
        let m = sample();
        assert_eq!(m.source_version_arch(), "foo_1.0-1_amd64");
    }
}
