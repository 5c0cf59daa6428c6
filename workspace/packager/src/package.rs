//! The in-flight state of one upload (§4.4 steps 6-7): which architectures
//! were requested, which have reported success or failure, and the
//! accept/reject policy applied to each build-result.

use std::collections::BTreeMap;
use std::path::PathBuf;

use types::config::{LintianMode, Suite};
use types::manifest::{field, Manifest};
use types::status::PackageStatus;
use types::upload_options::UploadOptions;

/// Whether a build-result counts as success or failure, per §4.4 step 6:
/// `Sbuildretval==0` AND (`Sbuild-Status==skipped` OR lintian accepted).
pub fn build_result_accepted(result: &Manifest, suite: &Suite, lintian_mode: LintianMode, ignore_lintian: bool) -> bool {
    if result.sbuildretval() != Some(0) {
        return false;
    }
    if result.sbuild_status() == Some("skipped") {
        return true;
    }
    lintian_accepted(result, suite, lintian_mode, ignore_lintian)
}

/// Lintian acceptance: pass verdict, OR the suite is experimental, OR the
/// distribution's lintian mode is below `fail-on-error`, OR the upload
/// opted out via `ignore-lintian` (possibly per-arch).
fn lintian_accepted(result: &Manifest, suite: &Suite, lintian_mode: LintianMode, ignore_lintian: bool) -> bool {
    if result.sbuild_lintian() == Some("pass") {
        return true;
    }
    if suite.experimental {
        return true;
    }
    if lintian_mode < LintianMode::FailOnError {
        return true;
    }
    ignore_lintian
}

/// One upload's build-request/build-result bookkeeping, keyed by
/// architecture.
#[derive(Debug)]
pub struct Package {
    pub source: String,
    pub version: String,
    pub repository: String,
    pub distribution: String,
    pub suite: String,
    pub requests: Vec<String>,
    pub success: BTreeMap<String, (Manifest, PathBuf)>,
    pub failed: BTreeMap<String, (Manifest, PathBuf)>,
    pub status: PackageStatus,
    pub port_report: Vec<(String, Result<(), String>)>,
    /// Options parsed from the upload's own changelog bullets (§3), applied
    /// uniformly to every build-result this package collects.
    pub upload_options: UploadOptions,
    pub upload_changes_path: PathBuf,
}

impl Package {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: String,
        version: String,
        repository: String,
        distribution: String,
        suite: String,
        requests: Vec<String>,
        upload_options: UploadOptions,
        upload_changes_path: PathBuf,
    ) -> Self {
        Package {
            source,
            version,
            repository,
            distribution,
            suite,
            requests,
            success: BTreeMap::new(),
            failed: BTreeMap::new(),
            status: PackageStatus::Building,
            port_report: Vec::new(),
            upload_options,
            upload_changes_path,
        }
    }

    pub fn source_version(&self) -> String {
        format!("{}_{}", self.source, self.version)
    }

    /// Records one build-result's verdict for its architecture. A
    /// build-request that dispatch could not place is recorded directly as
    /// a failure via the synthesized build-result (§4.4 step 5).
    ///
    /// A duplicate result for an arch already decided (e.g. a retried build
    /// from a slow remote finally landing) is dropped: the first verified
    /// result for an arch wins (§9 Design Notes, Open Question "ordering of
    /// build-results from multiple remotes"). Returns whether the result was
    /// newly recorded.
    pub fn record_result(&mut self, arch: String, manifest: Manifest, path: PathBuf, accepted: bool) -> bool {
        if self.success.contains_key(&arch) || self.failed.contains_key(&arch) {
            log::warn!("dropping duplicate build-result for {}_{} arch {arch}", self.source, self.version);
            return false;
        }
        if accepted {
            self.success.insert(arch, (manifest, path));
        } else {
            self.failed.insert(arch, (manifest, path));
        }
        true
    }

    /// True once every requested architecture has reported one way or the
    /// other.
    pub fn is_complete(&self) -> bool {
        self.success.len() + self.failed.len() >= self.requests.len()
    }

    pub fn installed(&self) -> bool {
        self.is_complete() && self.failed.is_empty()
    }

    pub fn changes_dump(&self) -> String {
        self.success
            .values()
            .chain(self.failed.values())
            .map(|(m, _)| m.changes.clone())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn upload_result_to(&self, arch: &str) -> Option<&str> {
        self.success
            .get(arch)
            .or_else(|| self.failed.get(arch))
            .and_then(|(m, _)| m.field(field::UPLOAD_RESULT_TO))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::manifest::ManifestKind;
    use types::version::Version;

    fn suite(experimental: bool) -> Suite {
        Suite {
            name: "unstable".to_string(),
            uploadable: true,
            experimental,
            migrates_to: None,
            build_keyring_package: false,
            rollback: 0,
            mandatory_version: String::new(),
        }
    }

    fn result(retval: i32, status: Option<&str>, lintian: Option<&str>) -> Manifest {
        let mut m = Manifest::new(
            ManifestKind::BuildResult,
            "foo".to_string(),
            Version::try_from("1.0-1").unwrap(),
            "bookworm-test-unstable".to_string(),
            "amd64".to_string(),
        );
        m.set_field(field::SBUILDRETVAL, retval.to_string());
        if let Some(s) = status {
            m.set_field(field::SBUILD_STATUS, s.to_string());
        }
        if let Some(l) = lintian {
            m.set_field(field::SBUILD_LINTIAN, l.to_string());
        }
        m
    }

    #[test]
    fn nonzero_retval_is_always_rejected() {
        let r = result(1, Some("skipped"), None);
        assert!(!build_result_accepted(&r, &suite(false), LintianMode::Disabled, false));
    }

    #[test]
    fn skipped_status_bypasses_lintian() {
        let r = result(0, Some("skipped"), None);
        assert!(build_result_accepted(&r, &suite(false), LintianMode::FailOnError, false));
    }

    #[test]
    fn lintian_pass_is_accepted() {
        let r = result(0, Some("successful"), Some("pass"));
        assert!(build_result_accepted(&r, &suite(false), LintianMode::FailOnError, false));
    }

    #[test]
    fn lintian_failure_accepted_in_experimental_suite() {
        let r = result(0, Some("successful"), Some("fail"));
        assert!(build_result_accepted(&r, &suite(true), LintianMode::FailOnError, false));
    }

    #[test]
    fn lintian_failure_accepted_below_fail_on_error() {
        let r = result(0, Some("successful"), Some("fail"));
        assert!(build_result_accepted(&r, &suite(false), LintianMode::RunOnly, false));
    }

    #[test]
    fn lintian_failure_accepted_with_ignore_lintian_option() {
        let r = result(0, Some("successful"), Some("fail"));
        assert!(build_result_accepted(&r, &suite(false), LintianMode::FailOnError, true));
    }

    #[test]
    fn lintian_failure_rejected_otherwise() {
        let r = result(0, Some("successful"), Some("fail"));
        assert!(!build_result_accepted(&r, &suite(false), LintianMode::FailOnError, false));
    }

    #[test]
    fn package_completes_when_all_requests_reported() {
        let mut pkg = Package::new(
            "foo".to_string(),
            "1.0-1".to_string(),
            "test".to_string(),
            "bookworm-test-unstable".to_string(),
            "unstable".to_string(),
            vec!["amd64".to_string(), "i386".to_string()],
            UploadOptions::default(),
            PathBuf::from("/spool/foo_1.0-1_amd64.changes"),
        );
        assert!(!pkg.is_complete());
        pkg.record_result(
            "amd64".to_string(),
            result(0, Some("skipped"), None),
            PathBuf::from("/spool/foo_1.0-1_mini-buildd-buildresult_amd64.changes"),
            true,
        );
        assert!(!pkg.is_complete());
        pkg.record_result(
            "i386".to_string(),
            result(1, None, None),
            PathBuf::from("/spool/foo_1.0-1_mini-buildd-buildresult_i386.changes"),
            false,
        );
        assert!(pkg.is_complete());
        assert!(!pkg.installed());
    }

    #[test]
    fn duplicate_result_for_a_decided_arch_is_dropped() {
        let mut pkg = Package::new(
            "foo".to_string(),
            "1.0-1".to_string(),
            "test".to_string(),
            "bookworm-test-unstable".to_string(),
            "unstable".to_string(),
            vec!["amd64".to_string()],
            UploadOptions::default(),
            PathBuf::from("/spool/foo_1.0-1_amd64.changes"),
        );
        assert!(pkg.record_result(
            "amd64".to_string(),
            result(0, Some("skipped"), None),
            PathBuf::from("/spool/foo_1.0-1_mini-buildd-buildresult_amd64.changes"),
            true,
        ));
        assert!(pkg.is_complete());
        assert!(pkg.installed());

        // A retried build from a slow remote finally lands after the arch
        // was already decided: dropped, not overwritten.
        assert!(!pkg.record_result(
            "amd64".to_string(),
            result(1, None, None),
            PathBuf::from("/spool/foo_1.0-1_mini-buildd-buildresult_amd64-retry.changes"),
            false,
        ));
        assert!(pkg.installed());
    }
}
