//! Build-request construction (§4.4 step 4): one build-request manifest per
//! `ArchitectureOption`, plus the sidecar tar bundling the source package
//! alongside the chroot-setup material a worker needs to build it.

use std::path::{Path, PathBuf};

use types::config::ArchitectureOption;
use types::manifest::{field, Manifest, ManifestKind};

use crate::error::PackagerError;

/// Builds one build-request manifest for `arch_option`, copying the
/// upload's identity fields and layering on the fields a worker needs to
/// run the build (§4.4 step 4, §6 Sbuildrc fragment).
#[allow(clippy::too_many_arguments)]
pub fn build_request(
    upload: &Manifest,
    arch_option: &ArchitectureOption,
    upload_result_to: &str,
    base_distribution: &str,
    dep_resolver: &str,
    apt_allow_unauthenticated: bool,
    run_lintian: bool,
    deb_build_options: &str,
) -> Manifest {
    let mut request = Manifest::new(
        ManifestKind::BuildRequest,
        upload.source.clone(),
        upload.version.clone(),
        upload.distribution.clone(),
        arch_option.arch.clone(),
    );
    request.files = upload.files.clone();
    request.changes = upload.changes.clone();

    request.set_field(field::UPLOAD_RESULT_TO, upload_result_to);
    request.set_field(field::BASE_DISTRIBUTION, base_distribution);
    request.set_field(field::BUILD_DEP_RESOLVER, dep_resolver);
    request.set_field(
        field::APT_ALLOW_UNAUTHENTICATED,
        if apt_allow_unauthenticated { "yes" } else { "no" },
    );
    if arch_option.build_architecture_all {
        request.set_field(field::ARCH_ALL, "yes");
    }
    if run_lintian {
        request.set_field(field::RUN_LINTIAN, "yes");
    }
    if !deb_build_options.is_empty() {
        request.set_field(field::DEB_BUILD_OPTIONS, deb_build_options);
    }

    request
}

/// Assembles the build-request's sidecar tar: the source package files
/// (via `codec::tar`'s own handling of `manifest.files`) plus the
/// chroot-setup material supplied by the caller (apt sources, apt
/// preferences, apt keys, SSL cert, chroot-setup script, sbuild config
/// snippet).
pub fn build_request_tar(
    request: &Manifest,
    upload_changes_path: &Path,
    output_path: &Path,
    chroot_setup_files: &[PathBuf],
) -> Result<(), PackagerError> {
    codec::tar(request, upload_changes_path, output_path, chroot_setup_files, &[])?;
    Ok(())
}

/// Renders the sbuild config snippet a worker writes before building: two
/// tunables, then a verbatim user-supplied fragment (§6 Sbuildrc fragment).
pub fn render_sbuildrc_fragment(apt_allow_unauthenticated: bool, extra_fragment: &str) -> String {
    format!(
        "apt_update=0\napt_allow_unauthenticated={}\n{extra_fragment}",
        if apt_allow_unauthenticated { 1 } else { 0 },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::version::Version;

    fn sample_upload() -> Manifest {
        Manifest::new(
            ManifestKind::Upload,
            "foo".to_string(),
            Version::try_from("1.0-1").unwrap(),
            "bookworm-test-unstable".to_string(),
            "source".to_string(),
        )
    }

    #[test]
    fn build_request_copies_identity_and_adds_worker_fields() {
        let upload = sample_upload();
        let arch = ArchitectureOption {
            arch: "amd64".to_string(),
            build_architecture_all: true,
        };
        let request = build_request(
            &upload,
            &arch,
            "http://us:8066",
            "bookworm-test-unstable",
            "apt",
            false,
            true,
            "",
        );
        assert_eq!(request.kind, ManifestKind::BuildRequest);
        assert_eq!(request.architecture, "amd64");
        assert_eq!(request.field(field::UPLOAD_RESULT_TO), Some("http://us:8066"));
        assert_eq!(request.field(field::ARCH_ALL), Some("yes"));
        assert_eq!(request.field(field::RUN_LINTIAN), Some("yes"));
        assert_eq!(request.field(field::APT_ALLOW_UNAUTHENTICATED), Some("no"));
    }

    #[test]
    fn arch_all_field_absent_when_not_marked() {
        let upload = sample_upload();
        let arch = ArchitectureOption {
            arch: "amd64".to_string(),
            build_architecture_all: false,
        };
        let request = build_request(&upload, &arch, "http://us", "d", "apt", false, false, "");
        assert_eq!(request.field(field::ARCH_ALL), None);
        assert_eq!(request.field(field::RUN_LINTIAN), None);
    }

    #[test]
    fn sbuildrc_fragment_carries_the_two_tunables_then_the_extra_fragment() {
        let rendered = render_sbuildrc_fragment(true, "$extra = 1;\n");
        assert_eq!(rendered, "apt_update=0\napt_allow_unauthenticated=1\n$extra = 1;\n");
    }
}
