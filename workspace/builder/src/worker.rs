use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use regex::Regex;
use std::sync::OnceLock;

use codec::sign::Signer;
use codec::verify::Verifier;
use debian::sbuild::SbuildBuilder;
use types::manifest::{field, Manifest, ManifestKind};

use crate::buildlog;
use crate::error::BuilderError;
use crate::sbuild_key;

/// `^(Status|Lintian): [^ ]+$`, matched against each build-log line to
/// populate `Sbuild-Status`/`Sbuild-Lintian` (§4.5 point 4).
fn status_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(Status|Lintian): (\S+)$").unwrap())
}

/// Parses a build log for the last `Status:`/`Lintian:` lines it contains.
pub fn parse_build_log(log: &str) -> (Option<String>, Option<String>) {
    let mut status = None;
    let mut lintian = None;
    for line in log.lines() {
        if let Some(caps) = status_line_re().captures(line) {
            let value = caps[2].to_string();
            match &caps[1] {
                "Status" => status = Some(value),
                "Lintian" => lintian = Some(value),
                _ => {}
            }
        }
    }
    (status, lintian)
}

/// `sbuild-update --keygen` needs a throwaway `HOME`, and is a no-op if the
/// public key already exists (`mini_buildd.misc.sbuild_keys_workaround`).
fn generate_sbuild_keys() -> Result<(), BuilderError> {
    const SBUILD_PUBKEY: &str = "/var/lib/sbuild/apt-keys/sbuild-key.pub";
    if Path::new(SBUILD_PUBKEY).exists() {
        return Ok(());
    }
    let tmp_home = std::env::temp_dir().join(format!("sbuild-keygen-{}", std::process::id()));
    fs::create_dir_all(&tmp_home)?;
    let result = debian::execute::execute_command_capturing(
        "sbuild-update",
        ["--keygen"],
        None,
        &[("HOME", tmp_home.to_string_lossy().as_ref())],
    );
    let _ = fs::remove_dir_all(&tmp_home);
    result.map_err(|e| BuilderError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
    Ok(())
}

/// One build-request's execution, from signature verification through
/// uploading the signed build-result (§4.5 "Worker (builder side)").
pub struct BuildExecutor<'a> {
    pub verifier: &'a dyn Verifier,
    pub signer: &'a dyn Signer,
    pub spool_base: PathBuf,
    pub chroot_name: String,
    pub dep_resolver: String,
    /// This builder's own identity, stamped onto the result as `Built-By`
    /// (spec.md §3) so the originator can tell which builder produced it
    /// (`original_source/src/mini_buildd/changes.py:193`).
    pub built_by: String,
}

impl<'a> BuildExecutor<'a> {
    /// Executes steps 1-5 of the worker contract and returns the build-result
    /// manifest (already signed on disk at the returned path) plus its spool
    /// directory. Uploading (step 5's FTP push) and the upload-retry sweep
    /// (step 6) are handled by the caller so they can share retry policy
    /// with ingest re-dispatch; the caller reads `Upload-Result-To` off the
    /// returned manifest to know where to push it.
    pub fn run(&self, request_path: &Path, tar_path: &Path) -> Result<(Manifest, PathBuf, PathBuf), BuilderError> {
        let armored = fs::read_to_string(request_path)?;
        let payload = self
            .verifier
            .verify_cleartext(&armored)
            .map_err(|_| BuilderError::Codec(codec::CodecError::SignatureRejected(request_path.display().to_string())))?;

        sbuild_key::ensure_bootstrapped(generate_sbuild_keys)?;

        let spool_path = self.write_verified_payload(request_path, &payload)?;
        let request = codec::parse(&spool_path)?;
        let spool_dir = codec::gen_spool_dir(&request, &self.spool_base)?;
        codec::untar(tar_path, &spool_dir)?;

        let arch_all = request.field(field::ARCH_ALL) == Some("yes");
        let run_lintian = request.field(field::RUN_LINTIAN) == Some("yes");
        let apt_allow_unauthenticated = request.field(field::APT_ALLOW_UNAUTHENTICATED) == Some("yes");

        let builder = SbuildBuilder::new()
            .chroot(&self.chroot_name)
            .dist(&request.distribution)
            .arch(&request.architecture)
            .dep_resolver(&self.dep_resolver)
            .apt_allow_unauthenticated(apt_allow_unauthenticated)
            .arch_all(arch_all)
            .run_lintian(run_lintian)
            .home(&spool_dir)
            .working_dir(&spool_dir);

        let (log, exit_code) = builder
            .execute()
            .map_err(|e| BuilderError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
        let buildlog_path = spool_dir.join("build.log");
        fs::write(&buildlog_path, &log)?;

        let live_dir = self.spool_base.join("live-buildlogs");
        let live_id = request.spool_id.clone().unwrap_or_else(|| request.source_version_arch());
        if let Err(e) = buildlog::publish_live(&buildlog_path, &live_dir, &live_id) {
            warn!("failed to publish live buildlog for {live_id}: {e}");
        }

        let (sbuild_status, sbuild_lintian) = parse_build_log(&log);

        let mut result = Manifest::new(
            ManifestKind::BuildResult,
            request.source.clone(),
            request.version.clone(),
            request.distribution.clone(),
            request.architecture.clone(),
        );
        result.set_field(field::SBUILDRETVAL, exit_code.to_string());
        if let Some(status) = sbuild_status {
            result.set_field(field::SBUILD_STATUS, status);
        }
        if let Some(lintian) = sbuild_lintian {
            result.set_field(field::SBUILD_LINTIAN, lintian);
        }
        if let Some(upload_result_to) = request.field(field::UPLOAD_RESULT_TO) {
            result.set_field(field::UPLOAD_RESULT_TO, upload_result_to.to_string());
        }
        result.set_field(field::BUILT_BY, self.built_by.clone());

        let result_path = spool_dir.join(result.to_string());
        codec::write(&result, &result_path)?;
        codec::sign(&result_path, self.signer)?;

        info!(
            "build of {} ({}) finished: retval={exit_code}",
            request.source_version_arch(),
            request.distribution
        );

        Ok((result, result_path, spool_dir))
    }

    fn write_verified_payload(&self, request_path: &Path, payload: &str) -> Result<PathBuf, BuilderError> {
        let verified_path = request_path.with_extension("verified.changes");
        fs::write(&verified_path, payload)?;
        Ok(verified_path)
    }
}

/// Retries FTP upload for build-results stuck in UPLOADING (step 6: never
/// re-runs the build, only the upload).
pub fn retry_pending_uploads(
    pending: &[(Manifest, PathBuf)],
    endpoint: &str,
) -> Vec<(Manifest, PathBuf, Result<(), codec::CodecError>)> {
    pending
        .iter()
        .map(|(manifest, path)| {
            let outcome = codec::upload(manifest, path, endpoint);
            if let Err(e) = &outcome {
                warn!("upload retry for {} still failing: {e}", path.display());
            }
            (manifest.clone(), path.clone(), outcome)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_status_and_lintian_lines() {
        let log = "some build output\nStatus: successful\nmore output\nLintian: pass\n";
        let (status, lintian) = parse_build_log(log);
        assert_eq!(status.as_deref(), Some("successful"));
        assert_eq!(lintian.as_deref(), Some("pass"));
    }

    #[test]
    fn missing_lines_yield_none() {
        let (status, lintian) = parse_build_log("nothing matches here\n");
        assert!(status.is_none());
        assert!(lintian.is_none());
    }

    #[test]
    fn last_occurrence_of_each_line_wins() {
        let log = "Status: building\nStatus: successful\n";
        let (status, _) = parse_build_log(log);
        assert_eq!(status.as_deref(), Some("successful"));
    }
}
