use std::path::Path;
use std::time::Duration;

use log::{debug, warn};
use types::config::{RemoteBuilderConfig, RemoteStatus};
use types::manifest::{field, Manifest};

use crate::error::BuilderError;

const STATUS_TIMEOUT: Duration = Duration::from_secs(10);

/// A remote builder scored for dispatch: its configuration and its
/// freshly-fetched status.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub config: RemoteBuilderConfig,
    pub status: RemoteStatus,
}

/// The "self" pseudo-remote dispatch always considers alongside configured
/// remotes, per §4.5.
pub fn self_candidate(http_endpoint: &str, ftp_endpoint: &str, fingerprint: &str) -> RemoteBuilderConfig {
    RemoteBuilderConfig {
        http_endpoint: http_endpoint.to_string(),
        ftp_endpoint: ftp_endpoint.to_string(),
        public_key_fingerprint: fingerprint.to_string(),
    }
}

/// Fetches a remote builder's live status over HTTP with a 10s timeout.
pub fn fetch_status(http_endpoint: &str) -> Result<RemoteStatus, BuilderError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(STATUS_TIMEOUT)
        .build()?;
    let status = client
        .get(format!("{http_endpoint}/status"))
        .send()?
        .json::<RemoteStatus>()?;
    Ok(status)
}

/// Builds the ranked candidate list for one build-request: refreshes every
/// remote's status, drops any that aren't `running`, don't have the needed
/// chroot, or don't list `own_endpoint` among the remotes they know about
/// (the "knows us" check), then sorts ascending by load.
pub fn rank_candidates(
    remotes: &[RemoteBuilderConfig],
    own_endpoint: &str,
    codename: &str,
    arch: &str,
) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = remotes
        .iter()
        .filter_map(|config| match fetch_status(&config.http_endpoint) {
            Ok(status) => Some(Candidate {
                config: config.clone(),
                status,
            }),
            Err(e) => {
                warn!("could not refresh status for {}: {e}", config.http_endpoint);
                None
            }
        })
        .filter(|candidate| {
            if !candidate.status.running {
                return false;
            }
            if !candidate.status.has_chroot(codename, arch) {
                return false;
            }
            if !candidate.status.knows(own_endpoint) {
                debug!(
                    "skipping {}: its status does not list us as a known remote",
                    candidate.config.http_endpoint
                );
                return false;
            }
            true
        })
        .collect();

    candidates.sort_by(|a, b| a.status.load.partial_cmp(&b.status.load).unwrap_or(std::cmp::Ordering::Equal));
    candidates
}

/// Attempts FTP upload to each candidate in order until one succeeds,
/// recording the chosen builder's HTTP URL on the manifest. Returns a
/// dispatch failure if no candidate accepts the upload.
pub fn dispatch(
    manifest: &mut Manifest,
    manifest_path: &Path,
    candidates: &[Candidate],
) -> Result<String, BuilderError> {
    for candidate in candidates {
        match codec::upload(manifest, manifest_path, &candidate.config.ftp_endpoint) {
            Ok(()) => {
                manifest.set_field(field::BUILT_BY, candidate.config.http_endpoint.clone());
                return Ok(candidate.config.http_endpoint.clone());
            }
            Err(e) => {
                warn!(
                    "FTP push to {} failed, trying next candidate: {e}",
                    candidate.config.ftp_endpoint
                );
            }
        }
    }
    Err(BuilderError::NoCandidateAccepted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn remote(endpoint: &str) -> RemoteBuilderConfig {
        RemoteBuilderConfig {
            http_endpoint: endpoint.to_string(),
            ftp_endpoint: format!("{endpoint}-ftp"),
            public_key_fingerprint: "AAAA".to_string(),
        }
    }

    fn status(running: bool, load: f64, knows_us: bool) -> RemoteStatus {
        let mut chroots = HashMap::new();
        chroots.insert("bookworm".to_string(), vec!["amd64".to_string()]);
        RemoteStatus {
            running,
            load,
            chroots,
            remotes: if knows_us { vec!["http://us".to_string()] } else { vec![] },
        }
    }

    #[test]
    fn self_candidate_carries_given_fields() {
        let s = self_candidate("http://self:8066", "ftp://self:8067", "SELFFP");
        assert_eq!(s.http_endpoint, "http://self:8066");
        assert_eq!(s.public_key_fingerprint, "SELFFP");
    }

    #[test]
    fn has_chroot_and_knows_us_gate_candidacy() {
        let ok = status(true, 0.1, true);
        assert!(ok.has_chroot("bookworm", "amd64"));
        assert!(ok.knows("http://us"));

        let missing_chroot = status(true, 0.1, true);
        assert!(!missing_chroot.has_chroot("bullseye", "amd64"));

        let unknown_to_remote = status(true, 0.1, false);
        assert!(!unknown_to_remote.knows("http://us"));
    }

    #[test]
    fn remote_without_config_has_predictable_ftp_fallback() {
        let r = remote("http://b1");
        assert_eq!(r.ftp_endpoint, "http://b1-ftp");
    }
}
