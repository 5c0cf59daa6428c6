//! Trait seam over builder dispatch (§9 Design Notes) so the Packager's
//! fan-out logic can be tested without live HTTP status endpoints or FTP
//! transfer.

use std::path::Path;

use builder::BuilderError;
use types::config::RemoteBuilderConfig;
use types::manifest::Manifest;

pub trait DispatchOps: Send + Sync {
    /// Ranks candidates for `(codename, arch)` and attempts FTP upload to
    /// each in turn, returning the accepting builder's HTTP endpoint.
    fn dispatch(
        &self,
        manifest: &mut Manifest,
        manifest_path: &Path,
        codename: &str,
        arch: &str,
    ) -> Result<String, BuilderError>;
}

/// Dispatches against the configured remote fleet plus self, exactly as
/// `builder::dispatch` implements it.
pub struct RemoteDispatcher {
    pub remotes: Vec<RemoteBuilderConfig>,
    pub own_http_endpoint: String,
    pub own_ftp_endpoint: String,
    pub own_fingerprint: String,
}

impl DispatchOps for RemoteDispatcher {
    fn dispatch(
        &self,
        manifest: &mut Manifest,
        manifest_path: &Path,
        codename: &str,
        arch: &str,
    ) -> Result<String, BuilderError> {
        let mut remotes = self.remotes.clone();
        remotes.push(builder::self_candidate(
            &self.own_http_endpoint,
            &self.own_ftp_endpoint,
            &self.own_fingerprint,
        ));
        let candidates = builder::rank_candidates(&remotes, &self.own_http_endpoint, codename, arch);
        builder::dispatch(manifest, manifest_path, &candidates)
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::sync::Mutex;

    /// Accepts (or rejects) every dispatch deterministically, recording
    /// what it was asked to dispatch, for state-machine tests.
    #[derive(Default)]
    pub struct FakeDispatcher {
        pub accept_as: Option<String>,
        pub calls: Mutex<Vec<(String, String)>>,
    }

    impl DispatchOps for FakeDispatcher {
        fn dispatch(
            &self,
            _manifest: &mut Manifest,
            _manifest_path: &Path,
            codename: &str,
            arch: &str,
        ) -> Result<String, BuilderError> {
            self.calls.lock().unwrap().push((codename.to_string(), arch.to_string()));
            match &self.accept_as {
                Some(endpoint) => Ok(endpoint.clone()),
                None => Err(BuilderError::NoCandidateAccepted),
            }
        }
    }
}
