use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use codec::error::CodecError;
use types::config::ConfigSnapshot;

use crate::gpg::GpgHome;
use crate::keyring::Keyring;

/// Holds the two logical keyrings (§4.2): a per-repository uploaders
/// keyring, and a single remotes keyring shared across all remote
/// builders. Both are rebuilt lazily: `mark_needs_update` flips a flag, and
/// the next verification call atomically swaps in a freshly built keyring
/// before checking the signature.
pub struct CryptoGate {
    gpg_home: GpgHome,
    daemon_fingerprint: String,
    uploaders: RwLock<HashMap<String, Arc<Keyring>>>,
    remotes: RwLock<Arc<Keyring>>,
    needs_update: AtomicBool,
}

impl CryptoGate {
    pub fn new(gpg_home: GpgHome, daemon_fingerprint: String) -> Self {
        let empty_remotes = Keyring::new(gpg_home.clone(), HashSet::new());
        CryptoGate {
            gpg_home,
            daemon_fingerprint,
            uploaders: RwLock::new(HashMap::new()),
            remotes: RwLock::new(Arc::new(empty_remotes)),
            needs_update: AtomicBool::new(true),
        }
    }

    pub fn mark_needs_update(&self) {
        self.needs_update.store(true, Ordering::SeqCst);
    }

    /// Rebuilds both keyrings from the configuration snapshot and swaps them
    /// in. The daemon's own key is always added, per §4.2.
    pub fn rebuild(&self, snapshot: &ConfigSnapshot) {
        let mut uploaders = HashMap::new();
        for repo in &snapshot.repositories {
            let mut trusted: HashSet<String> = repo.allowed_uploader_keys.iter().cloned().collect();
            trusted.insert(self.daemon_fingerprint.clone());
            uploaders.insert(
                repo.identity.clone(),
                Arc::new(Keyring::new(self.gpg_home.clone(), trusted)),
            );
        }

        let mut remote_trusted: HashSet<String> = snapshot
            .remotes
            .iter()
            .map(|r| r.public_key_fingerprint.clone())
            .collect();
        remote_trusted.insert(self.daemon_fingerprint.clone());
        let remotes = Arc::new(Keyring::new(self.gpg_home.clone(), remote_trusted));

        *self.uploaders.write().expect("uploaders lock poisoned") = uploaders;
        *self.remotes.write().expect("remotes lock poisoned") = remotes;
        self.needs_update.store(false, Ordering::SeqCst);
    }

    fn ensure_fresh(&self, snapshot: &ConfigSnapshot) {
        if self.needs_update.load(Ordering::SeqCst) {
            self.rebuild(snapshot);
        }
    }

    /// Verifies an upload's signature against `repo_identity`'s uploaders
    /// keyring.
    pub fn verify_upload(
        &self,
        snapshot: &ConfigSnapshot,
        manifest_path: &Path,
        repo_identity: &str,
    ) -> Result<String, CodecError> {
        self.ensure_fresh(snapshot);
        let uploaders = self.uploaders.read().expect("uploaders lock poisoned");
        let keyring = uploaders.get(repo_identity).ok_or_else(|| {
            CodecError::SignatureRejected(format!("no uploaders keyring for {repo_identity}"))
        })?;
        codec::verify(manifest_path, keyring.as_ref())
    }

    /// Verifies a build-result's signature against the remotes keyring.
    pub fn verify_remote(
        &self,
        snapshot: &ConfigSnapshot,
        manifest_path: &Path,
    ) -> Result<String, CodecError> {
        self.ensure_fresh(snapshot);
        let remotes = self.remotes.read().expect("remotes lock poisoned");
        codec::verify(manifest_path, remotes.as_ref())
    }

    /// Hands out the current remotes keyring itself (rather than running a
    /// verification through it), for callers that need a `&dyn Verifier`
    /// directly — the builder worker's `BuildExecutor` verifies a
    /// build-request's signature as its first step (§4.5 "Worker (builder
    /// side)") using the same seam `verify_remote` uses internally.
    pub fn remotes_keyring(&self, snapshot: &ConfigSnapshot) -> Arc<Keyring> {
        self.ensure_fresh(snapshot);
        Arc::clone(&self.remotes.read().expect("remotes lock poisoned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::config::RepositoryConfig;

    fn empty_snapshot() -> ConfigSnapshot {
        ConfigSnapshot {
            repositories: vec![RepositoryConfig {
                identity: "test".to_string(),
                allowed_uploader_keys: vec!["ABCDEF".to_string()],
                allow_unauthenticated_uploads: false,
                distributions: vec![],
            }],
            suites: vec![],
            remotes: vec![],
            build_queue_size: None,
            log_dir: None,
        }
    }

    #[test]
    fn rebuild_populates_per_repository_uploaders() {
        let gate = CryptoGate::new(GpgHome::new("/tmp/buildfarmd-test-gpg".into()), "DAEMON".to_string());
        gate.rebuild(&empty_snapshot());
        let uploaders = gate.uploaders.read().unwrap();
        let keyring = uploaders.get("test").unwrap();
        assert!(keyring.is_trusted("ABCDEF"));
        assert!(keyring.is_trusted("DAEMON"));
        assert!(!keyring.is_trusted("UNKNOWN"));
    }

    #[test]
    fn needs_update_defaults_true_until_first_rebuild() {
        let gate = CryptoGate::new(GpgHome::new("/tmp/buildfarmd-test-gpg2".into()), "DAEMON".to_string());
        assert!(gate.needs_update.load(Ordering::SeqCst));
        gate.rebuild(&empty_snapshot());
        assert!(!gate.needs_update.load(Ordering::SeqCst));
    }
}
