use codec::sign::{Signer, SignerError};

use crate::gpg::GpgHome;

/// The daemon's own signing key, used for internally generated
/// build-requests and ports. Always added to both logical keyrings so the
/// daemon trusts its own artifacts (§4.2).
#[derive(Debug, Clone)]
pub struct DaemonKey {
    home: GpgHome,
    key_id: String,
}

impl DaemonKey {
    pub fn new(home: GpgHome, key_id: String) -> Self {
        DaemonKey { home, key_id }
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }
}

impl Signer for DaemonKey {
    fn sign_cleartext(&self, text: &str) -> Result<String, SignerError> {
        self.home
            .clearsign(&self.key_id, text)
            .map_err(|_| SignerError::Transient)
    }
}
