use codec::verify::{Verifier, VerifierError};

use crate::gpg::{GpgHome, TrustedFingerprints};

/// A logical keyring (uploaders or remotes): a gpg homedir plus the set of
/// fingerprints trusted for this keyring's purpose. Built lazily from the
/// configuration snapshot and swapped in atomically by `CryptoGate` (§4.2).
#[derive(Debug, Clone)]
pub struct Keyring {
    home: GpgHome,
    trusted: TrustedFingerprints,
}

impl Keyring {
    pub fn new(home: GpgHome, trusted: TrustedFingerprints) -> Self {
        Keyring { home, trusted }
    }

    pub fn is_trusted(&self, fingerprint: &str) -> bool {
        self.trusted.contains(fingerprint)
    }
}

impl Verifier for Keyring {
    fn verify_cleartext(&self, armored: &str) -> Result<String, VerifierError> {
        let (plaintext, fingerprint) = self.home.verify(armored).map_err(|_| VerifierError)?;
        if !self.is_trusted(&fingerprint) {
            return Err(VerifierError);
        }
        Ok(plaintext)
    }
}
