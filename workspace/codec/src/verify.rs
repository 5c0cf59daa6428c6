use std::fs;
use std::path::Path;

use crate::error::CodecError;

/// Verifies an armored cleartext signature, returning the verified payload.
/// Implemented by the keyring crate's uploaders/remotes keyring wrappers
/// around `gpg --verify`.
pub trait Verifier {
    fn verify_cleartext(&self, armored: &str) -> Result<String, VerifierError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifierError;

/// Cleartext-signature verification; a failure raises `SignatureRejected`
/// rather than propagating the verifier's own error, since the caller only
/// ever needs to know the manifest is untrusted (§4.1).
pub fn verify(path: &Path, verifier: &dyn Verifier) -> Result<String, CodecError> {
    let armored = fs::read_to_string(path)?;
    verifier
        .verify_cleartext(&armored)
        .map_err(|_| CodecError::SignatureRejected(path.display().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AcceptAll;
    impl Verifier for AcceptAll {
        fn verify_cleartext(&self, armored: &str) -> Result<String, VerifierError> {
            Ok(armored.to_string())
        }
    }

    struct RejectAll;
    impl Verifier for RejectAll {
        fn verify_cleartext(&self, _armored: &str) -> Result<String, VerifierError> {
            Err(VerifierError)
        }
    }

    #[test]
    fn accepted_signature_returns_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foo.changes");
        fs::write(&path, "signed body").unwrap();
        assert_eq!(verify(&path, &AcceptAll).unwrap(), "signed body");
    }

    #[test]
    fn rejected_signature_is_signature_rejected_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foo.changes");
        fs::write(&path, "signed body").unwrap();
        assert!(matches!(
            verify(&path, &RejectAll),
            Err(CodecError::SignatureRejected(_))
        ));
    }
}
