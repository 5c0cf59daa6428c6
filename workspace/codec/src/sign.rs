use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

use log::warn;

use crate::error::CodecError;

const MAX_ATTEMPTS: u32 = 5;
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Produces an armored cleartext signature over `text`. Implemented by the
/// keyring crate's uploader-key wrapper around `gpg --clearsign`.
pub trait Signer {
    fn sign_cleartext(&self, text: &str) -> Result<String, SignerError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignerError {
    /// Worth retrying (e.g. the gpg-agent socket was momentarily busy).
    Transient,
    /// Not worth retrying (e.g. the signing key is missing).
    Permanent,
}

/// Writes the manifest's control fields, appends a trailing newline, and
/// replaces the file in place with the signer's armored cleartext signature
/// over that content. Retries up to 5 times, 1s apart, on a transient
/// signer failure (§4.1).
pub fn sign(path: &Path, signer: &dyn Signer) -> Result<(), CodecError> {
    let mut body = fs::read_to_string(path)?;
    if !body.ends_with('\n') {
        body.push('\n');
    }

    let mut attempt = 0;
    loop {
        attempt += 1;
        match signer.sign_cleartext(&body) {
            Ok(armored) => {
                fs::write(path, armored)?;
                return Ok(());
            }
            Err(SignerError::Permanent) => {
                return Err(CodecError::SignerFailed(
                    "signer reported a permanent failure".to_string(),
                ));
            }
            Err(SignerError::Transient) if attempt < MAX_ATTEMPTS => {
                warn!(
                    "transient signing failure for {} (attempt {attempt}/{MAX_ATTEMPTS}), retrying",
                    path.display()
                );
                thread::sleep(RETRY_DELAY);
            }
            Err(SignerError::Transient) => {
                return Err(CodecError::SignerFailed(format!(
                    "signer did not succeed after {MAX_ATTEMPTS} attempts"
                )));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct FlakySigner {
        failures_left: Cell<u32>,
    }

    impl Signer for FlakySigner {
        fn sign_cleartext(&self, text: &str) -> Result<String, SignerError> {
            let left = self.failures_left.get();
            if left > 0 {
                self.failures_left.set(left - 1);
                return Err(SignerError::Transient);
            }
            Ok(format!("-----BEGIN PGP SIGNED MESSAGE-----\n\n{text}"))
        }
    }

    struct AlwaysPermanent;

    impl Signer for AlwaysPermanent {
        fn sign_cleartext(&self, _text: &str) -> Result<String, SignerError> {
            Err(SignerError::Permanent)
        }
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foo.changes");
        fs::write(&path, "Source: foo").unwrap();

        let signer = FlakySigner {
            failures_left: Cell::new(2),
        };
        sign(&path, &signer).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("-----BEGIN PGP SIGNED MESSAGE-----"));
    }

    #[test]
    fn permanent_failure_does_not_retry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foo.changes");
        fs::write(&path, "Source: foo").unwrap();

        let err = sign(&path, &AlwaysPermanent).unwrap_err();
        assert!(matches!(err, CodecError::SignerFailed(_)));
    }

    #[test]
    fn appends_trailing_newline_before_signing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foo.changes");
        fs::write(&path, "Source: foo").unwrap();

        let signer = FlakySigner {
            failures_left: Cell::new(0),
        };
        sign(&path, &signer).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("Source: foo\n"));
    }
}
