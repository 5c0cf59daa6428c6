use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::info;

use crate::error::KeyringError;

/// A gpg homedir holding the imported keys for one logical keyring
/// (uploaders or remotes). Shelling out to `gpg`, the same idiom the
/// `debian` crate uses for `sbuild`.
#[derive(Debug, Clone)]
pub struct GpgHome {
    dir: PathBuf,
}

impl GpgHome {
    pub fn new(dir: PathBuf) -> Self {
        GpgHome { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Imports `armored_key` into this homedir. Idempotent: re-importing an
    /// already-known key is a no-op as far as the caller is concerned.
    pub fn import(&self, armored_key: &str) -> Result<(), KeyringError> {
        std::fs::create_dir_all(&self.dir)?;
        let mut child = Command::new("gpg")
            .arg("--homedir")
            .arg(&self.dir)
            .arg("--batch")
            .arg("--import")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(armored_key.as_bytes())?;
        }
        let status = child.wait()?;
        if !status.success() {
            return Err(KeyringError::NonZeroExit(status.code().unwrap_or(-1)));
        }
        Ok(())
    }

    /// Verifies a cleartext-signed message, returning the plaintext payload
    /// and the fingerprint of the key that signed it.
    pub fn verify(&self, armored: &str) -> Result<(String, String), KeyringError> {
        let mut child = Command::new("gpg")
            .arg("--homedir")
            .arg(&self.dir)
            .arg("--batch")
            .arg("--status-fd")
            .arg("2")
            .arg("--decrypt")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(armored.as_bytes())?;
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(KeyringError::NonZeroExit(output.status.code().unwrap_or(-1)));
        }

        let plaintext = String::from_utf8_lossy(&output.stdout).into_owned();
        let status = String::from_utf8_lossy(&output.stderr);
        let fingerprint = status
            .lines()
            .find_map(|line| line.strip_prefix("[GNUPG:] VALIDSIG "))
            .and_then(|rest| rest.split_whitespace().next())
            .ok_or(KeyringError::NoValidSignature)?
            .to_string();

        Ok((plaintext, fingerprint))
    }

    /// Clearsigns `text` with the key identified by `key_id`.
    pub fn clearsign(&self, key_id: &str, text: &str) -> Result<String, KeyringError> {
        let mut child = Command::new("gpg")
            .arg("--homedir")
            .arg(&self.dir)
            .arg("--batch")
            .arg("--local-user")
            .arg(key_id)
            .arg("--clearsign")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes())?;
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(KeyringError::NonZeroExit(output.status.code().unwrap_or(-1)));
        }
        info!("signed with key {key_id}");
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// A set of fingerprints a verified signature's key must belong to.
pub type TrustedFingerprints = HashSet<String>;
