use thiserror::Error;

#[derive(Error, Debug)]
pub enum KeyringError {
    #[error("failed to run gpg: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("gpg exited with status {0}")]
    NonZeroExit(i32),

    #[error("signature from an untrusted key: {0}")]
    UntrustedKey(String),

    #[error("no valid signature found in gpg output")]
    NoValidSignature,
}
