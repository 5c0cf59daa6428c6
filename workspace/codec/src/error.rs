use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed manifest: {0}")]
    MalformedManifest(String),

    #[error("invalid version in manifest: {0}")]
    InvalidVersion(String),

    #[error("signature rejected: {0}")]
    SignatureRejected(String),

    #[error("signer failed after retrying: {0}")]
    SignerFailed(String),

    #[error("FTP error: {0}")]
    Ftp(String),
}
