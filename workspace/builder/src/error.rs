use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuilderError {
    #[error("no remote builder accepted the build-request")]
    NoCandidateAccepted,

    #[error("codec error: {0}")]
    Codec(#[from] codec::CodecError),

    #[error("sbuild key bootstrap failed: {0}")]
    KeyBootstrap(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error talking to remote builder: {0}")]
    Http(#[from] reqwest::Error),
}
