use thiserror::Error;

#[derive(Error, Debug)]
pub enum PackagerError {
    #[error("codec error: {0}")]
    Codec(#[from] codec::CodecError),

    #[error("invalid distribution: {0}")]
    InvalidDistribution(#[from] types::DistributionError),

    #[error("upload options error: {0}")]
    UploadOptions(#[from] types::UploadOptionsError),

    #[error("distribution '{0}' is not uploadable")]
    NotUploadable(String),

    #[error("archive precheck failed for {0}: {1}")]
    ArchivePrecheckFailed(String, String),

    #[error("archive install failed: {0}")]
    ArchiveInstallFailed(#[from] archive::ArchiveError),

    #[error("unknown repository: {0}")]
    UnknownRepository(String),

    #[error("unknown suite: {0}")]
    UnknownSuite(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
