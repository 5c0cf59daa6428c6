use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("failed to run reprepro: {0}")]
    CommandFailed(String),

    #[error("reprepro exited with status {0}: {1}")]
    NonZeroExit(i32, String),

    #[error("unparsable reprepro output: {0}")]
    Unparsable(String),
}
