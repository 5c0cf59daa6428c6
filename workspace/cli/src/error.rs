use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("packager error: {0}")]
    Packager(#[from] packager::PackagerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
