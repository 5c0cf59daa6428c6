pub mod classify;
pub mod error;
pub mod files;
pub mod rfc822;
pub mod sign;
pub mod spool;
pub mod tarball;
pub mod upload;
pub mod verify;

pub use classify::classify;
pub use error::CodecError;
pub use files::verify_files_present;
pub use rfc822::{parse, write};
pub use sign::{sign, Signer};
pub use spool::gen_spool_dir;
pub use tarball::{tar, untar};
pub use upload::upload;
pub use verify::{verify, Verifier};
