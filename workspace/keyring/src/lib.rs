pub mod daemon_key;
pub mod error;
pub mod gate;
pub mod gpg;
pub mod keyring;

pub use daemon_key::DaemonKey;
pub use error::KeyringError;
pub use gate::CryptoGate;
pub use gpg::GpgHome;
pub use keyring::Keyring;
