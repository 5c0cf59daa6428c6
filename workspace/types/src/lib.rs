pub mod config;
pub mod distribution;
pub mod manifest;
pub mod status;
pub mod upload_options;
pub mod version;

pub use config::{ConfigSnapshot, RepositoryConfig, RemoteBuilderConfig, RemoteStatus, Suite};
pub use distribution::{Distribution, DistributionError};
pub use manifest::{FileEntry, Manifest, ManifestKind};
pub use status::{BuildStatus, PackageStatus};
pub use upload_options::{UploadOptions, UploadOptionsError};
pub use version::Version;
