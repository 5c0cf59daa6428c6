use serde::{Deserialize, Serialize};

/// Status of an in-flight `Package` (per upload), owned by the Packager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackageStatus {
    Checking,
    Building,
    Installing,
    Installed,
    Rejected,
    Failed,
}

/// Status of an in-flight `Build` (per build-request), owned by the Builder
/// Pool on the builder side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildStatus {
    Checking,
    Building,
    Uploading,
    Uploaded,
    Failed,
}
