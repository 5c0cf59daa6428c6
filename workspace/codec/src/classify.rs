use types::manifest::ManifestKind;

/// Classifies a `.changes` filename by its marker infix (§4.1).
pub fn classify(filename: &str) -> ManifestKind {
    if filename.contains("_mini-buildd-buildrequest") {
        ManifestKind::BuildRequest
    } else if filename.contains("_mini-buildd-buildresult") {
        ManifestKind::BuildResult
    } else {
        ManifestKind::Upload
    }
}
