//! Trait seam over the archive adapter (§9 Design Notes: explicit
//! interfaces at construction) so the state machine's precheck/install/port
//! logic can be unit tested without a real reprepro repository on disk.

use std::path::Path;

use archive::{ArchiveAdapter, ArchiveError};

pub trait ArchiveOps: Send + Sync {
    fn find(&self, package: &str, distribution: &str, version: &str) -> Result<bool, ArchiveError>;
    fn install(&self, changes: &Path, distribution: &str) -> Result<(), ArchiveError>;
    fn migrate(
        &self,
        package: &str,
        src: &str,
        dst: &str,
        version: Option<&str>,
    ) -> Result<(), ArchiveError>;
}

impl ArchiveOps for ArchiveAdapter {
    fn find(&self, package: &str, distribution: &str, version: &str) -> Result<bool, ArchiveError> {
        ArchiveAdapter::find(self, package, distribution, version)
    }

    fn install(&self, changes: &Path, distribution: &str) -> Result<(), ArchiveError> {
        ArchiveAdapter::install(self, changes, distribution)
    }

    fn migrate(
        &self,
        package: &str,
        src: &str,
        dst: &str,
        version: Option<&str>,
    ) -> Result<(), ArchiveError> {
        ArchiveAdapter::migrate(self, package, src, dst, version)
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Records install calls and answers `find` from a fixed membership set,
    /// standing in for a reprepro repository in state-machine tests.
    #[derive(Default)]
    pub struct FakeArchive {
        pub present: Mutex<HashSet<(String, String, String)>>,
        pub installed: Mutex<Vec<(String, String)>>,
        pub fail_install: bool,
    }

    impl ArchiveOps for FakeArchive {
        fn find(&self, package: &str, distribution: &str, version: &str) -> Result<bool, ArchiveError> {
            Ok(self
                .present
                .lock()
                .unwrap()
                .contains(&(package.to_string(), distribution.to_string(), version.to_string())))
        }

        fn install(&self, changes: &Path, distribution: &str) -> Result<(), ArchiveError> {
            if self.fail_install {
                return Err(ArchiveError::NonZeroExit(1, "fake install failure".to_string()));
            }
            self.installed
                .lock()
                .unwrap()
                .push((changes.display().to_string(), distribution.to_string()));
            Ok(())
        }

        fn migrate(
            &self,
            _package: &str,
            _src: &str,
            _dst: &str,
            _version: Option<&str>,
        ) -> Result<(), ArchiveError> {
            Ok(())
        }
    }
}
