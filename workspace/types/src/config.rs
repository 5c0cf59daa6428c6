use serde::{Deserialize, Serialize};
use std::{
    borrow::Cow,
    collections::HashMap,
    env, fs,
    io::{self, ErrorKind},
    path::PathBuf,
};
use thiserror::Error;

use crate::distribution::Distribution;

pub const CONFIG_FILE_NAME: &str = "buildfarmd.toml";

/// Raw configuration file content, read once at Supervisor start.
#[derive(Debug, Clone)]
pub struct ConfigFile(Cow<'static, str>);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Invalid(String),
}

impl ConfigFile {
    pub fn load(config_path: Option<String>) -> Result<Self, ConfigError> {
        let path = Self::resolve_config_path(config_path)?;
        let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
        Ok(ConfigFile(Cow::Owned(content)))
    }

    fn resolve_config_path(config_path: Option<String>) -> Result<PathBuf, ConfigError> {
        let path = match config_path {
            Some(location) => {
                let path = PathBuf::from(location);
                if path.is_dir() {
                    path.join(CONFIG_FILE_NAME)
                } else {
                    path
                }
            }
            None => env::current_dir()
                .map_err(ConfigError::Io)?
                .join(CONFIG_FILE_NAME),
        };

        if !path.exists() {
            return Err(ConfigError::Io(io::Error::new(
                ErrorKind::NotFound,
                format!("Path does not exist: {}", path.display()),
            )));
        }

        Ok(path)
    }

    pub fn parse(self) -> Result<ConfigSnapshot, ConfigError> {
        Ok(toml::from_str::<ConfigSnapshot>(&self.0)?)
    }

    pub fn load_and_parse(config_path: Option<String>) -> Result<ConfigSnapshot, ConfigError> {
        Self::load(config_path)?.parse()
    }
}

/// Lintian strictness for a distribution, from least to most strict.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
#[serde(rename_all = "kebab-case")]
pub enum LintianMode {
    Disabled,
    RunOnly,
    FailOnError,
    FailOnWarning,
}

/// One architecture a distribution can be built for.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone)]
pub struct ArchitectureOption {
    pub arch: String,
    pub build_architecture_all: bool,
}

/// A named flow stage inside a repository (e.g. `unstable`, `stable`).
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone)]
pub struct Suite {
    pub name: String,
    pub uploadable: bool,
    pub experimental: bool,
    pub migrates_to: Option<String>,
    pub build_keyring_package: bool,
    pub rollback: u32,
    /// Template such as `~test{codeversion}+[1-9]`; `{codeversion}` is
    /// substituted with the numeric guess for the suite's codename.
    pub mandatory_version: String,
}

/// Per-distribution configuration inside a repository.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone)]
pub struct DistributionConfig {
    pub codename: String,
    pub architectures: Vec<ArchitectureOption>,
    pub lintian_mode: LintianMode,
}

/// Read-only configuration snapshot the core consumes; the admin web UI and
/// its object-relational store that would produce this live outside the core.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ConfigSnapshot {
    pub repositories: Vec<RepositoryConfig>,
    pub suites: Vec<Suite>,
    pub remotes: Vec<RemoteBuilderConfig>,
    #[serde(default)]
    pub build_queue_size: Option<u32>,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl ConfigSnapshot {
    pub fn repository(&self, identity: &str) -> Option<&RepositoryConfig> {
        self.repositories.iter().find(|r| r.identity == identity)
    }

    pub fn suite(&self, name: &str) -> Option<&Suite> {
        self.suites.iter().find(|s| s.name == name)
    }
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct RepositoryConfig {
    pub identity: String,
    pub allowed_uploader_keys: Vec<String>,
    pub allow_unauthenticated_uploads: bool,
    pub distributions: Vec<DistributionConfig>,
}

impl RepositoryConfig {
    pub fn distribution(&self, codename: &str) -> Option<&DistributionConfig> {
        self.distributions.iter().find(|d| d.codename == codename)
    }
}

/// A reachable peer builder: HTTP endpoint for status/keys, FTP endpoint for
/// build-request transfer, and its public key fingerprint.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct RemoteBuilderConfig {
    pub http_endpoint: String,
    pub ftp_endpoint: String,
    pub public_key_fingerprint: String,
}

/// Live status of a remote builder, fetched from its HTTP status endpoint.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Default)]
pub struct RemoteStatus {
    pub running: bool,
    pub load: f64,
    pub chroots: HashMap<String, Vec<String>>,
    pub remotes: Vec<String>,
}

impl RemoteStatus {
    pub fn has_chroot(&self, codename: &str, arch: &str) -> bool {
        self.chroots
            .get(codename)
            .is_some_and(|arches| arches.iter().any(|a| a == arch))
    }

    pub fn knows(&self, endpoint: &str) -> bool {
        self.remotes.iter().any(|r| r == endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn sample_toml() -> &'static str {
        r#"
        build_queue_size = 4

        [[repositories]]
        identity = "test"
        allowed_uploader_keys = ["ABCDEF"]
        allow_unauthenticated_uploads = false

        [[repositories.distributions]]
        codename = "buster"
        lintian_mode = "fail-on-error"

        [[repositories.distributions.architectures]]
        arch = "amd64"
        build_architecture_all = true

        [[suites]]
        name = "unstable"
        uploadable = true
        experimental = false
        build_keyring_package = false
        rollback = 0
        mandatory_version = "~test{codeversion}+[1-9]"

        [[remotes]]
        http_endpoint = "http://builder1:8066/"
        ftp_endpoint = "ftp://builder1:8067/"
        public_key_fingerprint = "AAAA"
        "#
    }

    #[test]
    fn loads_from_directory() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "{}", sample_toml()).unwrap();

        let config_file =
            ConfigFile::load(Some(dir.path().to_string_lossy().to_string())).unwrap();
        assert!(config_file.0.contains("buster"));
    }

    #[test]
    fn parses_into_snapshot() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "{}", sample_toml()).unwrap();

        let snapshot =
            ConfigFile::load_and_parse(Some(dir.path().to_string_lossy().to_string())).unwrap();
        assert_eq!(snapshot.repositories.len(), 1);
        let repo = snapshot.repository("test").unwrap();
        assert!(!repo.allow_unauthenticated_uploads);
        assert_eq!(repo.distribution("buster").unwrap().architectures[0].arch, "amd64");
        assert_eq!(snapshot.suite("unstable").unwrap().mandatory_version, "~test{codeversion}+[1-9]");
    }
}
