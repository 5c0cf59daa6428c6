use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::de;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DistributionError {
    #[error("'{0}': malformed distribution id (expected codename-repoid-suite[-rollbackN])")]
    Malformed(String),
}

fn regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<codename>\w+)-(?P<repository>\w+)-(?P<suite>\w+?)(-rollback(?P<rollback_no>\d+))?$")
            .expect("static distribution regex is valid")
    })
}

/// A distribution identifier of the form `codename-repoid-suite[-rollbackN]`.
///
/// e.g. `squeeze-test-stable` or `squeeze-test-stable-rollback5`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Distribution {
    codename: String,
    repository: String,
    suite: String,
    rollback_no: Option<u32>,
    id: String,
}

impl Distribution {
    pub fn parse(id: &str) -> Result<Self, DistributionError> {
        let captures = regex()
            .captures(id)
            .ok_or_else(|| DistributionError::Malformed(id.to_string()))?;

        let rollback_no = captures
            .name("rollback_no")
            .map(|m| m.as_str().parse::<u32>().expect("\\d+ always parses"));

        Ok(Distribution {
            codename: captures["codename"].to_string(),
            repository: captures["repository"].to_string(),
            suite: captures["suite"].to_string(),
            rollback_no,
            id: id.to_string(),
        })
    }

    pub fn codename(&self) -> &str {
        &self.codename
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn suite(&self) -> &str {
        &self.suite
    }

    pub fn is_rollback(&self) -> bool {
        self.rollback_no.is_some()
    }

    pub fn rollback_no(&self) -> Option<u32> {
        self.rollback_no
    }

    /// The chroot name a builder uses for this distribution's codename and
    /// a given architecture: `mini-buildd-{codename}-{arch}`.
    pub fn chroot_name(&self, arch: &str) -> String {
        format!("mini-buildd-{}-{}", self.codename, arch)
    }

    /// Builds the identifier for the same repository/suite but a different
    /// codename, as used by an internal port.
    pub fn with_codename(&self, codename: &str) -> Self {
        let id = match self.rollback_no {
            Some(n) => format!("{}-{}-{}-rollback{}", codename, self.repository, self.suite, n),
            None => format!("{}-{}-{}", codename, self.repository, self.suite),
        };
        Distribution::parse(&id).expect("reconstructed id matches the grammar")
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl Serialize for Distribution {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.id)
    }
}

impl<'de> Deserialize<'de> for Distribution {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let id = String::deserialize(deserializer)?;
        Distribution::parse(&id).map_err(|e| de::Error::custom(format!("{}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_distribution() {
        let d = Distribution::parse("squeeze-test-stable").unwrap();
        assert_eq!(d.codename(), "squeeze");
        assert_eq!(d.repository(), "test");
        assert_eq!(d.suite(), "stable");
        assert!(!d.is_rollback());
    }

    #[test]
    fn parses_rollback_distribution() {
        let d = Distribution::parse("squeeze-test-stable-rollback5").unwrap();
        assert_eq!(d.rollback_no(), Some(5));
        assert!(d.is_rollback());
    }

    #[test]
    fn unparse_round_trips() {
        for s in ["squeeze-test-stable", "squeeze-test-stable-rollback5"] {
            let d = Distribution::parse(s).unwrap();
            assert_eq!(d.to_string(), s);
        }
    }

    #[test]
    fn rejects_malformed_ids() {
        for bad in ["squeeze-test", "squeeze--stable", "not a distribution"] {
            assert!(matches!(
                Distribution::parse(bad),
                Err(DistributionError::Malformed(_))
            ));
        }
    }
}
