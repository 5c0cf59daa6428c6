use deb::version::Version as DebVersion;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::ops::Deref;

/// A Debian package version, e.g. `7:1.2-3`.
///
/// Wraps `deb::version::Version` (proper epoch/upstream/revision comparison,
/// not semver) while keeping the original on-wire string around, since the
/// inner type's `Display` is not guaranteed to reproduce the exact bytes a
/// manifest carried.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    inner: DebVersion,
    original_string: Cow<'static, str>,
}

impl Version {
    pub fn as_str(&self) -> &str {
        &self.original_string
    }

    pub fn inner(&self) -> &DebVersion {
        &self.inner
    }

    /// The version with any `N:` epoch prefix removed, as used in filenames.
    pub fn strip_epoch(&self) -> String {
        match self.original_string.find(':') {
            Some(idx) if self.original_string[..idx].chars().all(|c| c.is_ascii_digit()) => {
                self.original_string[idx + 1..].to_string()
            }
            _ => self.original_string.to_string(),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original_string)
    }
}

impl Serialize for Version {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.original_string)
    }
}

impl Deref for Version {
    type Target = DebVersion;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.inner.cmp(&other.inner)
    }
}

impl<'a> TryFrom<&'a str> for Version {
    type Error = deb::version::Error;

    fn try_from(s: &'a str) -> Result<Self, Self::Error> {
        let inner = s.parse::<DebVersion>()?;
        Ok(Version {
            inner,
            original_string: Cow::Owned(s.to_string()),
        })
    }
}

impl TryFrom<String> for Version {
    type Error = deb::version::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let inner = s.parse::<DebVersion>()?;
        Ok(Version {
            inner,
            original_string: Cow::Owned(s),
        })
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct VersionVisitor;

        impl<'de> de::Visitor<'de> for VersionVisitor {
            type Value = Version;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a Debian version string (e.g. 1.2-3 or 7:1.2-3)")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                let inner = value.parse::<DebVersion>().map_err(de::Error::custom)?;
                Ok(Version {
                    inner,
                    original_string: Cow::Owned(value.to_string()),
                })
            }
        }

        deserializer.deserialize_string(VersionVisitor)
    }
}
