use std::collections::HashMap;
use std::sync::OnceLock;

use log::warn;
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadOptionsError {
    #[error("duplicate upload option key: {0}")]
    DuplicateKey(String),

    #[error("unknown upload option key: {0}")]
    UnknownKey(String),

    #[error("invalid value for upload option {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// A value that may be set globally or per-architecture via `key[arch]=value`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerArch<T> {
    global: Option<T>,
    per_arch: HashMap<String, T>,
}

impl<T: Clone> PerArch<T> {
    fn set_global(&mut self, value: T) {
        self.global = Some(value);
    }

    fn set_arch(&mut self, arch: &str, value: T) {
        self.per_arch.insert(arch.to_string(), value);
    }

    pub fn get(&self, arch: &str) -> Option<T> {
        self.per_arch
            .get(arch)
            .cloned()
            .or_else(|| self.global.clone())
    }

    pub fn get_or(&self, arch: &str, default: T) -> T {
        self.get(arch).unwrap_or(default)
    }
}

/// Options extracted from the `* MINI_BUILDD_OPTION: key[=value]` bullets in
/// the top changelog block of a manifest's `Changes` text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadOptions {
    pub ignore_lintian: PerArch<bool>,
    pub run_lintian: PerArch<bool>,
    pub internal_apt_priority: PerArch<i64>,
    pub auto_ports: Vec<String>,
}

fn bullet_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*\*\s*MINI_BUILDD_OPTION:\s*([a-zA-Z0-9_-]+)(?:\[(\w+)\])?(?:=(.*))?\s*$")
            .expect("static upload-option regex is valid")
    })
}

fn magic_auto_backports_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*AUTO_BACKPORTS:\s*(.+)\s*$").expect("static magic regex is valid")
    })
}

fn magic_backport_mode_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*BACKPORT_MODE\s*$").expect("static magic regex is valid"))
}

impl UploadOptions {
    /// Parses the bullets out of a changelog's `Changes:` text. Returns an
    /// error on a duplicate or unrecognized key; legacy magic comments are
    /// accepted unconditionally (with a deprecation warning) since they
    /// predate the typed key/value bullets.
    pub fn parse(changes_text: &str) -> Result<Self, UploadOptionsError> {
        let mut seen = Vec::new();
        let mut options = UploadOptions::default();

        for caps in bullet_regex().captures_iter(changes_text) {
            let key = caps[1].to_string();
            let arch = caps.get(2).map(|m| m.as_str().to_string());
            let value = caps.get(3).map(|m| m.as_str().to_string());

            let dedup_key = match &arch {
                Some(a) => format!("{key}[{a}]"),
                None => key.clone(),
            };
            if seen.contains(&dedup_key) {
                return Err(UploadOptionsError::DuplicateKey(dedup_key));
            }
            seen.push(dedup_key);

            options.apply(&key, arch.as_deref(), value.as_deref())?;
        }

        if let Some(caps) = magic_auto_backports_regex().captures(changes_text) {
            warn!("upload uses deprecated AUTO_BACKPORTS magic comment; use MINI_BUILDD_OPTION: auto-ports instead");
            let targets = caps[1].split(',').map(|s| s.trim().to_string());
            options.auto_ports.extend(targets);
        }

        if magic_backport_mode_regex().is_match(changes_text) {
            warn!("upload uses deprecated BACKPORT_MODE magic comment; use MINI_BUILDD_OPTION: ignore-lintian instead");
            options.ignore_lintian.set_global(true);
        }

        Ok(options)
    }

    fn apply(&mut self, key: &str, arch: Option<&str>, value: Option<&str>) -> Result<(), UploadOptionsError> {
        match key {
            "ignore-lintian" => {
                let v = parse_bool(key, value)?;
                match arch {
                    Some(a) => self.ignore_lintian.set_arch(a, v),
                    None => self.ignore_lintian.set_global(v),
                }
            }
            "run-lintian" => {
                let v = parse_bool(key, value)?;
                match arch {
                    Some(a) => self.run_lintian.set_arch(a, v),
                    None => self.run_lintian.set_global(v),
                }
            }
            "internal-apt-priority" => {
                let v = value
                    .ok_or_else(|| UploadOptionsError::InvalidValue {
                        key: key.to_string(),
                        value: String::new(),
                    })?
                    .parse::<i64>()
                    .map_err(|_| UploadOptionsError::InvalidValue {
                        key: key.to_string(),
                        value: value.unwrap_or_default().to_string(),
                    })?;
                match arch {
                    Some(a) => self.internal_apt_priority.set_arch(a, v),
                    None => self.internal_apt_priority.set_global(v),
                }
            }
            "auto-ports" => {
                let csv = value.unwrap_or_default();
                self.auto_ports
                    .extend(csv.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()));
            }
            _ => return Err(UploadOptionsError::UnknownKey(key.to_string())),
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: Option<&str>) -> Result<bool, UploadOptionsError> {
    match value {
        None => Ok(true),
        Some(v) => match v.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(UploadOptionsError::InvalidValue {
                key: key.to_string(),
                value: v.to_string(),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_two_bullets() {
        let text = "\
  * MINI_BUILDD_OPTION: ignore-lintian=true
  * MINI_BUILDD_OPTION: auto-ports=a,b
";
        let options = UploadOptions::parse(text).unwrap();
        assert_eq!(options.ignore_lintian.get("amd64"), Some(true));
        assert_eq!(options.auto_ports, vec!["a", "b"]);
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let text = "\
  * MINI_BUILDD_OPTION: ignore-lintian=true
  * MINI_BUILDD_OPTION: ignore-lintian=false
";
        assert!(matches!(
            UploadOptions::parse(text),
            Err(UploadOptionsError::DuplicateKey(_))
        ));
    }

    #[test]
    fn unknown_key_is_rejected() {
        let text = "  * MINI_BUILDD_OPTION: not-a-real-option=1\n";
        assert!(matches!(
            UploadOptions::parse(text),
            Err(UploadOptionsError::UnknownKey(_))
        ));
    }

    #[test]
    fn per_arch_override_wins_over_global() {
        let text = "\
  * MINI_BUILDD_OPTION: ignore-lintian=false
  * MINI_BUILDD_OPTION: ignore-lintian[i386]=true
";
        let options = UploadOptions::parse(text).unwrap();
        assert_eq!(options.ignore_lintian.get("amd64"), Some(false));
        assert_eq!(options.ignore_lintian.get("i386"), Some(true));
    }

    #[test]
    fn legacy_magic_comments_map_to_new_options() {
        let text = "AUTO_BACKPORTS: squeeze-test-stable\nBACKPORT_MODE\n";
        let options = UploadOptions::parse(text).unwrap();
        assert_eq!(options.auto_ports, vec!["squeeze-test-stable"]);
        assert_eq!(options.ignore_lintian.get("amd64"), Some(true));
    }
}
