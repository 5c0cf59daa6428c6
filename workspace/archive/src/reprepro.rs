use std::path::Path;

use debian::execute::execute_command_capturing;

use crate::error::ArchiveError;

const LIST_FORMAT: &str = "${package}|${$type}|${architecture}|${version}|${$source}|${$sourceversion}|${$codename}|${$component};";

/// One entry returned by `list` (§4.6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub package: String,
    pub kind: String,
    pub architecture: String,
    pub version: String,
    pub source: String,
    pub source_version: String,
    pub distribution: String,
    pub component: String,
}

/// One entry returned by `show` (§4.6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShowEntry {
    pub source: String,
    pub source_version: String,
    pub distribution: String,
}

/// Runs `reprepro` against `basedir` with the common flags the original
/// always passes (`--waitforlock 10`, ignoring the `unusedarch` check to
/// tolerate arch=all binaries built as arch=any, per
/// `original_source/src/mini_buildd/reprepro.py`).
pub fn call(basedir: &Path, args: &[String]) -> Result<String, ArchiveError> {
    let mut full_args = vec![
        "--verbose".to_string(),
        "--waitforlock".to_string(),
        "10".to_string(),
        "--ignore".to_string(),
        "unusedarch".to_string(),
        "--basedir".to_string(),
        basedir.display().to_string(),
    ];
    full_args.extend(args.iter().cloned());

    let (output, code) = execute_command_capturing("reprepro", &full_args, None, &[])
        .map_err(|e| ArchiveError::CommandFailed(e.to_string()))?;
    if code != 0 {
        return Err(ArchiveError::NonZeroExit(code, output));
    }
    Ok(output)
}

pub fn install(basedir: &Path, distribution: &str, changes: &str) -> Result<(), ArchiveError> {
    call(
        basedir,
        &["include".to_string(), distribution.to_string(), changes.to_string()],
    )?;
    Ok(())
}

pub fn migrate(
    basedir: &Path,
    package: &str,
    src: &str,
    dst: &str,
    version: Option<&str>,
) -> Result<(), ArchiveError> {
    let mut args = vec!["copysrc".to_string(), dst.to_string(), src.to_string(), package.to_string()];
    if let Some(v) = version {
        args.push(v.to_string());
    }
    call(basedir, &args)?;
    Ok(())
}

pub fn remove(
    basedir: &Path,
    package: &str,
    distribution: &str,
    version: Option<&str>,
) -> Result<(), ArchiveError> {
    let mut args = vec!["removesrc".to_string(), distribution.to_string(), package.to_string()];
    if let Some(v) = version {
        args.push(v.to_string());
    }
    call(basedir, &args)?;
    Ok(())
}

pub fn list(
    basedir: &Path,
    pattern: &str,
    distribution: &str,
    kind: Option<&str>,
    max: u32,
) -> Result<Vec<ListEntry>, ArchiveError> {
    let mut args = vec![
        "--list-format".to_string(),
        LIST_FORMAT.to_string(),
        "--list-max".to_string(),
        max.to_string(),
    ];
    if let Some(t) = kind {
        args.push("--type".to_string());
        args.push(t.to_string());
    }
    args.push("listmatched".to_string());
    args.push(distribution.to_string());
    args.push(pattern.to_string());

    let output = call(basedir, &args)?;
    parse_list(&output)
}

pub fn show(basedir: &Path, package: &str) -> Result<Vec<ShowEntry>, ArchiveError> {
    let output = call(
        basedir,
        &["--type".to_string(), "dsc".to_string(), "ls".to_string(), package.to_string()],
    )?;
    parse_show(&output)
}

pub fn reindex(basedir: &Path) -> Result<(), ArchiveError> {
    call(basedir, &["--delete".to_string(), "clearvanished".to_string()])?;
    let dists = basedir.join("dists");
    if dists.exists() {
        std::fs::remove_dir_all(&dists).map_err(|e| ArchiveError::CommandFailed(e.to_string()))?;
    }
    call(basedir, &["export".to_string()])?;
    Ok(())
}

fn parse_list(output: &str) -> Result<Vec<ListEntry>, ArchiveError> {
    output
        .split(';')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            let parts: Vec<&str> = item.split('|').collect();
            if parts.len() != 8 {
                return Err(ArchiveError::Unparsable(item.to_string()));
            }
            Ok(ListEntry {
                package: parts[0].to_string(),
                kind: parts[1].to_string(),
                architecture: parts[2].to_string(),
                version: parts[3].to_string(),
                source: parts[4].to_string(),
                source_version: parts[5].to_string(),
                distribution: parts[6].to_string(),
                component: parts[7].to_string(),
            })
        })
        .collect()
}

fn parse_show(output: &str) -> Result<Vec<ShowEntry>, ArchiveError> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let parts: Vec<&str> = line.split('|').map(str::trim).collect();
            if parts.len() != 3 {
                return Err(ArchiveError::Unparsable(line.to_string()));
            }
            Ok(ShowEntry {
                source: parts[0].to_string(),
                source_version: parts[1].to_string(),
                distribution: parts[2].to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_list_output() {
        let output = "foo|deb|amd64|1.0-1|foo|1.0-1|bookworm-test-unstable|main;";
        let entries = parse_list(output).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].package, "foo");
        assert_eq!(entries[0].architecture, "amd64");
    }

    #[test]
    fn parses_show_output() {
        let output = "foo | 1.0-1 |    bookworm-test-unstable\n";
        let entries = parse_show(output).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].source, "foo");
        assert_eq!(entries[0].distribution, "bookworm-test-unstable");
    }

    #[test]
    fn empty_list_output_is_empty_vec() {
        assert!(parse_list("").unwrap().is_empty());
    }
}
