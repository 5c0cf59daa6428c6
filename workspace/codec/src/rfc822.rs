use std::fs;
use std::path::Path;

use sha1::{Digest, Sha1};
use types::manifest::{FileEntry, Manifest, ManifestKind};
use types::version::Version;

use crate::classify::classify;
use crate::error::CodecError;

const MANDATORY_FIELDS: &[&str] = &["Source", "Version", "Distribution", "Architecture", "Files"];

/// Reads an RFC822-style multi-paragraph `.changes`-family file into a
/// `Manifest`. The file's kind is derived from its own filename (§4.1).
///
/// Records the file's SHA1 digest as the manifest's spool-id on success.
pub fn parse(path: &Path) -> Result<Manifest, CodecError> {
    let raw = fs::read_to_string(path)?;
    let fields = parse_paragraph(&raw)?;

    for name in MANDATORY_FIELDS {
        if !fields.iter().any(|(k, _)| k == name) {
            return Err(CodecError::MalformedManifest(format!(
                "missing mandatory field {name}"
            )));
        }
    }

    let get = |name: &str| -> Option<&str> {
        fields.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    };

    let source = get("Source").unwrap().to_string();
    let version = Version::try_from(get("Version").unwrap())
        .map_err(|e| CodecError::InvalidVersion(format!("{e:?}")))?;
    let distribution = get("Distribution").unwrap().to_string();
    let architecture = get("Architecture").unwrap().to_string();

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let kind = classify(filename);

    let mut manifest = Manifest::new(kind, source, version, distribution, architecture);
    manifest.files = parse_files(get("Files").unwrap());
    manifest.changes = get("Changes").unwrap_or("").to_string();

    for (name, value) in &fields {
        if MANDATORY_FIELDS.contains(&name.as_str()) || name == "Changes" {
            continue;
        }
        manifest.set_field(name.clone(), value.clone());
    }

    let mut hasher = Sha1::new();
    hasher.update(raw.as_bytes());
    manifest.spool_id = Some(format!("{:x}", hasher.finalize()));

    Ok(manifest)
}

/// Writes the manifest's control fields back out as an RFC822 paragraph,
/// mandatory fields first in a stable order, followed by the extra fields in
/// their own stable (sorted) order.
pub fn write(manifest: &Manifest, path: &Path) -> Result<(), CodecError> {
    let mut out = String::new();
    out.push_str(&format!("Source: {}\n", manifest.source));
    out.push_str(&format!("Version: {}\n", manifest.version));
    out.push_str(&format!("Distribution: {}\n", manifest.distribution));
    out.push_str(&format!("Architecture: {}\n", manifest.architecture));

    out.push_str("Files:\n");
    for file in &manifest.files {
        out.push_str(&format!(" {} {} {}\n", file.md5, file.size, file.name));
    }

    if !manifest.changes.is_empty() {
        write_folded_field(&mut out, "Changes", &manifest.changes);
    }

    for (name, value) in manifest.fields() {
        out.push_str(&format!("{name}: {value}\n"));
    }

    fs::write(path, out)?;
    Ok(())
}

/// Writes a field whose value may itself contain newlines (the changelog
/// block in `Changes:`), folding every line after the first as an
/// RFC822 continuation line (leading space), matching how `parse_paragraph`
/// unfolds them back into a single `\n`-joined value.
fn write_folded_field(out: &mut String, name: &str, value: &str) {
    let mut lines = value.split('\n');
    out.push_str(&format!("{name}: {}\n", lines.next().unwrap_or_default()));
    for line in lines {
        out.push_str(&format!(" {line}\n"));
    }
}

/// Parses a single RFC822 paragraph (the only kind a `.changes` file has)
/// into an ordered list of `(field, value)` pairs, folding continuation
/// lines (leading whitespace) into the previous field's value.
fn parse_paragraph(raw: &str) -> Result<Vec<(String, String)>, CodecError> {
    let mut fields: Vec<(String, String)> = Vec::new();

    for line in raw.lines() {
        if line.starts_with("-----BEGIN") || line.starts_with("-----END") {
            continue;
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some((_, value)) = fields.last_mut() {
                value.push('\n');
                value.push_str(line.trim_start());
            }
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        let (name, value) = line.split_once(':').ok_or_else(|| {
            CodecError::MalformedManifest(format!("unparsable line: {line}"))
        })?;
        fields.push((name.trim().to_string(), value.trim().to_string()));
    }

    Ok(fields)
}

/// Parses a `Files:` field body, one entry per line: `md5 size name`.
fn parse_files(body: &str) -> Vec<FileEntry> {
    body.lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let md5 = parts.next()?.to_string();
            let size: u64 = parts.next()?.parse().ok()?;
            let name = parts.next()?.to_string();
            Some(FileEntry { name, md5, size })
        })
        .collect()
}
