use std::fs::{self, File};
use std::path::{Path, PathBuf};

use log::info;
use suppaftp::FtpStream;

use types::manifest::Manifest;

use crate::error::CodecError;

const INCOMING_DIR: &str = "/incoming";

/// Pushes the manifest and every file it lists to `/incoming` on
/// `ftp_endpoint` via anonymous FTP login. On success, writes a sentinel
/// file (`{manifest}.upload`) recording the destination next to the
/// manifest; if that sentinel already exists the upload is skipped, making
/// repeated calls for the same manifest idempotent (§4.1).
pub fn upload(manifest: &Manifest, manifest_path: &Path, ftp_endpoint: &str) -> Result<(), CodecError> {
    let sentinel = sentinel_path(manifest_path);
    if sentinel.exists() {
        info!("upload of {} already recorded, skipping", manifest_path.display());
        return Ok(());
    }

    let source_dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));

    let mut ftp = FtpStream::connect(ftp_endpoint).map_err(|e| CodecError::Ftp(e.to_string()))?;
    ftp.login("anonymous", "anonymous")
        .map_err(|e| CodecError::Ftp(e.to_string()))?;
    ftp.cwd(INCOMING_DIR).map_err(|e| CodecError::Ftp(e.to_string()))?;

    let manifest_name = manifest_path.file_name().and_then(|n| n.to_str());
    put_file(&mut ftp, manifest_path, manifest_name)?;
    for entry in &manifest.files {
        let path = source_dir.join(&entry.name);
        put_file(&mut ftp, &path, Some(entry.name.as_str()))?;
    }

    ftp.quit().map_err(|e| CodecError::Ftp(e.to_string()))?;

    fs::write(&sentinel, ftp_endpoint)?;
    Ok(())
}

fn put_file(ftp: &mut FtpStream, path: &Path, name: Option<&str>) -> Result<(), CodecError> {
    let name = name.ok_or_else(|| CodecError::MalformedManifest("file has no usable name".into()))?;
    let mut file = File::open(path)?;
    ftp.put_file(name, &mut file)
        .map_err(|e| CodecError::Ftp(e.to_string()))?;
    Ok(())
}

fn sentinel_path(manifest_path: &Path) -> PathBuf {
    let mut name = manifest_path.file_name().unwrap_or_default().to_os_string();
    name.push(".upload");
    manifest_path.with_file_name(name)
}
