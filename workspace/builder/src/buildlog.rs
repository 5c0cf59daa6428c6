use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use log::{debug, info};

use crate::error::BuilderError;

const LIVE_BUILDLOG_TTL: Duration = Duration::from_secs(5 * 24 * 60 * 60);

/// Hardlinks the in-progress buildlog at `buildlog_path` under `spool_id`'s
/// name inside `public_dir`, so it can be served live while the build runs
/// (§4.5 point 7, `mini_buildd.builder.py: _expire_live_buildlogs`'s
/// counterpart on the publishing side).
pub fn publish_live(buildlog_path: &Path, public_dir: &Path, spool_id: &str) -> Result<PathBuf, BuilderError> {
    fs::create_dir_all(public_dir)?;
    let link_path = public_dir.join(spool_id);
    if link_path.exists() {
        fs::remove_file(&link_path)?;
    }
    fs::hard_link(buildlog_path, &link_path)?;
    debug!("published live buildlog {}", link_path.display());
    Ok(link_path)
}

/// Removes live buildlog hardlinks older than 5 days. Intended to be run
/// periodically by the Supervisor sweep.
pub fn sweep_expired(public_dir: &Path) -> Result<usize, BuilderError> {
    if !public_dir.exists() {
        return Ok(0);
    }
    let now = SystemTime::now();
    let mut expired = 0;
    for entry in fs::read_dir(public_dir)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        let modified = metadata.modified().unwrap_or(now);
        if now.duration_since(modified).unwrap_or_default() > LIVE_BUILDLOG_TTL {
            fs::remove_file(entry.path())?;
            expired += 1;
        }
    }
    if expired > 0 {
        info!("expired {expired} live buildlog(s) older than 5 days");
    }
    Ok(expired)
}
