use std::sync::OnceLock;

use log::info;

use crate::error::BuilderError;

static BOOTSTRAPPED: OnceLock<()> = OnceLock::new();

/// Ensures the one-time sbuild signing-key generation has happened before
/// the first build on this process. Guarded by a process-wide lock so
/// concurrent workers never race to initialize it twice, mirroring
/// `mini_buildd.call.sbuild_keys_workaround()` (§4.5).
pub fn ensure_bootstrapped<F>(generate: F) -> Result<(), BuilderError>
where
    F: FnOnce() -> Result<(), BuilderError>,
{
    if BOOTSTRAPPED.get().is_some() {
        return Ok(());
    }
    generate()?;
    let _ = BOOTSTRAPPED.set(());
    info!("sbuild signing key bootstrap complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn generate_runs_at_most_once_per_process() {
        static CALLS: AtomicU32 = AtomicU32::new(0);
        for _ in 0..3 {
            ensure_bootstrapped(|| {
                CALLS.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
        }
        assert!(CALLS.load(Ordering::SeqCst) <= 1);
    }
}
