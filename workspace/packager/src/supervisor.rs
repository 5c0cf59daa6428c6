//! Start/stop/restart guarded by a mutex (§4.8): loads the configuration
//! snapshot, builds keyrings, creates the ingest and build-dispatch queues,
//! spawns the ingest consumer and the builder worker pool, and persists a
//! bounded history of last-N packages/builds across restarts.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use builder::BlockQueue;
use keyring::{CryptoGate, GpgHome};
use types::config::{ConfigFile, ConfigSnapshot};
use types::status::{BuildStatus, PackageStatus};

use crate::error::PackagerError;
use crate::ingest;

/// Subset of a finished `Package`, kept for observability after the package
/// itself is dropped from the in-flight map (mirrors
/// `mini_buildd.packager.LastPackage`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastPackage {
    pub identity: String,
    pub source: String,
    pub version: String,
    pub distribution: String,
    pub status: PackageStatus,
}

/// Subset of a finished build-result (mirrors `mini_buildd.builder.LastBuild`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastBuild {
    pub identity: String,
    pub package: String,
    pub version: String,
    pub architecture: String,
    pub status: BuildStatus,
}

const DEFAULT_HISTORY_SIZE: usize = 50;

/// Fixed-size ring buffer: pushing past capacity drops the oldest entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct History<T> {
    capacity: usize,
    entries: VecDeque<T>,
}

impl<T> History<T> {
    pub fn new(capacity: usize) -> Self {
        History {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    pub fn push(&mut self, entry: T) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn entries(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The two bounded histories persisted as one opaque blob on stop and
/// reloaded on start, so restarts don't lose the observability window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySnapshot {
    pub packages: History<LastPackage>,
    pub builds: History<LastBuild>,
}

impl HistorySnapshot {
    fn new() -> Self {
        HistorySnapshot {
            packages: History::new(DEFAULT_HISTORY_SIZE),
            builds: History::new(DEFAULT_HISTORY_SIZE),
        }
    }

    fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(raw) => toml::from_str(&raw).unwrap_or_else(|e| {
                warn!("discarding unreadable history blob at {}: {e}", path.display());
                Self::new()
            }),
            Err(_) => Self::new(),
        }
    }

    fn store(&self, path: &Path) -> Result<(), PackagerError> {
        let rendered = toml::to_string(self).map_err(|e| PackagerError::NotUploadable(e.to_string()))?;
        fs::write(path, rendered)?;
        Ok(())
    }
}

/// A handle onto the running instance's live history, handed down to the
/// packager so `handle_upload`/`handle_build_result` can append a
/// `LastPackage`/`LastBuild` entry as packages and builds complete, instead
/// of the Supervisor only ever persisting an empty snapshot on stop.
#[derive(Clone)]
pub struct HistoryRecorder {
    snapshot: Arc<Mutex<HistorySnapshot>>,
}

impl HistoryRecorder {
    /// A standalone recorder backed by a fresh, empty snapshot, for callers
    /// that need a `Packager` without going through `Supervisor::start`.
    pub fn new() -> Self {
        HistoryRecorder {
            snapshot: Arc::new(Mutex::new(HistorySnapshot::new())),
        }
    }

    pub fn record_package(&self, entry: LastPackage) {
        self.snapshot.lock().expect("history lock poisoned").packages.push(entry);
    }

    pub fn record_build(&self, entry: LastBuild) {
        self.snapshot.lock().expect("history lock poisoned").builds.push(entry);
    }
}

/// Internal sentinel pushed onto the ingest queue to unwind the consumer
/// thread on stop, instead of an item to process (§4.8, §5 "Suspension
/// points").
enum IngestItem {
    Manifest(PathBuf),
    Shutdown,
}

/// Everything a running instance needs torn down cleanly on stop: the
/// ingest consumer thread and the keyrings' temp gpg homedirs. The builder
/// worker pool is a separate, independently-owned `builder::WorkerPool`
/// (§4.5, §5 role 2) built alongside this supervisor by `cli::run`, not a
/// member here — the coordinator role has no compile-time dependency on the
/// builder crate.
struct Running {
    ingest_thread: JoinHandle<()>,
    ingest_queue: Arc<BlockQueue<IngestItem>>,
    gate: Arc<CryptoGate>,
    gpg_home_dir: PathBuf,
    history: Arc<Mutex<HistorySnapshot>>,
}

/// One-shot start/stop/restart guarded by a mutex (§4.8). Holds no
/// processing logic itself — construction wires the `ingest`/packager/
/// builder pieces built elsewhere in this crate; this type only owns their
/// lifecycle.
pub struct Supervisor {
    spool_dir: PathBuf,
    history_path: PathBuf,
    daemon_key_id: String,
    build_queue_size: usize,
    running: Mutex<Option<Running>>,
}

impl Supervisor {
    pub fn new(spool_dir: PathBuf, history_path: PathBuf, daemon_key_id: String, build_queue_size: usize) -> Self {
        Supervisor {
            spool_dir,
            history_path,
            daemon_key_id,
            build_queue_size,
            running: Mutex::new(None),
        }
    }

    /// Loads the config snapshot, builds the keyrings, creates the ingest
    /// and build-dispatch queues, spawns the ingest consumer and the
    /// builder worker pool. `build_processor` receives the freshly rebuilt
    /// keyring gate, the config snapshot, and a `HistoryRecorder` onto the
    /// live history this run reloaded from disk, and returns the entry point
    /// the ingest consumer calls per manifest (the packager's
    /// `handle_upload`/`handle_build_result` dispatch, keyed by manifest
    /// kind) — this keeps the supervisor free of a direct dependency on
    /// the concrete `Packager` while still sharing the one `CryptoGate`
    /// instance and the one live history between them.
    pub fn start<F, B>(&self, config_path: Option<String>, build_processor: B) -> Result<(), PackagerError>
    where
        F: Fn(&Path) -> Vec<PathBuf> + Send + Sync + 'static,
        B: FnOnce(Arc<CryptoGate>, &ConfigSnapshot, HistoryRecorder) -> F,
    {
        let mut running = self.running.lock().expect("supervisor lock poisoned");
        if running.is_some() {
            warn!("start requested while already running, ignoring");
            return Ok(());
        }

        let snapshot = ConfigFile::load_and_parse(config_path).map_err(|e| PackagerError::NotUploadable(e.to_string()))?;

        let gpg_home_dir = self.spool_dir.join("gnupg");
        let gate = Arc::new(CryptoGate::new(GpgHome::new(gpg_home_dir.clone()), self.daemon_key_id.clone()));
        gate.rebuild(&snapshot);

        let history = Arc::new(Mutex::new(HistorySnapshot::load(&self.history_path)));
        let recorder = HistoryRecorder { snapshot: Arc::clone(&history) };
        let process_manifest = build_processor(Arc::clone(&gate), &snapshot, recorder);

        let queue_size = self.build_queue_size.max(1);
        let ingest_queue: Arc<BlockQueue<IngestItem>> = Arc::new(BlockQueue::new(queue_size + 1));

        for entry in ingest::scan(&self.spool_dir).unwrap_or_else(|e| {
            warn!("initial ingest scan failed: {e}");
            Vec::new()
        }) {
            ingest_queue.put(IngestItem::Manifest(entry.path));
        }

        if let Err(e) = ingest::sweep_cruft(&self.spool_dir) {
            warn!("initial cruft sweep failed: {e}");
        }

        let process_manifest = Arc::new(process_manifest);
        let consumer_queue = Arc::clone(&ingest_queue);
        let consumer_process = Arc::clone(&process_manifest);
        let ingest_thread = thread::spawn(move || loop {
            match consumer_queue.get() {
                IngestItem::Shutdown => {
                    consumer_queue.task_done();
                    break;
                }
                IngestItem::Manifest(path) => {
                    let requeue = consumer_process(&path);
                    consumer_queue.task_done();
                    // A synthesized dispatch-failure build-result (§4.4 step
                    // 5) is pushed back through ingest from a short-lived
                    // helper thread rather than inline, so a momentarily
                    // full ingest queue never blocks this consumer (§5
                    // "Additional short-lived workers").
                    for requeued_path in requeue {
                        let requeue_queue = Arc::clone(&consumer_queue);
                        thread::spawn(move || requeue_queue.put(IngestItem::Manifest(requeued_path)));
                    }
                }
            }
        });

        info!("supervisor started, build_queue_size={queue_size}");
        *running = Some(Running {
            ingest_thread,
            ingest_queue,
            gate,
            gpg_home_dir,
            history,
        });
        Ok(())
    }

    /// Enqueues the shutdown sentinel, joins the ingest consumer thread,
    /// closes the keyrings' gpg homedirs, and persists the bounded
    /// last-package/last-build history.
    pub fn stop(&self) -> Result<(), PackagerError> {
        let mut running = self.running.lock().expect("supervisor lock poisoned");
        let Some(state) = running.take() else {
            warn!("stop requested while not running, ignoring");
            return Ok(());
        };

        state.ingest_queue.put(IngestItem::Shutdown);
        let _ = state.ingest_thread.join();

        if state.gpg_home_dir.exists() {
            let _ = fs::remove_dir_all(&state.gpg_home_dir);
        }

        state.history.lock().expect("history lock poisoned").store(&self.history_path)?;
        info!("supervisor stopped");
        Ok(())
    }

    pub fn restart<F, B>(&self, config_path: Option<String>, build_processor: B) -> Result<(), PackagerError>
    where
        F: Fn(&Path) -> Vec<PathBuf> + Send + Sync + 'static,
        B: FnOnce(Arc<CryptoGate>, &ConfigSnapshot, HistoryRecorder) -> F,
    {
        self.stop()?;
        self.start(config_path, build_processor)
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().expect("supervisor lock poisoned").is_some()
    }

    pub fn load_history(&self) -> HistorySnapshot {
        HistorySnapshot::load(&self.history_path)
    }

    /// The running instance's crypto gate, so a caller can wire a `Packager`
    /// against the same keyrings this supervisor just rebuilt. `None` while
    /// stopped.
    pub fn gate(&self) -> Option<Arc<CryptoGate>> {
        self.running.lock().expect("supervisor lock poisoned").as_ref().map(|r| Arc::clone(&r.gate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use types::config::CONFIG_FILE_NAME;

    fn write_config(dir: &Path) {
        fs::write(
            dir.join(CONFIG_FILE_NAME),
            r#"
            [[repositories]]
            identity = "test"
            allowed_uploader_keys = []
            allow_unauthenticated_uploads = true

            [[suites]]
            name = "unstable"
            uploadable = true
            experimental = false
            build_keyring_package = false
            rollback = 0
            mandatory_version = ""
            "#,
        )
        .unwrap();
    }

    #[test]
    fn start_is_idempotent_while_running() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path());
        let supervisor = Supervisor::new(dir.path().to_path_buf(), dir.path().join("history.toml"), "DAEMON".to_string(), 1);

        supervisor
            .start(Some(dir.path().to_string_lossy().to_string()), |_gate, _snapshot, _history| |_path: &Path| Vec::new())
            .unwrap();
        assert!(supervisor.is_running());
        supervisor
            .start(Some(dir.path().to_string_lossy().to_string()), |_gate, _snapshot, _history| |_path: &Path| Vec::new())
            .unwrap();
        assert!(supervisor.is_running());

        supervisor.stop().unwrap();
        assert!(!supervisor.is_running());
    }

    #[test]
    fn stop_while_not_running_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let supervisor = Supervisor::new(dir.path().to_path_buf(), dir.path().join("history.toml"), "DAEMON".to_string(), 1);
        supervisor.stop().unwrap();
        assert!(!supervisor.is_running());
    }

    #[test]
    fn start_drains_the_existing_spool_through_the_processor() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path());
        fs::write(
            dir.path().join("foo_1.0-1_amd64.changes"),
            "Source: foo\nVersion: 1.0-1\nDistribution: bookworm-test-unstable\nArchitecture: amd64\nFiles:\n",
        )
        .unwrap();

        let supervisor = Supervisor::new(dir.path().to_path_buf(), dir.path().join("history.toml"), "DAEMON".to_string(), 1);
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = Arc::clone(&seen);
        supervisor
            .start(Some(dir.path().to_string_lossy().to_string()), move |_gate, _snapshot, _history| {
                move |_path: &Path| {
                    seen_clone.fetch_add(1, Ordering::SeqCst);
                    Vec::new()
                }
            })
            .unwrap();

        // Give the single ingest consumer thread a moment to drain the one
        // pre-existing spool entry before we tear it down.
        thread::sleep(Duration::from_millis(100));
        supervisor.stop().unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn history_round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.toml");
        let mut snapshot = HistorySnapshot::new();
        snapshot.packages.push(LastPackage {
            identity: "foo_1.0-1".to_string(),
            source: "foo".to_string(),
            version: "1.0-1".to_string(),
            distribution: "bookworm-test-unstable".to_string(),
            status: PackageStatus::Installed,
        });
        snapshot.store(&path).unwrap();

        let supervisor = Supervisor::new(dir.path().to_path_buf(), path, "DAEMON".to_string(), 1);
        let reloaded = supervisor.load_history();
        assert_eq!(reloaded.packages.len(), 1);
    }

    #[test]
    fn history_caps_at_capacity() {
        let mut history: History<u32> = History::new(2);
        history.push(1);
        history.push(2);
        history.push(3);
        assert_eq!(history.entries().copied().collect::<Vec<_>>(), vec![2, 3]);
    }
}
