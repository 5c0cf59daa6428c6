//! Builder-side worker pool (§4.5 "Worker (builder side)", §5 role 2): a
//! bounded queue of build-request jobs landed via this node's own ingest,
//! drained by a fixed pool of threads that each run one build through
//! [`BuildExecutor`] and push the signed result back to the requesting
//! coordinator. A build-result whose FTP push fails is retried by a
//! periodic sweep rather than by re-running the build (§4.5 point 6, §9
//! "Open question: build retries" preserves this asymmetry explicitly).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{info, warn};

use codec::sign::Signer;
use codec::verify::Verifier;
use types::manifest::{field, Manifest};

use crate::block_queue::BlockQueue;
use crate::buildlog;
use crate::worker::{retry_pending_uploads, BuildExecutor};

/// One build-request landed in the builder's own ingest, queued for a pool
/// worker to pick up. `chroot_name` is precomputed by the caller as
/// `mini-buildd-{codename}-{arch}` (§4.5 point 3).
pub struct BuildJob {
    pub request_path: PathBuf,
    pub tar_path: PathBuf,
    pub chroot_name: String,
}

/// A queued build job, or a shutdown sentinel. `get()` blocks indefinitely
/// on an empty queue, so stopping the pool requires waking every worker
/// with its own sentinel rather than relying on a flag alone (§5
/// "Suspension points... must be interruptible by the shutdown sentinel").
enum QueueItem {
    Job(BuildJob),
    Shutdown,
}

/// A signed build-result that failed its initial FTP push, held for the
/// sweep thread to retry.
struct PendingUpload {
    manifest: Manifest,
    path: PathBuf,
    endpoint: String,
}

/// Groups pending uploads by destination endpoint so each group can be
/// retried with a single `retry_pending_uploads` call (it takes one
/// endpoint for the whole batch); split out as a pure function so the
/// grouping logic is testable without spawning real FTP traffic.
fn group_by_endpoint(pending: Vec<PendingUpload>) -> HashMap<String, Vec<(Manifest, PathBuf)>> {
    let mut grouped: HashMap<String, Vec<(Manifest, PathBuf)>> = HashMap::new();
    for item in pending {
        grouped.entry(item.endpoint).or_default().push((item.manifest, item.path));
    }
    grouped
}

/// Owns the bounded build-request queue, the pool of worker threads
/// draining it, and the periodic upload-retry sweep. One process instance
/// plays the builder-worker role by running one of these alongside its
/// coordinator role (§4.5: "a single process can play both").
pub struct WorkerPool {
    queue: Arc<BlockQueue<QueueItem>>,
    threads: Vec<JoinHandle<()>>,
    sweep_thread: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Spawns `size` worker threads draining a queue of capacity `size`,
    /// plus one sweep thread retrying failed uploads every
    /// `sweep_interval`. `verifier`/`signer` back the remotes keyring check
    /// and the daemon's own signature on the way out (§4.5 points 1 and 5).
    #[allow(clippy::too_many_arguments)]
    pub fn start<V, S>(
        size: usize,
        verifier: Arc<V>,
        signer: Arc<S>,
        spool_base: PathBuf,
        dep_resolver: String,
        sweep_interval: Duration,
        built_by: String,
    ) -> Self
    where
        V: Verifier + Send + Sync + 'static,
        S: Signer + Send + Sync + 'static,
    {
        let capacity = size.max(1);
        let queue: Arc<BlockQueue<QueueItem>> = Arc::new(BlockQueue::new(capacity));
        let pending: Arc<Mutex<Vec<PendingUpload>>> = Arc::new(Mutex::new(Vec::new()));
        let stop = Arc::new(AtomicBool::new(false));

        let mut threads = Vec::with_capacity(capacity);
        for id in 0..capacity {
            let queue = Arc::clone(&queue);
            let verifier = Arc::clone(&verifier);
            let signer = Arc::clone(&signer);
            let spool_base = spool_base.clone();
            let dep_resolver = dep_resolver.clone();
            let built_by = built_by.clone();
            let pending = Arc::clone(&pending);
            let stop_check = Arc::clone(&stop);
            threads.push(thread::spawn(move || loop {
                let job = match queue.get() {
                    QueueItem::Shutdown => {
                        queue.task_done();
                        break;
                    }
                    QueueItem::Job(job) => job,
                };
                if stop_check.load(Ordering::SeqCst) {
                    warn!("worker {id}: dropping queued build of {} on shutdown", job.request_path.display());
                    queue.task_done();
                    break;
                }
                let executor = BuildExecutor {
                    verifier: verifier.as_ref(),
                    signer: signer.as_ref(),
                    spool_base: spool_base.clone(),
                    chroot_name: job.chroot_name.clone(),
                    dep_resolver: dep_resolver.clone(),
                    built_by: built_by.clone(),
                };
                match executor.run(&job.request_path, &job.tar_path) {
                    Ok((result, result_path, _spool_dir)) => {
                        match result.field(field::UPLOAD_RESULT_TO).map(str::to_string) {
                            Some(endpoint) => {
                                if let Err(e) = codec::upload(&result, &result_path, &endpoint) {
                                    warn!(
                                        "worker {id}: initial upload of {} to {endpoint} failed, queued for retry: {e}",
                                        result_path.display()
                                    );
                                    pending.lock().expect("pending uploads lock poisoned").push(PendingUpload {
                                        manifest: result,
                                        path: result_path,
                                        endpoint,
                                    });
                                }
                            }
                            None => warn!(
                                "worker {id}: build-result for {} has no Upload-Result-To, dropping",
                                result_path.display()
                            ),
                        }
                    }
                    Err(e) => warn!("worker {id}: build of {} failed: {e}", job.request_path.display()),
                }
                queue.task_done();
            }));
        }

        let sweep_stop = Arc::clone(&stop);
        let sweep_pending = Arc::clone(&pending);
        let live_buildlog_dir = spool_base.join("live-buildlogs");
        let sweep_thread = thread::spawn(move || {
            while !sweep_stop.load(Ordering::SeqCst) {
                thread::sleep(sweep_interval);

                if let Err(e) = buildlog::sweep_expired(&live_buildlog_dir) {
                    warn!("live buildlog sweep failed: {e}");
                }

                let batch = std::mem::take(&mut *sweep_pending.lock().expect("pending uploads lock poisoned"));
                if batch.is_empty() {
                    continue;
                }
                for (endpoint, items) in group_by_endpoint(batch) {
                    for (manifest, path, outcome) in retry_pending_uploads(&items, &endpoint) {
                        match outcome {
                            Ok(()) => info!("retry upload of {} to {endpoint} succeeded", path.display()),
                            Err(_) => sweep_pending.lock().expect("pending uploads lock poisoned").push(PendingUpload {
                                manifest,
                                path,
                                endpoint: endpoint.clone(),
                            }),
                        }
                    }
                }
            }
        });

        WorkerPool {
            queue,
            threads,
            sweep_thread: Some(sweep_thread),
            stop,
        }
    }

    /// Submits a build-request job, spawning a short-lived helper thread to
    /// perform the (possibly blocking) enqueue so the caller — typically
    /// the ingest consumer — never stalls on a full queue (§5).
    pub fn submit(&self, job: BuildJob) {
        let queue = Arc::clone(&self.queue);
        thread::spawn(move || queue.put(QueueItem::Job(job)));
    }

    /// `(active + pending) / capacity`, this node's load as a builder,
    /// reported on the HTTP status endpoint (§6).
    pub fn load(&self) -> f64 {
        self.queue.load()
    }

    /// Signals worker and sweep threads to stop and joins them. `get()`
    /// blocks indefinitely on an empty queue, so one shutdown sentinel per
    /// worker thread is pushed to guarantee every thread wakes and exits
    /// even if the queue is otherwise empty; any build still queued behind
    /// them is dropped rather than run (does not drain in-flight builds).
    pub fn stop(self) {
        self.stop.store(true, Ordering::SeqCst);
        for _ in 0..self.threads.len() {
            self.queue.put(QueueItem::Shutdown);
        }
        for thread in self.threads {
            let _ = thread.join();
        }
        if let Some(sweep) = self.sweep_thread {
            let _ = sweep.join();
        }
    }
}
