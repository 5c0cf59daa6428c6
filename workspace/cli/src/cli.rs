use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use env_logger::Env;
use log::{info, warn};

use archive::ArchiveAdapter;
use builder::{BuildJob, WorkerPool};
use keyring::{CryptoGate, DaemonKey, GpgHome};
use packager::{ArchiveOps, HistoryRecorder, LogNotifier, NoChrootMaterial, Packager, PkgLog, RemoteDispatcher, Supervisor};
use types::config::ConfigSnapshot;
use types::manifest::{field, ManifestKind};

use crate::args::{ActionType, BuildfarmdArgs, RunCommand, StatusCommand};
use crate::error::CliError;

/// How often the builder-worker's upload-retry sweep wakes up to retry
/// build-results stuck in UPLOADING (§4.5 point 6).
const UPLOAD_RETRY_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

pub fn run_cli() -> Result<(), CliError> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = BuildfarmdArgs::parse();
    match args.action {
        ActionType::Run(command) => run(command),
        ActionType::Status(command) => status(command),
    }
}

/// Builds the `Packager` that the ingest consumer dispatches every manifest
/// through, sharing the `CryptoGate` the supervisor just rebuilt (§4.8, §9
/// "Cyclic cross-component references": the supervisor owns the keyring and
/// hands it down rather than the packager reaching for a global).
fn build_packager(
    gate: Arc<CryptoGate>,
    snapshot: &ConfigSnapshot,
    command: &RunCommand,
    spool_base: PathBuf,
    history: HistoryRecorder,
) -> Packager {
    let mut archives: HashMap<String, Box<dyn ArchiveOps>> = HashMap::new();
    for repo in &snapshot.repositories {
        let basedir = spool_base.join("archives").join(&repo.identity);
        archives.insert(repo.identity.clone(), Box::new(ArchiveAdapter::new(basedir)));
    }

    let signer = Arc::new(DaemonKey::new(
        GpgHome::new(spool_base.join("gnupg")),
        command.daemon_key_id.clone(),
    ));

    let dispatcher = Box::new(RemoteDispatcher {
        remotes: snapshot.remotes.clone(),
        own_http_endpoint: String::new(),
        own_ftp_endpoint: String::new(),
        own_fingerprint: command.daemon_key_id.clone(),
    });

    Packager::new(
        snapshot.clone(),
        gate,
        signer,
        archives,
        dispatcher,
        Box::new(LogNotifier),
        Box::new(NoChrootMaterial),
        PkgLog::new(snapshot.log_dir.clone().unwrap_or_else(|| spool_base.join("log"))),
        spool_base,
        String::new(),
        "apt".to_string(),
        history,
    )
}

/// `mini-buildd-{codename}-{arch}` (§4.5 point 3): the codename comes from
/// the request's `Base-Distribution` field, falling back to the manifest's
/// own `Distribution` if that field is somehow absent.
fn chroot_name(request: &types::manifest::Manifest) -> String {
    let codename = request.field(field::BASE_DISTRIBUTION).unwrap_or(&request.distribution);
    format!("mini-buildd-{codename}-{}", request.architecture)
}

fn run(command: RunCommand) -> Result<(), CliError> {
    let spool_dir = PathBuf::from(&command.spool_dir);
    let history_path = command
        .history_file
        .clone()
        .map(PathBuf::from)
        .unwrap_or_else(|| spool_dir.join("history.toml"));

    let supervisor = Supervisor::new(spool_dir.clone(), history_path, command.daemon_key_id.clone(), command.build_queue_size);

    let config_path = command.config.clone();
    let build_spool = spool_dir.clone();
    supervisor.start(config_path, move |gate, snapshot, history| {
        // The builder-worker role (§4.5 "Worker (builder side)") runs
        // alongside the coordinator role in this same process: a bounded
        // pool drains build-requests landing at our own ingest, executes
        // them in a chroot, and FTPs the signed result back to whoever
        // asked (§5 role 2, a single process may play both roles).
        let verifier = gate.remotes_keyring(snapshot);
        let signer_for_builds = Arc::new(DaemonKey::new(GpgHome::new(build_spool.join("gnupg")), command.daemon_key_id.clone()));
        let worker_pool = Arc::new(WorkerPool::start(
            command.build_queue_size,
            verifier,
            signer_for_builds,
            build_spool.clone(),
            "apt".to_string(),
            UPLOAD_RETRY_SWEEP_INTERVAL,
            command.daemon_key_id.clone(),
        ));

        let packager = Arc::new(build_packager(gate, snapshot, &command, build_spool, history));
        move |path: &std::path::Path| {
            let filename = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            match codec::classify(&filename) {
                ManifestKind::Upload => match packager.handle_upload(path) {
                    Ok(requeue) => requeue,
                    Err(e) => {
                        warn!("failed to process upload {}: {e}", path.display());
                        Vec::new()
                    }
                },
                ManifestKind::BuildResult => {
                    if let Err(e) = packager.handle_build_result(path) {
                        warn!("failed to process build-result {}: {e}", path.display());
                    }
                    Vec::new()
                }
                ManifestKind::BuildRequest => {
                    // Fields are read unverified here purely for routing
                    // (which chroot, which sidecar tar); `BuildExecutor`
                    // re-verifies the signature before anything in the
                    // request is trusted for the build itself (§4.5 point 1,
                    // the same "peek before verify" idiom as the packager's
                    // distribution routing).
                    match codec::parse(path) {
                        Ok(request) => {
                            let tar_path = path.with_extension("tar");
                            worker_pool.submit(BuildJob {
                                request_path: path.to_path_buf(),
                                tar_path,
                                chroot_name: chroot_name(&request),
                            });
                        }
                        Err(e) => warn!("malformed build-request {}: {e}", path.display()),
                    }
                    Vec::new()
                }
            }
        }
    })?;

    info!("buildfarmd running, spool={}", spool_dir.display());
    loop {
        thread::sleep(Duration::from_secs(3600));
    }
}

fn status(command: StatusCommand) -> Result<(), CliError> {
    let supervisor = Supervisor::new(PathBuf::new(), PathBuf::from(&command.history_file), String::new(), 1);
    let history = supervisor.load_history();

    println!("last {} packages:", history.packages.len());
    for package in history.packages.entries() {
        println!("  {} {} {:?}", package.identity, package.distribution, package.status);
    }
    println!("last {} builds:", history.builds.len());
    for build in history.builds.entries() {
        println!("  {} {} {:?}", build.identity, build.architecture, build.status);
    }
    Ok(())
}
