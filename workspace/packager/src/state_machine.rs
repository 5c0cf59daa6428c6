//! The per-upload state machine (§4.4): parses and authorizes an upload,
//! fans out build-requests, collects build-results, installs to the
//! archive, drives auto-ports, and notifies.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use codec::sign::Signer;
use keyring::CryptoGate;
use log::{info, warn};
use types::config::{ConfigSnapshot, LintianMode};
use types::distribution::Distribution;
use types::manifest::{field, FileEntry, Manifest, ManifestKind};
use types::upload_options::UploadOptions;

use crate::archive_ops::ArchiveOps;
use crate::dispatch_ops::DispatchOps;
use crate::error::PackagerError;
use crate::fanout;
use crate::notify::{render_summary, Notifier};
use crate::package::{build_result_accepted, Package};
use crate::pkglog::PkgLog;
use crate::supervisor::{HistoryRecorder, LastBuild, LastPackage};
use crate::versioning;

/// Supplies the chroot-setup material (apt sources, apt preferences, apt
/// keys, SSL cert, chroot-setup script, sbuild config snippet) bundled into
/// a build-request's sidecar tar. Provisioning the content of these files
/// is the administrative config store's job (out of scope, §1); this seam
/// only asks for the paths to bundle.
pub trait ChrootMaterialProvider: Send + Sync {
    fn files_for(&self, repository: &str, codename: &str) -> Vec<PathBuf>;
}

/// Bundles nothing; suitable when a distribution needs no extra chroot
/// material beyond the source package itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoChrootMaterial;

impl ChrootMaterialProvider for NoChrootMaterial {
    fn files_for(&self, _repository: &str, _codename: &str) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// Scans the plaintext lines of a (possibly cleartext-signed) changes file
/// for `name:`, stopping at the PGP signature block so a routing field can
/// be read before the signature has been verified — the same "peek before
/// verify" idiom `dak`/`mini-buildd`'s processors use to decide which
/// keyring applies.
fn peek_field(raw: &str, name: &str) -> Option<String> {
    let prefix = format!("{name}:");
    for line in raw.lines() {
        if line.starts_with("-----BEGIN PGP SIGNATURE-----") {
            break;
        }
        if let Some(rest) = line.strip_prefix(&prefix) {
            return Some(rest.trim().to_string());
        }
    }
    None
}

fn synthesize_dispatch_failure(request: &Manifest) -> Manifest {
    let mut result = Manifest::new(
        ManifestKind::BuildResult,
        request.source.clone(),
        request.version.clone(),
        request.distribution.clone(),
        request.architecture.clone(),
    );
    result.set_field(field::SBUILDRETVAL, "100");
    result.set_field(field::SBUILD_STATUS, "upload-failed");
    result
}

/// Orchestrates one repository/suite's worth of uploads end to end. Holds
/// the seams (archive, dispatch, notifier, chroot material) as trait
/// objects so construction wires in the concrete collaborators while tests
/// wire in fakes (§9 Design Notes).
pub struct Packager {
    pub snapshot: ConfigSnapshot,
    pub gate: Arc<CryptoGate>,
    pub signer: Arc<dyn Signer + Send + Sync>,
    pub archives: HashMap<String, Box<dyn ArchiveOps>>,
    pub dispatcher: Box<dyn DispatchOps>,
    pub notifier: Box<dyn Notifier>,
    pub material: Box<dyn ChrootMaterialProvider>,
    pub pkglog: PkgLog,
    pub spool_base: PathBuf,
    pub own_http_endpoint: String,
    pub dep_resolver: String,
    pub history: HistoryRecorder,
    packages: Mutex<HashMap<String, Package>>,
}

impl Packager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        snapshot: ConfigSnapshot,
        gate: Arc<CryptoGate>,
        signer: Arc<dyn Signer + Send + Sync>,
        archives: HashMap<String, Box<dyn ArchiveOps>>,
        dispatcher: Box<dyn DispatchOps>,
        notifier: Box<dyn Notifier>,
        material: Box<dyn ChrootMaterialProvider>,
        pkglog: PkgLog,
        spool_base: PathBuf,
        own_http_endpoint: String,
        dep_resolver: String,
        history: HistoryRecorder,
    ) -> Self {
        Packager {
            snapshot,
            gate,
            signer,
            archives,
            dispatcher,
            notifier,
            material,
            pkglog,
            spool_base,
            own_http_endpoint,
            dep_resolver,
            history,
            packages: Mutex::new(HashMap::new()),
        }
    }

    /// Steps 1-5: parse, authorize, precheck, fan out, dispatch. Returns
    /// the paths of any synthesized dispatch-failure build-results the
    /// caller must push back through ingest (§4.4 step 5).
    pub fn handle_upload(&self, manifest_path: &Path) -> Result<Vec<PathBuf>, PackagerError> {
        let raw = fs::read_to_string(manifest_path)?;
        let distribution_id = peek_field(&raw, "Distribution")
            .ok_or_else(|| PackagerError::NotUploadable("upload has no Distribution field".to_string()))?;
        let distribution = Distribution::parse(&distribution_id)?;

        if distribution.is_rollback() {
            return Err(PackagerError::NotUploadable(format!(
                "{distribution_id}: rollback distributions are not uploadable"
            )));
        }

        let repo = self
            .snapshot
            .repository(distribution.repository())
            .ok_or_else(|| PackagerError::UnknownRepository(distribution.repository().to_string()))?
            .clone();
        let suite = self
            .snapshot
            .suite(distribution.suite())
            .ok_or_else(|| PackagerError::UnknownSuite(distribution.suite().to_string()))?
            .clone();
        if !suite.uploadable {
            return Err(PackagerError::NotUploadable(format!("{distribution_id}: suite is not uploadable")));
        }

        let working_path = if repo.allow_unauthenticated_uploads {
            manifest_path.to_path_buf()
        } else {
            let verified = self.gate.verify_upload(&self.snapshot, manifest_path, &repo.identity)?;
            let verified_path = manifest_path.with_extension("verified.changes");
            fs::write(&verified_path, verified)?;
            verified_path
        };
        let upload = codec::parse(&working_path)?;
        let spool_dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));
        codec::verify_files_present(&upload, spool_dir)?;

        let dist_config = repo
            .distribution(distribution.codename())
            .ok_or_else(|| PackagerError::UnknownSuite(format!("{}/{}", repo.identity, distribution.codename())))?
            .clone();

        let archive = self
            .archives
            .get(&repo.identity)
            .ok_or_else(|| PackagerError::UnknownRepository(repo.identity.clone()))?;
        if archive.find(&upload.source, &distribution_id, upload.version.as_str())? {
            return Err(PackagerError::ArchivePrecheckFailed(
                upload.source.clone(),
                "this exact version is already installed in this distribution".to_string(),
            ));
        }

        let upload_options = UploadOptions::parse(&upload.changes)?;
        let requests: Vec<String> = dist_config.architectures.iter().map(|a| a.arch.clone()).collect();

        let mut package = Package::new(
            upload.source.clone(),
            upload.version.to_string(),
            repo.identity.clone(),
            distribution_id.clone(),
            suite.name.clone(),
            requests,
            upload_options.clone(),
            working_path.clone(),
        );

        let mut synthesized = Vec::new();
        let material_files = self.material.files_for(&repo.identity, distribution.codename());

        for arch_option in &dist_config.architectures {
            let run_lintian = dist_config.lintian_mode != LintianMode::Disabled
                && upload_options.run_lintian.get_or(&arch_option.arch, true);

            let mut request = fanout::build_request(
                &upload,
                arch_option,
                &self.own_http_endpoint,
                distribution.codename(),
                &self.dep_resolver,
                repo.allow_unauthenticated_uploads,
                run_lintian,
                "",
            );

            let request_path = self.spool_base.join(request.to_string());
            let tar_path = request_path.with_extension("tar");
            fanout::build_request_tar(&request, &working_path, &tar_path, &material_files)?;

            // The sidecar tar travels over the same FTP push as the manifest
            // itself, so it must be listed in `Files:` like any other
            // referenced artifact (§4.1 `upload`); its checksum is not
            // re-verified on receipt, only the manifest's own signature is.
            let tar_size = fs::metadata(&tar_path)?.len();
            request.files.push(FileEntry {
                name: tar_path.file_name().unwrap().to_string_lossy().into_owned(),
                md5: "0".repeat(32),
                size: tar_size,
            });

            codec::write(&request, &request_path)?;
            codec::sign(&request_path, self.signer.as_ref())?;

            match self.dispatcher.dispatch(&mut request, &request_path, distribution.codename(), &arch_option.arch) {
                Ok(remote) => {
                    info!("dispatched {} to {remote}", request.source_version_arch());
                }
                Err(e) => {
                    warn!("dispatch failed for {}: {e}", request.source_version_arch());
                    let failure = synthesize_dispatch_failure(&request);
                    let failure_path = self.spool_base.join(failure.to_string());
                    codec::write(&failure, &failure_path)?;
                    codec::sign(&failure_path, self.signer.as_ref())?;
                    synthesized.push(failure_path);
                }
            }
        }

        self.packages.lock().expect("packages lock poisoned").insert(package_key(&package), {
            package.status = types::status::PackageStatus::Building;
            package
        });

        Ok(synthesized)
    }

    /// Steps 6-9: collect one build-result, and if the package is now
    /// complete, decide, install, auto-port, and notify.
    pub fn handle_build_result(&self, manifest_path: &Path) -> Result<(), PackagerError> {
        let plaintext = match self.gate.verify_remote(&self.snapshot, manifest_path) {
            Ok(p) => p,
            Err(_) => {
                warn!("dropping build-result with invalid signature: {}", manifest_path.display());
                return Ok(());
            }
        };
        let verified_path = manifest_path.with_extension("verified.changes");
        fs::write(&verified_path, plaintext)?;
        let result = codec::parse(&verified_path)?;

        let key = result.source_version();
        let mut packages = self.packages.lock().expect("packages lock poisoned");
        let Some(package) = packages.get_mut(&key) else {
            warn!("build-result for untracked package {key}, dropping");
            return Ok(());
        };

        let repo = self
            .snapshot
            .repository(&package.repository)
            .ok_or_else(|| PackagerError::UnknownRepository(package.repository.clone()))?;
        let suite = self
            .snapshot
            .suite(&package.suite)
            .ok_or_else(|| PackagerError::UnknownSuite(package.suite.clone()))?;
        let distribution = Distribution::parse(&package.distribution)?;
        let dist_config = repo
            .distribution(distribution.codename())
            .ok_or_else(|| PackagerError::UnknownSuite(format!("{}/{}", repo.identity, distribution.codename())))?;

        if package.is_complete() {
            warn!("dropping build-result for already-decided package {key}");
            return Ok(());
        }

        let ignore_lintian = package.upload_options.ignore_lintian.get_or(&result.architecture, false);
        let accepted = build_result_accepted(&result, suite, dist_config.lintian_mode, ignore_lintian);
        let build_identity = result.source_version_arch();
        let build_architecture = result.architecture.clone();
        if !package.record_result(result.architecture.clone(), result, verified_path, accepted) {
            return Ok(());
        }
        self.history.record_build(LastBuild {
            identity: build_identity,
            package: package.source.clone(),
            version: package.version.clone(),
            architecture: build_architecture,
            status: if accepted {
                types::status::BuildStatus::Uploaded
            } else {
                types::status::BuildStatus::Failed
            },
        });

        if !package.is_complete() {
            return Ok(());
        }

        let installed = package.installed();
        package.status = if installed {
            types::status::PackageStatus::Installed
        } else {
            types::status::PackageStatus::Failed
        };
        self.history.record_package(LastPackage {
            identity: package.source_version(),
            source: package.source.clone(),
            version: package.version.clone(),
            distribution: package.distribution.clone(),
            status: package.status,
        });

        if installed {
            let archive = self
                .archives
                .get(&repo.identity)
                .ok_or_else(|| PackagerError::UnknownRepository(repo.identity.clone()))?;
            archive.install(&package.upload_changes_path, &package.distribution)?;
            self.pkglog.remove_failed_tree(&package.repository, &package.source, &package.version)?;
        }

        self.store_log_tree(package, !installed)?;

        if installed {
            for target in package.upload_options.auto_ports.clone() {
                let outcome = self.auto_port(package, &target, &distribution, repo);
                package.port_report.push((target, outcome));
            }
        }

        let (subject, body) = render_summary(
            &package.source,
            &package.version,
            &package.distribution,
            installed,
            &package.success.keys().cloned().collect::<Vec<_>>(),
            &package.failed.keys().cloned().collect::<Vec<_>>(),
            &package.changes_dump(),
            &package.port_report,
        );
        self.notifier.notify(&subject, &body);

        Ok(())
    }

    fn store_log_tree(&self, package: &Package, failed: bool) -> Result<(), PackagerError> {
        for (manifest, path) in package.success.values().chain(package.failed.values()) {
            let buildlog = path.with_extension("buildlog");
            self.pkglog.store_arch_result(
                &package.repository,
                &package.source,
                &package.version,
                &manifest.architecture,
                failed,
                &buildlog,
                path,
            )?;
        }
        if package.upload_changes_path.exists() {
            self.pkglog
                .store_upload(&package.repository, &package.source, &package.version, failed, &package.upload_changes_path)?;
        }
        Ok(())
    }

    /// Internal port (§4.7, §4.4 step 8): reuses the just-installed upload
    /// as the source and ports it into `target` via the internal-port
    /// version transform, then installs the ported changes.
    fn auto_port(
        &self,
        package: &Package,
        target: &str,
        from_distribution: &Distribution,
        repo: &types::config::RepositoryConfig,
    ) -> Result<(), String> {
        let target_distribution = Distribution::parse(target).map_err(|e| e.to_string())?;
        let from_suite = self
            .snapshot
            .suite(from_distribution.suite())
            .ok_or_else(|| format!("unknown source suite {}", from_distribution.suite()))?;
        let to_suite = self
            .snapshot
            .suite(target_distribution.suite())
            .ok_or_else(|| format!("unknown target suite {}", target_distribution.suite()))?;

        let from_codeversion = versioning::guess_codeversion(from_distribution.codename());
        let to_codeversion = versioning::guess_codeversion(target_distribution.codename());
        let from_regex = versioning::render_mandatory_version_regex(&from_suite.mandatory_version, &from_codeversion);
        let to_default = versioning::default_version_for_template(&to_suite.mandatory_version, &to_codeversion);

        let ported_version = versioning::gen_internal_port(&package.version, &from_regex, &to_default);

        let archive = self
            .archives
            .get(&repo.identity)
            .ok_or_else(|| format!("unknown repository {}", repo.identity))?;
        if archive
            .find(&package.source, target, &ported_version)
            .map_err(|e| e.to_string())?
        {
            return Err(format!("{ported_version} already present in {target}"));
        }
        archive
            .migrate(&package.source, &package.distribution, target, Some(&package.version))
            .map_err(|e| e.to_string())
    }
}

fn package_key(package: &Package) -> String {
    package.source_version()
}
