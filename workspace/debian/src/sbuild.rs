use super::execute::{execute_command_capturing, ExecuteError};
use log::info;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A builder for the chroot-backed build command a builder worker invokes for
/// one build-request (§4.5 point 3). Configuration follows the fields a
/// build-request manifest carries; once configured the command is run via
/// `execute`, which returns the captured combined log for status parsing.
///
/// # Example
///
/// ```
/// use debian::sbuild::SbuildBuilder;
///
/// let result = SbuildBuilder::new()
///     .chroot("mini-buildd-bookworm-amd64")
///     .dist("bookworm")
///     .arch("amd64")
///     .dep_resolver("apt")
///     .execute();
/// ```
#[derive(Default, Debug, Clone)]
pub struct SbuildBuilder {
    chroot: Option<String>,
    dist: Option<String>,
    arch: Option<String>,
    dep_resolver: Option<String>,
    chroot_setup_commands: Vec<String>,
    run_lintian: Option<bool>,
    apt_allow_unauthenticated: bool,
    arch_all: bool,
    home: Option<PathBuf>,
    dir: Option<PathBuf>,
}

#[derive(Error, Debug)]
pub enum SbuildCmdError {
    #[error("failed to execute sbuild: {0}")]
    CommandExecutionError(#[from] ExecuteError),
}

type Result<T> = std::result::Result<T, SbuildCmdError>;

impl SbuildBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The chroot name, `mini-buildd-{codename}-{arch}`.
    pub fn chroot(mut self, name: &str) -> Self {
        self.chroot = Some(name.to_string());
        self
    }

    /// The target distribution's codename, for `-d`.
    pub fn dist(mut self, codename: &str) -> Self {
        self.dist = Some(codename.to_string());
        self
    }

    pub fn arch(mut self, arch: &str) -> Self {
        self.arch = Some(arch.to_string());
        self
    }

    /// Build-dependency resolver, for `--build-dep-resolver`.
    pub fn dep_resolver(mut self, resolver: &str) -> Self {
        self.dep_resolver = Some(resolver.to_string());
        self
    }

    /// A chroot-setup command staging apt sources/preferences/keys into the
    /// chroot before the build starts; may be called multiple times.
    pub fn chroot_setup_command(mut self, command: &str) -> Self {
        self.chroot_setup_commands.push(command.to_string());
        self
    }

    pub fn run_lintian(mut self, enabled: bool) -> Self {
        self.run_lintian = Some(enabled);
        self
    }

    pub fn apt_allow_unauthenticated(mut self, allow: bool) -> Self {
        self.apt_allow_unauthenticated = allow;
        self
    }

    pub fn arch_all(mut self, build_all: bool) -> Self {
        self.arch_all = build_all;
        self
    }

    /// `HOME` for the child process; the builder worker points this at the
    /// request's spool directory.
    pub fn home(mut self, home: &Path) -> Self {
        self.home = Some(home.to_path_buf());
        self
    }

    /// Working directory for the sbuild invocation (also the spool directory).
    pub fn working_dir(mut self, dir: &Path) -> Self {
        self.dir = Some(dir.to_path_buf());
        self
    }

    fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(dist) = &self.dist {
            args.push("-d".to_string());
            args.push(dist.clone());
        }

        if let Some(chroot) = &self.chroot {
            args.push("-c".to_string());
            args.push(chroot.clone());
        }

        if self.arch_all {
            args.push("-A".to_string());
        }

        if let Some(arch) = &self.arch {
            args.push("--arch".to_string());
            args.push(arch.clone());
        }

        if let Some(resolver) = &self.dep_resolver {
            args.push(format!("--build-dep-resolver={resolver}"));
        }

        if self.apt_allow_unauthenticated {
            args.push("--apt-allow-unauthenticated".to_string());
        }

        for command in &self.chroot_setup_commands {
            args.push(format!("--chroot-setup-commands={command}"));
        }

        match self.run_lintian {
            Some(true) => args.push("--run-lintian".to_string()),
            Some(false) => args.push("--no-run-lintian".to_string()),
            None => {}
        }

        args
    }

    /// Runs the configured sbuild command. Returns the captured combined
    /// stdout (the build log, for `^(Status|Lintian): [^ ]+$` parsing) and
    /// the process exit code; never fails on a nonzero exit, only on
    /// inability to spawn the process at all.
    pub fn execute(&self) -> Result<(String, i32)> {
        let args = self.build_args();
        info!("Running: sbuild {}", args.join(" "));
        let home = self.home.as_deref().and_then(Path::to_str).unwrap_or("");
        let envs: &[(&str, &str)] = if home.is_empty() { &[] } else { &[("HOME", home)] };
        Ok(execute_command_capturing("sbuild", &args, self.dir.as_deref(), envs)?)
    }
}
