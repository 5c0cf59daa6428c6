use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[clap(author, version, about)]
pub struct BuildfarmdArgs {
    #[clap(subcommand)]
    pub action: ActionType,
}

#[derive(Debug, Subcommand)]
pub enum ActionType {
    /// Load the configuration snapshot, wire up queues, keyrings, and the
    /// worker pool, and block until the process is killed (§4.8 Supervisor).
    Run(RunCommand),
    /// Print the bounded last-package/last-build history persisted by the
    /// previous run.
    Status(StatusCommand),
}

#[derive(Debug, Args)]
pub struct RunCommand {
    /// Location of buildfarmd.toml, either a full path or a directory to
    /// search; if not given the current directory is searched.
    #[clap(long)]
    pub config: Option<String>,

    /// Spool directory the ingest queue watches and the worker pool writes
    /// into.
    #[clap(long)]
    pub spool_dir: String,

    /// Path to the opaque last-package/last-build history blob.
    #[clap(long)]
    pub history_file: Option<String>,

    /// Fingerprint of the daemon's own signing key, trusted in every
    /// keyring (§4.2).
    #[clap(long)]
    pub daemon_key_id: String,

    /// Size of the build-request worker pool (§5 "Builder dispatch
    /// consumers").
    #[clap(long, default_value_t = 4)]
    pub build_queue_size: usize,
}

#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Path to the opaque last-package/last-build history blob.
    #[clap(long)]
    pub history_file: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_requires_spool_dir_and_daemon_key_id() {
        let err = BuildfarmdArgs::try_parse_from(["buildfarmd", "run"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn run_parses_with_defaults() {
        let args = BuildfarmdArgs::try_parse_from([
            "buildfarmd",
            "run",
            "--spool-dir",
            "/var/spool/buildfarmd",
            "--daemon-key-id",
            "ABCDEF",
        ])
        .unwrap();
        match args.action {
            ActionType::Run(command) => {
                assert_eq!(command.spool_dir, "/var/spool/buildfarmd");
                assert_eq!(command.build_queue_size, 4);
                assert!(command.config.is_none());
            }
            ActionType::Status(_) => panic!("expected Run"),
        }
    }

    #[test]
    fn status_requires_history_file() {
        let args = BuildfarmdArgs::try_parse_from(["buildfarmd", "status", "--history-file", "h.toml"]).unwrap();
        match args.action {
            ActionType::Status(command) => assert_eq!(command.history_file, "h.toml"),
            ActionType::Run(_) => panic!("expected Status"),
        }
    }
}
