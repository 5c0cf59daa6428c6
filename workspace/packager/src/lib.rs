//! Ingest queue, packager state machine, versioning/distribution transforms,
//! and the supervisor that wires them together (§4.3, §4.4, §4.7, §4.8).

pub mod archive_ops;
pub mod dispatch_ops;
pub mod error;
pub mod fanout;
pub mod ingest;
pub mod notify;
pub mod package;
pub mod pkglog;
pub mod state_machine;
pub mod supervisor;
pub mod versioning;

pub use archive_ops::ArchiveOps;
pub use dispatch_ops::{DispatchOps, RemoteDispatcher};
pub use error::PackagerError;
pub use ingest::{scan, sweep_cruft, IngestEntry};
pub use notify::{render_summary, LogNotifier, Notifier};
pub use package::{build_result_accepted, Package};
pub use pkglog::PkgLog;
pub use state_machine::{ChrootMaterialProvider, NoChrootMaterial, Packager};
pub use supervisor::{History, HistoryRecorder, HistorySnapshot, LastBuild, LastPackage, Supervisor};
