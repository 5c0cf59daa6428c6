pub mod block_queue;
pub mod buildlog;
pub mod dispatch;
pub mod error;
pub mod sbuild_key;
pub mod worker;
pub mod worker_pool;

pub use block_queue::BlockQueue;
pub use dispatch::{dispatch, rank_candidates, self_candidate, Candidate};
pub use error::BuilderError;
pub use worker::{parse_build_log, retry_pending_uploads, BuildExecutor};
pub use worker_pool::{BuildJob, WorkerPool};
