pub mod fingerprint;
pub mod pacing;
pub mod paths;
pub mod pool;
pub mod retry;
pub mod scan;
pub mod store;
pub mod upload;

pub use pacing::RateLimiter;
pub use paths::{IgnoreList, KeyError};
pub use pool::{RunSummary, TaskExecutor, UploadOutcome, UploadUnit, WalkError, WorkerPool};
pub use retry::{RetryError, RetryPolicy};
pub use scan::{Finding, FindingsLog, SensitiveScanner};
pub use store::{ConsulConnector, KvConnector, KvStore};
pub use upload::{TaskError, UploadTask};
