// Application Layer - Use Cases and Business Logic

pub mod dispatch;
pub mod probe;
pub mod recovery;
pub mod replication;
pub mod retry;
pub mod worker;

// Re-exports
pub use dispatch::{DispatchPlan, DispatchService, DispatchSummary, Submission};
pub use probe::ProbeExecutor;
pub use recovery::RecoveryService;
pub use replication::Replicator;
pub use retry::{RetryDecision, RetryPolicy};
pub use worker::{shutdown_channel, ShutdownSender, ShutdownToken, Worker, WorkerPool};
