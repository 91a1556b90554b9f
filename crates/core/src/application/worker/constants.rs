// Worker constants (no magic values)
use std::time::Duration;

/// Sleep duration when no jobs are available (100ms)
pub const IDLE_SLEEP_DURATION: Duration = Duration::from_millis(100);

/// Sleep duration after worker error before retry (1s)
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// Default retry base delay (1000ms = 1s)
pub const DEFAULT_RETRY_BASE_DELAY_MS: i64 = 1000;

/// Default recovery window for orphaned jobs (5 minutes)
pub const DEFAULT_RECOVERY_WINDOW_MS: i64 = 5 * 60 * 1000;

/// Default number of workers in a pool
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// How often the replication simulator polls the primary (50ms)
pub const REPLICATION_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Rows copied per replication tick
pub const REPLICATION_BATCH_SIZE: i64 = 500;
