//! Shared harness: on-disk queue + two stores in a temp dir

#![allow(dead_code)]

use lagprobe_core::application::{
    shutdown_channel, DispatchService, ProbeExecutor, RetryPolicy, Worker, WorkerPool,
};
use lagprobe_core::port::id_provider::UuidProvider;
use lagprobe_core::port::reporter::mocks::CollectingReporter;
use lagprobe_core::port::time_provider::SystemTimeProvider;
use lagprobe_core::port::{Stores, TaskExecutor, TimeProvider};
use lagprobe_infra_sqlite::{
    create_pool, run_migrations, run_store_migrations, SqliteJobRepository, SqliteProbeStore,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub const QUEUE: &str = "default";

pub struct Harness {
    dir: TempDir,
    pub time_provider: Arc<dyn TimeProvider>,
    pub job_repo: Arc<SqliteJobRepository>,
    pub primary: Arc<SqliteProbeStore>,
    pub secondary: Arc<SqliteProbeStore>,
    pub reporter: Arc<CollectingReporter>,
}

impl Harness {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        Self::open(dir).await
    }

    /// Reopen every database of an existing directory (simulated restart)
    pub async fn open(dir: TempDir) -> Self {
        let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);

        let queue_pool = create_pool(path_str(&dir.path().join("queue.db")))
            .await
            .unwrap();
        run_migrations(&queue_pool).await.unwrap();

        let primary_pool = create_pool(path_str(&dir.path().join("primary.db")))
            .await
            .unwrap();
        run_store_migrations(&primary_pool).await.unwrap();

        let secondary_pool = create_pool(path_str(&dir.path().join("secondary.db")))
            .await
            .unwrap();
        run_store_migrations(&secondary_pool).await.unwrap();

        Self {
            dir,
            job_repo: Arc::new(SqliteJobRepository::new(queue_pool, time_provider.clone())),
            primary: Arc::new(SqliteProbeStore::new(primary_pool)),
            secondary: Arc::new(SqliteProbeStore::new(secondary_pool)),
            reporter: Arc::new(CollectingReporter::new()),
            time_provider,
        }
    }

    pub fn into_dir(self) -> TempDir {
        self.dir
    }

    pub fn queue_path(&self) -> PathBuf {
        self.dir.path().join("queue.db")
    }

    pub fn stores(&self) -> Stores {
        Stores::new(self.primary.clone(), self.secondary.clone())
    }

    pub fn dispatch(&self) -> DispatchService {
        DispatchService::new(
            self.job_repo.clone(),
            Arc::new(UuidProvider),
            self.time_provider.clone(),
        )
    }

    pub fn executor(&self) -> Arc<ProbeExecutor> {
        Arc::new(ProbeExecutor::new(
            self.stores(),
            self.reporter.clone(),
            self.time_provider.clone(),
        ))
    }

    pub fn worker_with(&self, executor: Arc<dyn TaskExecutor>) -> Worker {
        Worker::new(
            QUEUE,
            self.job_repo.clone(),
            executor,
            Arc::new(RetryPolicy::new(self.time_provider.clone(), 10)),
            self.time_provider.clone(),
        )
    }

    /// Run `workers` probe workers until the queue is empty
    pub async fn drain(&self, workers: usize) -> usize {
        self.drain_with(workers, self.executor()).await
    }

    pub async fn drain_with(&self, workers: usize, executor: Arc<dyn TaskExecutor>) -> usize {
        let (_tx, token) = shutdown_channel();
        WorkerPool::spawn_until_idle(workers, self.worker_with(executor), token)
            .join()
            .await
    }
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}
