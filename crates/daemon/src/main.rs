//! lagprobe worker daemon - executes queued probe jobs
//! Hosts the worker pool and, when configured, the replication simulator.

mod config;
mod reporter;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::{DaemonConfig, LogFormat};
use lagprobe_core::application::{
    shutdown_channel, ProbeExecutor, RecoveryService, Replicator, RetryPolicy, Worker, WorkerPool,
};
use lagprobe_core::port::reporter::TracingReporter;
use lagprobe_core::port::time_provider::SystemTimeProvider;
use lagprobe_core::port::{ResultReporter, Stores};
use lagprobe_infra_sqlite::{
    create_pool, run_migrations, run_store_migrations, SqliteJobRepository, SqliteProbeStore,
};
use reporter::ConsoleReporter;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

fn init_tracing(format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("lagprobe=info"))
        .context("Failed to create env filter")?;

    match format {
        // Production: JSON structured logging
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init(),
        // Development: pretty formatting with colors
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty())
            .init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Configuration + logging
    let config = DaemonConfig::from_env()?;
    init_tracing(config.log_format)?;

    info!("lagprobe worker v{} starting...", lagprobe_core::VERSION);

    // 2. Databases
    info!(
        queue_db = %config.queue_db,
        primary_db = %config.primary_db,
        secondary_db = %config.secondary_db,
        "Initializing databases..."
    );

    let queue_pool = create_pool(&config.queue_db)
        .await
        .context("Queue DB pool creation failed")?;
    run_migrations(&queue_pool)
        .await
        .context("Queue migration failed")?;

    let primary_pool = create_pool(&config.primary_db)
        .await
        .context("Primary DB pool creation failed")?;
    run_store_migrations(&primary_pool)
        .await
        .context("Primary migration failed")?;

    let secondary_pool = create_pool(&config.secondary_db)
        .await
        .context("Secondary DB pool creation failed")?;
    run_store_migrations(&secondary_pool)
        .await
        .context("Secondary migration failed")?;

    // 3. DI wiring
    let time_provider = Arc::new(SystemTimeProvider);
    let job_repo = Arc::new(SqliteJobRepository::new(
        queue_pool.clone(),
        time_provider.clone(),
    ));
    let stores = Stores::new(
        Arc::new(SqliteProbeStore::new(primary_pool.clone())),
        Arc::new(SqliteProbeStore::new(secondary_pool.clone())),
    );
    // JSON logs stay machine-readable: verdicts go through tracing too
    let reporter: Arc<dyn ResultReporter> = match config.log_format {
        LogFormat::Json => Arc::new(TracingReporter),
        LogFormat::Pretty => Arc::new(ConsoleReporter),
    };
    let executor = Arc::new(ProbeExecutor::new(
        stores.clone(),
        reporter,
        time_provider.clone(),
    ));
    let retry_policy = Arc::new(RetryPolicy::new(
        time_provider.clone(),
        config.retry_base_delay_ms,
    ));

    // 4. Crash recovery
    info!("Running crash recovery...");
    let recovery_service = RecoveryService::new(
        job_repo.clone(),
        time_provider.clone(),
        Some(config.recovery_window_ms),
    );
    match recovery_service.recover_orphaned_jobs().await {
        Ok(count) => info!(recovered_jobs = count, "Crash recovery completed"),
        Err(e) => error!(error = ?e, "Crash recovery failed"),
    }

    let (shutdown_tx, shutdown_rx) = shutdown_channel();

    // 5. Replication simulator (optional)
    let replicator_handle = config.replication_lag_ms.map(|lag_ms| {
        let replicator = Replicator::new(stores.clone(), time_provider.clone(), lag_ms);
        let token = shutdown_tx.subscribe();
        tokio::spawn(async move { replicator.run(token).await })
    });

    // 6. Workers
    let worker = Worker::new(
        config.queue.clone(),
        job_repo.clone(),
        executor,
        retry_policy,
        time_provider.clone(),
    );

    if config.stop_when_empty {
        let pool = WorkerPool::spawn_until_idle(config.workers, worker, shutdown_rx);
        info!(workers = pool.size(), "Draining queue: {}", config.queue);

        let joined = pool.join();
        tokio::pin!(joined);
        tokio::select! {
            processed = &mut joined => info!(processed, "Queue drained"),
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received while draining");
                shutdown_tx.shutdown();
                if tokio::time::timeout(SHUTDOWN_TIMEOUT, joined).await.is_err() {
                    error!("Workers did not stop within {:?}", SHUTDOWN_TIMEOUT);
                }
            }
        }
    } else {
        let pool = WorkerPool::spawn(config.workers, worker, shutdown_rx);
        info!(workers = pool.size(), "System ready. Waiting for probe jobs...");
        info!("Press Ctrl+C to shutdown");

        tokio::signal::ctrl_c().await?;
        info!("Shutdown signal received. Exiting gracefully...");

        // 7. Graceful shutdown: in-flight jobs finish
        shutdown_tx.shutdown();
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, pool.join())
            .await
            .is_err()
        {
            error!("Workers did not stop within {:?}", SHUTDOWN_TIMEOUT);
        }
    }

    shutdown_tx.shutdown();
    if let Some(handle) = replicator_handle {
        let _ = tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await;
    }

    queue_pool.close().await;
    primary_pool.close().await;
    secondary_pool.close().await;

    info!("Shutdown complete.");
    Ok(())
}
