// Command implementations: each opens the databases it needs, directly

use anyhow::{Context, Result};
use colored::Colorize;
use lagprobe_core::application::{DispatchPlan, DispatchService};
use lagprobe_core::domain::{JobState, StoreRole};
use lagprobe_core::port::id_provider::UuidProvider;
use lagprobe_core::port::time_provider::SystemTimeProvider;
use lagprobe_core::port::{JobRepository, ProbeStore};
use lagprobe_infra_sqlite::{
    create_pool, run_migrations, run_store_migrations, SqliteJobRepository, SqliteProbeStore,
};
use std::sync::Arc;
use tabled::{Table, Tabled};
use tracing::{debug, info};

/// Tilde-expanded database locations
pub struct DbPaths {
    pub queue: String,
    pub primary: String,
    pub secondary: String,
}

impl DbPaths {
    fn store(&self, role: StoreRole) -> &str {
        match role {
            StoreRole::Primary => &self.primary,
            StoreRole::Secondary => &self.secondary,
        }
    }
}

#[derive(Tabled)]
struct StateRow {
    state: String,
    jobs: i64,
}

#[derive(Tabled)]
struct StoreRow {
    store: String,
    path: String,
    rows: i64,
}

async fn open_queue(path: &str) -> Result<SqliteJobRepository> {
    let pool = create_pool(path)
        .await
        .with_context(|| format!("Failed to open queue database {}", path))?;
    run_migrations(&pool)
        .await
        .with_context(|| format!("Failed to migrate queue database {}", path))?;
    Ok(SqliteJobRepository::new(pool, Arc::new(SystemTimeProvider)))
}

async fn open_store(path: &str) -> Result<SqliteProbeStore> {
    let pool = create_pool(path)
        .await
        .with_context(|| format!("Failed to open store {}", path))?;
    run_store_migrations(&pool)
        .await
        .with_context(|| format!("Failed to migrate store {}", path))?;
    Ok(SqliteProbeStore::new(pool))
}

/// Enqueue a plan; the worker daemon executes it
pub async fn dispatch(
    paths: &DbPaths,
    queue: &str,
    max_attempts: i32,
    plan: &DispatchPlan,
) -> Result<()> {
    if plan.is_empty() {
        println!("{}", "Nothing to dispatch".yellow());
        return Ok(());
    }

    let repo = open_queue(&paths.queue).await?;
    let service = DispatchService::new(
        Arc::new(repo),
        Arc::new(UuidProvider),
        Arc::new(SystemTimeProvider),
    )
    .with_queue(queue)?
    .with_max_attempts(max_attempts);

    let summary = service.dispatch(plan).await?;
    info!(
        queue = service.queue(),
        jobs = summary.jobs,
        chains = summary.chains,
        "Plan dispatched"
    );

    let message = if summary.chains > 0 {
        format!(
            "✓ Dispatched {} jobs in {} chains to queue '{}'",
            summary.jobs,
            summary.chains,
            service.queue()
        )
    } else {
        format!(
            "✓ Dispatched {} jobs to queue '{}'",
            summary.jobs,
            service.queue()
        )
    };
    println!("{}", message.green().bold());
    Ok(())
}

/// Empty the probe table on both stores
pub async fn truncate(paths: &DbPaths) -> Result<()> {
    for role in [StoreRole::Primary, StoreRole::Secondary] {
        let path = paths.store(role);
        let store = open_store(path).await?;
        let deleted = store
            .truncate()
            .await
            .with_context(|| format!("Failed to truncate {} store", role))?;
        info!(store = %role, path, deleted, "Store truncated");
        println!(
            "{} {} store truncated ({} rows deleted)",
            "✓".green(),
            role,
            deleted
        );
    }
    Ok(())
}

/// Job counts per state for `queue`, row counts per store
pub async fn status(paths: &DbPaths, queue: &str) -> Result<()> {
    debug!(queue, queue_db = %paths.queue, "Reading status");
    let repo = open_queue(&paths.queue).await?;

    let mut states = Vec::with_capacity(JobState::ALL.len());
    for state in JobState::ALL {
        states.push(StateRow {
            state: state.to_string(),
            jobs: repo.count_by_state(queue, state).await?,
        });
    }

    let mut stores = Vec::with_capacity(2);
    for role in [StoreRole::Primary, StoreRole::Secondary] {
        let path = paths.store(role);
        let store = open_store(path).await?;
        stores.push(StoreRow {
            store: role.to_string(),
            path: path.to_string(),
            rows: store.count_rows().await?,
        });
    }

    println!("{}", format!("Queue '{}'", queue).cyan().bold());
    println!("{}", Table::new(states));
    println!();
    println!("{}", "Stores".cyan().bold());
    println!("{}", Table::new(stores));
    Ok(())
}
