// Replication simulator - copies primary rows to the secondary after a lag
//
// Real deployments replicate outside this tool. When both stores are local
// SQLite files nothing does, so the worker daemon can run this instead.

use crate::application::worker::constants::{REPLICATION_BATCH_SIZE, REPLICATION_POLL_INTERVAL};
use crate::application::worker::ShutdownToken;
use crate::error::Result;
use crate::port::{Stores, TimeProvider};
use std::sync::Arc;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

pub struct Replicator {
    stores: Stores,
    time_provider: Arc<dyn TimeProvider>,
    lag_ms: i64,
}

impl Replicator {
    pub fn new(stores: Stores, time_provider: Arc<dyn TimeProvider>, lag_ms: i64) -> Self {
        Self {
            stores,
            time_provider,
            lag_ms: lag_ms.max(0),
        }
    }

    pub fn lag_ms(&self) -> i64 {
        self.lag_ms
    }

    /// Copy every primary row older than the lag that the secondary lacks.
    ///
    /// The secondary's highest id is the watermark. Rows are copied in id
    /// order and copying stops at the first row still inside the lag window,
    /// so a low id stamped late never falls behind the watermark. If the
    /// secondary holds rows the primary no longer has (primary truncated on
    /// its own), the secondary is emptied and resynced from scratch.
    ///
    /// # Returns
    /// Rows applied to the secondary
    pub async fn sync_once(&self) -> Result<u64> {
        let mut watermark = self.stores.secondary.max_row_id().await?;

        if watermark > 0 {
            let replicated = self.stores.secondary.count_rows().await?;
            let source = self.stores.primary.count_rows_through(watermark).await?;
            if replicated > source {
                warn!(
                    secondary_rows = replicated,
                    primary_rows = source,
                    watermark,
                    "Secondary diverged from primary, resyncing"
                );
                self.stores.secondary.truncate().await?;
                watermark = 0;
            }
        }

        let cutoff = self.time_provider.now_millis() - self.lag_ms;
        let mut applied = 0;

        loop {
            let batch = self
                .stores
                .primary
                .rows_after(watermark, REPLICATION_BATCH_SIZE)
                .await?;
            let ready: Vec<_> = batch
                .into_iter()
                .take_while(|row| row.created_at <= cutoff)
                .collect();

            let Some(last) = ready.last() else {
                break;
            };
            watermark = last.id;
            applied += self.stores.secondary.apply_rows(&ready).await?;

            // Short batch: end of the primary, or a row still inside the lag
            if (ready.len() as i64) < REPLICATION_BATCH_SIZE {
                break;
            }
        }

        if applied > 0 {
            debug!(applied, watermark, "Replicated rows");
        }
        Ok(applied)
    }

    /// Poll until shutdown
    pub async fn run(&self, mut shutdown: ShutdownToken) {
        info!(lag_ms = self.lag_ms, "Replication simulator started");
        let mut tick = interval(REPLICATION_POLL_INTERVAL);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    if let Err(e) = self.sync_once().await {
                        error!(error = %e, "Replication tick failed");
                    }
                }
                _ = shutdown.wait() => break,
            }
        }
        info!("Replication simulator stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::probe_store::mocks::InMemoryProbeStore;
    use crate::port::time_provider::mocks::FixedTimeProvider;
    use crate::port::ProbeStore;

    struct Fixture {
        clock: Arc<FixedTimeProvider>,
        primary: Arc<InMemoryProbeStore>,
        secondary: Arc<InMemoryProbeStore>,
        replicator: Replicator,
    }

    fn fixture(lag_ms: i64) -> Fixture {
        let clock = Arc::new(FixedTimeProvider::new(10_000));
        let primary = Arc::new(InMemoryProbeStore::new());
        let secondary = Arc::new(InMemoryProbeStore::new());
        let replicator = Replicator::new(
            Stores::new(primary.clone(), secondary.clone()),
            clock.clone(),
            lag_ms,
        );
        Fixture {
            clock,
            primary,
            secondary,
            replicator,
        }
    }

    #[tokio::test]
    async fn test_only_rows_older_than_lag_are_copied() {
        let f = fixture(1_000);
        f.primary.insert_row(1, 8_000).await.unwrap();
        f.primary.insert_row(2, 9_500).await.unwrap();

        assert_eq!(f.replicator.sync_once().await.unwrap(), 1);
        assert_eq!(f.secondary.count_rows().await.unwrap(), 1);

        f.clock.advance(1_000);
        assert_eq!(f.replicator.sync_once().await.unwrap(), 1);
        assert_eq!(f.secondary.rows(), f.primary.rows());

        // Nothing new
        assert_eq!(f.replicator.sync_once().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_late_stamped_row_is_not_skipped() {
        let f = fixture(1_000);
        // Lower id, later stamp: still inside the lag window
        f.primary.insert_row(1, 9_500).await.unwrap();
        // Higher id, earlier stamp: already past the cutoff
        f.primary.insert_row(2, 8_900).await.unwrap();

        // The older row waits behind the younger, lower id
        assert_eq!(f.replicator.sync_once().await.unwrap(), 0);
        assert_eq!(f.secondary.count_rows().await.unwrap(), 0);

        f.clock.advance(60_000);
        assert_eq!(f.replicator.sync_once().await.unwrap(), 2);
        assert_eq!(f.replicator.sync_once().await.unwrap(), 0);
        assert_eq!(f.secondary.rows(), f.primary.rows());
    }

    #[tokio::test]
    async fn test_batches_continue_past_batch_size() {
        let f = fixture(0);
        let total = REPLICATION_BATCH_SIZE * 2 + 3;
        for i in 0..total {
            f.primary.insert_row(i, 1).await.unwrap();
        }
        assert_eq!(f.replicator.sync_once().await.unwrap() as i64, total);
        assert_eq!(f.secondary.count_rows().await.unwrap(), total);
    }

    #[tokio::test]
    async fn test_zero_lag_copies_everything() {
        let f = fixture(0);
        for i in 0..3 {
            f.primary.insert_row(i, 10_000).await.unwrap();
        }
        assert_eq!(f.replicator.sync_once().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_resync_after_primary_truncate() {
        let f = fixture(0);
        f.primary.insert_row(1, 1).await.unwrap();
        f.primary.insert_row(2, 1).await.unwrap();
        f.replicator.sync_once().await.unwrap();

        f.primary.truncate().await.unwrap();
        f.primary.insert_row(3, 1).await.unwrap();

        f.replicator.sync_once().await.unwrap();
        let rows = f.secondary.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].content, 3);
    }

    #[tokio::test]
    async fn test_resync_when_primary_regrows_past_old_rows() {
        let f = fixture(0);
        f.primary.insert_row(1, 1).await.unwrap();
        f.primary.insert_row(2, 1).await.unwrap();
        f.replicator.sync_once().await.unwrap();

        // Primary truncated alone, then grows beyond the secondary's max id
        f.primary.truncate().await.unwrap();
        for content in [10, 11, 12] {
            f.primary.insert_row(content, 1).await.unwrap();
        }

        f.replicator.sync_once().await.unwrap();
        assert_eq!(f.secondary.rows(), f.primary.rows());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let f = fixture(0);
        f.primary.insert_row(1, 1).await.unwrap();
        let (tx, token) = crate::application::worker::shutdown_channel();

        let secondary = f.secondary.clone();
        let replicator = f.replicator;
        let handle = tokio::spawn(async move { replicator.run(token).await });

        tokio::time::sleep(REPLICATION_POLL_INTERVAL * 3).await;
        tx.shutdown();
        tokio::time::timeout(std::time::Duration::from_secs(2), handle)
            .await
            .expect("replicator should stop")
            .unwrap();

        assert_eq!(secondary.count_rows().await.unwrap(), 1);
    }
}
