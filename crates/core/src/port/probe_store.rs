// Probe Store Port - one logical database holding the `examples` table

use crate::domain::{ProbeRow, StoreRole};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// A store probes read from and write to
#[async_trait]
pub trait ProbeStore: Send + Sync {
    /// Insert one probe row, returning its id
    async fn insert_row(&self, content: i64, created_at: i64) -> Result<i64>;

    /// Number of rows currently visible on this store
    async fn count_rows(&self) -> Result<i64>;

    /// Delete every row, returning how many were removed
    async fn truncate(&self) -> Result<u64>;

    /// Highest row id present (0 when empty)
    async fn max_row_id(&self) -> Result<i64>;

    /// Rows with `id > after_id`, ascending by id
    async fn rows_after(&self, after_id: i64, limit: i64) -> Result<Vec<ProbeRow>>;

    /// Number of rows with `id <= max_id`
    async fn count_rows_through(&self, max_id: i64) -> Result<i64>;

    /// Copy rows verbatim (ids preserved); already present ids are skipped
    async fn apply_rows(&self, rows: &[ProbeRow]) -> Result<u64>;
}

/// The two store handles, passed explicitly to whoever needs them
#[derive(Clone)]
pub struct Stores {
    pub primary: Arc<dyn ProbeStore>,
    pub secondary: Arc<dyn ProbeStore>,
}

impl Stores {
    pub fn new(primary: Arc<dyn ProbeStore>, secondary: Arc<dyn ProbeStore>) -> Self {
        Self { primary, secondary }
    }

    pub fn get(&self, role: StoreRole) -> &Arc<dyn ProbeStore> {
        match role {
            StoreRole::Primary => &self.primary,
            StoreRole::Secondary => &self.secondary,
        }
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
    use std::sync::Mutex;

    /// In-memory store with switchable failure. Ids are never reused, even
    /// after `truncate`.
    #[derive(Default)]
    pub struct InMemoryProbeStore {
        rows: Mutex<Vec<ProbeRow>>,
        last_id: AtomicI64,
        failing: AtomicBool,
    }

    impl InMemoryProbeStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every subsequent call fail (or succeed again)
        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub fn rows(&self) -> Vec<ProbeRow> {
            self.rows.lock().unwrap().clone()
        }

        fn check(&self) -> Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(AppError::Database("store unavailable".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ProbeStore for InMemoryProbeStore {
        async fn insert_row(&self, content: i64, created_at: i64) -> Result<i64> {
            self.check()?;
            let mut rows = self.rows.lock().unwrap();
            let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
            rows.push(ProbeRow {
                id,
                content,
                created_at,
            });
            Ok(id)
        }

        async fn count_rows(&self) -> Result<i64> {
            self.check()?;
            Ok(self.rows.lock().unwrap().len() as i64)
        }

        async fn truncate(&self) -> Result<u64> {
            self.check()?;
            let mut rows = self.rows.lock().unwrap();
            let removed = rows.len() as u64;
            rows.clear();
            Ok(removed)
        }

        async fn max_row_id(&self) -> Result<i64> {
            self.check()?;
            Ok(self.rows.lock().unwrap().iter().map(|r| r.id).max().unwrap_or(0))
        }

        async fn rows_after(&self, after_id: i64, limit: i64) -> Result<Vec<ProbeRow>> {
            self.check()?;
            let mut out: Vec<ProbeRow> = self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.id > after_id)
                .cloned()
                .collect();
            out.sort_by_key(|r| r.id);
            out.truncate(limit.max(0) as usize);
            Ok(out)
        }

        async fn count_rows_through(&self, max_id: i64) -> Result<i64> {
            self.check()?;
            let rows = self.rows.lock().unwrap();
            Ok(rows.iter().filter(|r| r.id <= max_id).count() as i64)
        }

        async fn apply_rows(&self, incoming: &[ProbeRow]) -> Result<u64> {
            self.check()?;
            let mut rows = self.rows.lock().unwrap();
            let mut applied = 0;
            for row in incoming {
                if rows.iter().all(|r| r.id != row.id) {
                    self.last_id.fetch_max(row.id, Ordering::SeqCst);
                    rows.push(row.clone());
                    applied += 1;
                }
            }
            Ok(applied)
        }
    }
}
