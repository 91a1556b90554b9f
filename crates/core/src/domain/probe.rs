// Probe Domain Model

use serde::{Deserialize, Serialize};

/// What a probe does to a store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProbeKind {
    Read,
    Write,
}

impl std::fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeKind::Read => write!(f, "READ"),
            ProbeKind::Write => write!(f, "WRITE"),
        }
    }
}

/// Which logical store a probe observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoreRole {
    /// Writable connection
    Primary,
    /// Read-only, possibly lagging replica
    Secondary,
}

impl std::fmt::Display for StoreRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreRole::Primary => write!(f, "primary"),
            StoreRole::Secondary => write!(f, "secondary"),
        }
    }
}

/// A unit of probe work.
///
/// `kind` is what the probe does, `expected` is the connection it expects to
/// land on. For reads, `expected` selects the store that is queried: a
/// read expecting the write connection goes to the primary, every other read
/// goes to the secondary. The label carries no assertion beyond that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeTask {
    pub kind: ProbeKind,
    pub expected: ProbeKind,
}

impl ProbeTask {
    pub const READ_EXPECT_READ: &'static str = "READ_EXPECT_READ";
    pub const WRITE_EXPECT_WRITE: &'static str = "WRITE_EXPECT_WRITE";
    pub const READ_EXPECT_WRITE: &'static str = "READ_EXPECT_WRITE";
    pub const WRITE_EXPECT_READ: &'static str = "WRITE_EXPECT_READ";

    pub fn new(kind: ProbeKind, expected: ProbeKind) -> Self {
        Self { kind, expected }
    }

    pub fn read_expect_read() -> Self {
        Self::new(ProbeKind::Read, ProbeKind::Read)
    }

    pub fn write_expect_write() -> Self {
        Self::new(ProbeKind::Write, ProbeKind::Write)
    }

    pub fn read_expect_write() -> Self {
        Self::new(ProbeKind::Read, ProbeKind::Write)
    }

    /// Store this task runs against. Writes always go to the primary.
    pub fn target_store(&self) -> StoreRole {
        match (self.kind, self.expected) {
            (ProbeKind::Write, _) => StoreRole::Primary,
            (ProbeKind::Read, ProbeKind::Write) => StoreRole::Primary,
            (ProbeKind::Read, ProbeKind::Read) => StoreRole::Secondary,
        }
    }

    /// Job type string used on the queue
    pub fn job_type(&self) -> &'static str {
        match (self.kind, self.expected) {
            (ProbeKind::Read, ProbeKind::Read) => Self::READ_EXPECT_READ,
            (ProbeKind::Write, ProbeKind::Write) => Self::WRITE_EXPECT_WRITE,
            (ProbeKind::Read, ProbeKind::Write) => Self::READ_EXPECT_WRITE,
            (ProbeKind::Write, ProbeKind::Read) => Self::WRITE_EXPECT_READ,
        }
    }
}

impl std::fmt::Display for ProbeTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.job_type())
    }
}

/// Outcome of one probe execution (not persisted)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub task: ProbeTask,
    pub store: StoreRole,
    pub observed_rows: i64,
    /// Observation only: whether the store showed any rows
    pub success: bool,
    pub duration_ms: i64,
}

impl ExecutionResult {
    pub fn verdict(&self) -> &'static str {
        if self.success {
            "SUCCESS"
        } else {
            "FAILURE"
        }
    }
}

/// Row of the `examples` table held by each store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeRow {
    pub id: i64,
    pub content: i64,
    pub created_at: i64, // epoch ms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_store_follows_expectation() {
        assert_eq!(
            ProbeTask::read_expect_read().target_store(),
            StoreRole::Secondary
        );
        assert_eq!(
            ProbeTask::read_expect_write().target_store(),
            StoreRole::Primary
        );
        assert_eq!(
            ProbeTask::write_expect_write().target_store(),
            StoreRole::Primary
        );
        // A write never lands on the replica
        assert_eq!(
            ProbeTask::new(ProbeKind::Write, ProbeKind::Read).target_store(),
            StoreRole::Primary
        );
    }

    #[test]
    fn test_payload_shape() {
        let value = serde_json::to_value(ProbeTask::read_expect_write()).unwrap();
        assert_eq!(value, serde_json::json!({"kind": "READ", "expected": "WRITE"}));

        let back: ProbeTask = serde_json::from_value(value).unwrap();
        assert_eq!(back, ProbeTask::read_expect_write());
    }

    #[test]
    fn test_verdict() {
        let mut result = ExecutionResult {
            task: ProbeTask::read_expect_read(),
            store: StoreRole::Secondary,
            observed_rows: 0,
            success: false,
            duration_ms: 1,
        };
        assert_eq!(result.verdict(), "FAILURE");
        result.success = true;
        assert_eq!(result.verdict(), "SUCCESS");
    }
}
