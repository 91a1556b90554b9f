// Daemon configuration from LAGPROBE_* environment variables

use anyhow::{Context, Result};
use lagprobe_core::application::dispatch::DEFAULT_QUEUE;
use lagprobe_core::application::worker::constants::{
    DEFAULT_RECOVERY_WINDOW_MS, DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_WORKER_COUNT,
};
use std::str::FromStr;

pub const DEFAULT_QUEUE_DB: &str = "~/.lagprobe/queue.db";
pub const DEFAULT_PRIMARY_DB: &str = "~/.lagprobe/primary.db";
pub const DEFAULT_SECONDARY_DB: &str = "~/.lagprobe/secondary.db";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub queue_db: String,
    pub primary_db: String,
    pub secondary_db: String,
    pub queue: String,
    pub workers: usize,
    pub retry_base_delay_ms: i64,
    pub recovery_window_ms: i64,
    /// `None` disables the replication simulator
    pub replication_lag_ms: Option<i64>,
    /// Exit once the queue is drained instead of waiting for Ctrl+C
    pub stop_when_empty: bool,
    pub log_format: LogFormat,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (the process environment in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = |key: &str, default: &str| -> String {
            let raw = lookup(key).unwrap_or_else(|| default.to_string());
            shellexpand::tilde(&raw).into_owned()
        };

        let workers: usize = parse(&lookup, "LAGPROBE_WORKERS")?.unwrap_or(DEFAULT_WORKER_COUNT);
        if workers == 0 {
            anyhow::bail!("LAGPROBE_WORKERS must be at least 1");
        }

        let stop_when_empty = match lookup("LAGPROBE_STOP_WHEN_EMPTY").as_deref() {
            None | Some("") | Some("0") | Some("false") => false,
            Some("1") | Some("true") => true,
            Some(other) => anyhow::bail!("Invalid LAGPROBE_STOP_WHEN_EMPTY: {}", other),
        };

        let log_format = match lookup("LAGPROBE_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            queue_db: path("LAGPROBE_QUEUE_DB", DEFAULT_QUEUE_DB),
            primary_db: path("LAGPROBE_PRIMARY_DB", DEFAULT_PRIMARY_DB),
            secondary_db: path("LAGPROBE_SECONDARY_DB", DEFAULT_SECONDARY_DB),
            queue: lookup("LAGPROBE_QUEUE").unwrap_or_else(|| DEFAULT_QUEUE.to_string()),
            workers,
            retry_base_delay_ms: parse(&lookup, "LAGPROBE_RETRY_BASE_DELAY_MS")?
                .unwrap_or(DEFAULT_RETRY_BASE_DELAY_MS),
            recovery_window_ms: parse(&lookup, "LAGPROBE_RECOVERY_WINDOW_MS")?
                .unwrap_or(DEFAULT_RECOVERY_WINDOW_MS),
            replication_lag_ms: parse(&lookup, "LAGPROBE_REPLICATION_LAG_MS")?,
            stop_when_empty,
            log_format,
        })
    }
}

fn parse<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .map(|v| {
            v.trim()
                .parse::<T>()
                .with_context(|| format!("Invalid {}: {}", key, v))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<DaemonConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DaemonConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.queue, "default");
        assert_eq!(config.workers, DEFAULT_WORKER_COUNT);
        assert_eq!(config.replication_lag_ms, None);
        assert!(!config.stop_when_empty);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.queue_db.ends_with(".lagprobe/queue.db"));
        assert!(!config.queue_db.starts_with('~'));
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("LAGPROBE_QUEUE_DB", "/tmp/q.db"),
            ("LAGPROBE_QUEUE", "probes"),
            ("LAGPROBE_WORKERS", "8"),
            ("LAGPROBE_REPLICATION_LAG_MS", "250"),
            ("LAGPROBE_STOP_WHEN_EMPTY", "true"),
            ("LAGPROBE_LOG_FORMAT", "json"),
        ])
        .unwrap();
        assert_eq!(config.queue_db, "/tmp/q.db");
        assert_eq!(config.queue, "probes");
        assert_eq!(config.workers, 8);
        assert_eq!(config.replication_lag_ms, Some(250));
        assert!(config.stop_when_empty);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_numbers_are_rejected() {
        assert!(config(&[("LAGPROBE_WORKERS", "many")]).is_err());
        assert!(config(&[("LAGPROBE_WORKERS", "0")]).is_err());
        assert!(config(&[("LAGPROBE_REPLICATION_LAG_MS", "soon")]).is_err());
    }
}
