// Result Reporter Port - the probe's only observable output

use crate::domain::ExecutionResult;

/// Emits one pass/fail line per executed probe
pub trait ResultReporter: Send + Sync {
    fn report(&self, job_id: &str, result: &ExecutionResult);
}

/// Reporter that only logs through `tracing`
pub struct TracingReporter;

impl ResultReporter for TracingReporter {
    fn report(&self, job_id: &str, result: &ExecutionResult) {
        tracing::info!(
            job_id = %job_id,
            task = %result.task,
            store = %result.store,
            rows = result.observed_rows,
            verdict = result.verdict(),
            "Probe observed"
        );
    }
}

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Collects reported results in order
    #[derive(Default)]
    pub struct CollectingReporter {
        results: Mutex<Vec<(String, ExecutionResult)>>,
    }

    impl CollectingReporter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn results(&self) -> Vec<(String, ExecutionResult)> {
            self.results.lock().unwrap().clone()
        }

        pub fn lines(&self) -> Vec<String> {
            self.results()
                .iter()
                .map(|(_, r)| format!("{} {}", r.verdict(), r.task))
                .collect()
        }
    }

    impl ResultReporter for CollectingReporter {
        fn report(&self, job_id: &str, result: &ExecutionResult) {
            self.results
                .lock()
                .unwrap()
                .push((job_id.to_string(), result.clone()));
        }
    }
}
