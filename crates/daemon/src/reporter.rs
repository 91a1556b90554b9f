// Console reporter: one colored SUCCESS/FAILURE line per probe on stdout

use colored::Colorize;
use lagprobe_core::domain::ExecutionResult;
use lagprobe_core::port::ResultReporter;

pub struct ConsoleReporter;

impl ConsoleReporter {
    fn line(result: &ExecutionResult) -> String {
        format!(
            "{} {} ({} store, {} rows, {} ms)",
            result.verdict(),
            result.task,
            result.store,
            result.observed_rows,
            result.duration_ms
        )
    }
}

impl ResultReporter for ConsoleReporter {
    fn report(&self, job_id: &str, result: &ExecutionResult) {
        let line = Self::line(result);
        if result.success {
            println!("{}", line.green());
        } else {
            println!("{}", line.red());
        }
        tracing::debug!(job_id = %job_id, verdict = result.verdict(), "Probe reported");
    }
}
