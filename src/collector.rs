//! Сборщик результатов: параллельно вычитывает потоки результатов и
//! системных ошибок пула и пишет их в лог.

use super::{
    errors::SystemError,
    handle::PoolReceiver,
    model::TaskResult,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};


#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectorSummary {
    pub succeeded: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub system_errors: u64,
}

impl CollectorSummary {
    pub fn total_results(&self) -> u64 {
        self.succeeded + self.failed + self.cancelled
    }

    fn record(&mut self, result: &TaskResult) {
        match &result.error {
            None => {
                info!(
                    task = result.task_id,
                    output = result.output.as_deref().unwrap_or_default(),
                    took = ?result.duration,
                    "task completed"
                );
                self.succeeded += 1;
            }
            Some(e) => {
                warn!(task = result.task_id, error = %e, took = ?result.duration, "task failed");
                if result.is_cancelled() {
                    self.cancelled += 1;
                } else {
                    self.failed += 1;
                }
            }
        }
    }
}


pub struct ResultCollector {
    results: PoolReceiver<TaskResult>,
    errors: PoolReceiver<SystemError>,
}

impl ResultCollector {
    pub fn new(results: PoolReceiver<TaskResult>, errors: PoolReceiver<SystemError>) -> Self {
        Self { results, errors }
    }

    /// Работает, пока оба потока не закрыты или не отменен `token`
    pub async fn run(self, token: CancellationToken) -> CollectorSummary {
        let mut summary = CollectorSummary::default();
        let mut results_open = true;
        let mut errors_open = true;

        while results_open || errors_open {
            tokio::select! {
                _ = token.cancelled() => break,
                result = self.results.recv(), if results_open => match result {
                    Some(result) => summary.record(&result),
                    None => results_open = false,
                },
                fault = self.errors.recv(), if errors_open => match fault {
                    Some(fault) => {
                        error!(error = %fault, "system error");
                        summary.system_errors += 1;
                    }
                    None => errors_open = false,
                },
            }
        }

        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            cancelled = summary.cancelled,
            system_errors = summary.system_errors,
            "result collector finished"
        );
        summary
    }
}
