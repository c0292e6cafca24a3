use super::{model::PoolStats, pool::WorkerPoolInner};
use std::sync::Arc;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;


impl WorkerPoolInner {
    /// Периодический отчет об утилизации. Только читает состояние пула
    /// и завершается при отмене.
    pub(crate) async fn monitor_loop(&self) {
        let period = self.config.monitor_interval;
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => break,
                _ = ticker.tick() => {
                    let stats = self.stats();
                    info!(
                        active_workers = stats.active_workers,
                        completed_tasks = stats.completed_tasks,
                        queue_length = stats.queued_tasks,
                        "monitor"
                    );
                }
            }
        }
    }

    /// Мониторинг метрик с callback.
    /// Останавливается через `token.cancel()` или вместе с пулом.
    pub fn start_monitoring<F>(self: &Arc<Self>, interval: Duration, callback: F) -> CancellationToken
    where
        F: Fn(PoolStats) + Send + 'static,
    {
        let interval = interval.max(Duration::from_millis(1));
        let pool = Arc::clone(self);
        let token = self.cancellation_token.child_token();
        let token_clone = token.clone();

        tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    _ = token_clone.cancelled() => {
                        drop(pool);
                        break;
                    }
                    _ = ticker.tick() => {
                        callback(pool.stats());
                    }
                }
            }
        });

        token
    }

    /// Остановить мониторинг и дропнуть все ссылки
    pub fn stop_monitoring(token: CancellationToken) {
        token.cancel();
    }
}
