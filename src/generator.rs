//! Генератор задач со случайной длительностью, приоритетом и интервалом
//! поступления. Драйвер для демонстрации и нагрузочных тестов: общается с пулом
//! только через `submit`.

use super::{model::Task, pool::WorkerPool};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::Duration,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};


#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub min_duration: Duration,
    pub max_duration: Duration,
    /// Приоритет выбирается из `0..max_priority`
    pub max_priority: u32,
    /// Пауза между задачами выбирается из `0..max_delay`
    pub max_delay: Duration,
    pub channel_capacity: usize,
    pub seed: Option<u64>,
    /// Остановиться после стольких задач; `None` - до отмены
    pub limit: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            min_duration: Duration::from_millis(100),
            max_duration: Duration::from_millis(1100),
            max_priority: 5,
            max_delay: Duration::from_millis(200),
            channel_capacity: 50,
            seed: None,
            limit: None,
        }
    }
}


pub struct TaskGenerator {
    config: GeneratorConfig,
}

impl TaskGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    /// Запускает генерацию. Канал закрывается при отмене `token`,
    /// по достижении лимита или если получатель дропнут.
    /// `JoinHandle` возвращает число отправленных задач.
    pub fn spawn(self, token: CancellationToken) -> (mpsc::Receiver<Task>, JoinHandle<u64>) {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let handle = tokio::spawn(async move { self.run(tx, token).await });
        (rx, handle)
    }

    async fn run(self, tx: mpsc::Sender<Task>, token: CancellationToken) -> u64 {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut generated = 0u64;

        loop {
            if token.is_cancelled() || self.config.limit.is_some_and(|limit| generated >= limit) {
                break;
            }

            let task = self.next_task(&mut rng, generated);
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                sent = tx.send(task) => if sent.is_err() { break },
            }
            generated += 1;

            let delay = random_between(&mut rng, Duration::ZERO, self.config.max_delay);
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!(generated, "task generator shutting down");
        generated
    }

    fn next_task(&self, rng: &mut StdRng, id: u64) -> Task {
        let duration = random_between(rng, self.config.min_duration, self.config.max_duration);
        let priority = if self.config.max_priority > 0 {
            rng.gen_range(0..self.config.max_priority)
        } else {
            0
        };
        Task::new(id, format!("Data payload {}", id))
            .with_duration(duration)
            .with_priority(priority)
    }
}

fn random_between(rng: &mut StdRng, low: Duration, high: Duration) -> Duration {
    let (low, high) = (low.as_millis() as u64, high.as_millis() as u64);
    if high <= low {
        return Duration::from_millis(low);
    }
    Duration::from_millis(rng.gen_range(low..high))
}


#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwardReport {
    pub submitted: u64,
    pub rejected: u64,
}

/// Перекладывает задачи из канала генератора в пул.
/// Останавливается на первом отказе `submit` (пул останавливается).
pub fn forward_tasks(pool: WorkerPool, mut tasks: mpsc::Receiver<Task>) -> JoinHandle<ForwardReport> {
    tokio::spawn(async move {
        let mut report = ForwardReport::default();
        while let Some(task) = tasks.recv().await {
            let task_id = task.id;
            match pool.submit(task).await {
                Ok(()) => report.submitted += 1,
                Err(e) => {
                    warn!(task = task_id, error = %e, "failed to submit task");
                    report.rejected += 1;
                    break;
                }
            }
        }
        debug!(submitted = report.submitted, "task forwarding finished");
        report
    })
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tasks_stay_within_bounds() {
        let generator = TaskGenerator::new(GeneratorConfig::default());
        let mut rng = StdRng::seed_from_u64(1);
        for id in 0..200 {
            let task = generator.next_task(&mut rng, id);
            assert_eq!(task.id, id);
            assert_eq!(task.payload, format!("Data payload {}", id));
            assert!(task.duration >= Duration::from_millis(100));
            assert!(task.duration < Duration::from_millis(1100));
            assert!(task.priority < 5);
        }
    }

    #[test]
    fn degenerate_ranges_do_not_panic() {
        let mut rng = StdRng::seed_from_u64(1);
        let d = random_between(&mut rng, Duration::from_millis(5), Duration::from_millis(5));
        assert_eq!(d, Duration::from_millis(5));

        let generator = TaskGenerator::new(GeneratorConfig { max_priority: 0, ..Default::default() });
        assert_eq!(generator.next_task(&mut rng, 0).priority, 0);
    }

    #[tokio::test]
    async fn limit_closes_the_channel() {
        let config = GeneratorConfig {
            max_delay: Duration::ZERO,
            seed: Some(3),
            limit: Some(5),
            ..Default::default()
        };
        let (mut rx, handle) = TaskGenerator::new(config).spawn(CancellationToken::new());

        let mut ids = Vec::new();
        while let Some(task) = rx.recv().await {
            ids.push(task.id);
        }
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert_eq!(handle.await.unwrap(), 5);
    }

    #[tokio::test]
    async fn cancellation_stops_generation() {
        let token = CancellationToken::new();
        let (mut rx, handle) = TaskGenerator::new(GeneratorConfig::default()).spawn(token.clone());
        assert!(rx.recv().await.is_some());
        token.cancel();

        let generated = handle.await.unwrap();
        let mut rest = 0;
        while rx.recv().await.is_some() {
            rest += 1;
        }
        assert!(rest < generated);
    }
}
