use super::{
    errors::{PoolError, SystemError, TrySubmitError},
    handle::PoolReceiver,
    model::{DispatchOrder, PoolStats, Task, TaskResult},
    policy::{FailurePolicy, RandomFailure},
    queue::TaskQueue,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, PoisonError,
};
use futures::future::join_all;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::Duration,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};


/// Конфигурация пула воркеров
#[derive(Debug, Clone)]
pub struct Config {
    pub num_workers: usize,
    pub task_capacity: usize,
    pub result_capacity: usize,
    pub error_capacity: usize,
    pub monitor_interval: Duration,
    /// Вероятность отказа для политики по умолчанию (`RandomFailure`)
    pub failure_rate: f64,
    pub dispatch: DispatchOrder,
    /// После этого срока с момента `start()` пул отменяется
    pub deadline: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_workers: num_cpus::get(),
            task_capacity: 100,
            result_capacity: 100,
            error_capacity: 10,
            monitor_interval: Duration::from_secs(2),
            failure_rate: 0.1,
            dispatch: DispatchOrder::Fifo,
            deadline: None,
        }
    }
}

impl Config {
    /// Воркер на ядро, короткие очереди: при тяжелых задачах длинный
    /// backlog только увеличивает задержку
    pub fn cpu_bound() -> Self {
        let num_cpus = num_cpus::get();
        Self {
            num_workers: num_cpus,
            task_capacity: num_cpus * 4,
            result_capacity: num_cpus * 4,
            ..Default::default()
        }
    }

    pub fn io_bound() -> Self {
        let num_cpus = num_cpus::get();
        Self {
            num_workers: num_cpus * 2,
            task_capacity: num_cpus * 100,
            result_capacity: num_cpus * 100,
            ..Default::default()
        }
    }

    pub fn with_workers(num_workers: usize) -> Self {
        Self {
            num_workers,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), PoolError> {
        if self.num_workers == 0 {
            return Err(PoolError::InvalidWorkerCount(self.num_workers));
        }
        if self.task_capacity == 0 || self.result_capacity == 0 || self.error_capacity == 0 {
            return Err(PoolError::InvalidConfig("queue capacities must be positive".into()));
        }
        if self.monitor_interval.is_zero() {
            return Err(PoolError::InvalidConfig("monitor interval must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.failure_rate) {
            return Err(PoolError::InvalidConfig(format!(
                "failure rate must be within [0, 1], got {}",
                self.failure_rate
            )));
        }
        Ok(())
    }
}


/// Счетчики, меняются только под одним мьютексом
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Counters {
    pub(crate) active_workers: usize,
    pub(crate) completed_tasks: u64,
    pub(crate) failed_tasks: u64,
    pub(crate) cancelled_tasks: u64,
}


pub type WorkerPool = Arc<WorkerPoolInner>;

/// Пул с фиксированным числом воркеров, ограниченными очередями и общим
/// сигналом отмены.
///
/// Жизненный цикл одноразовый: `start()` -> `submit()`... -> `stop()`.
/// Воркеры держат ссылку на пул, поэтому пул нужно явно остановить.
pub struct WorkerPoolInner {
    pub(crate) config: Config,
    pub(crate) queue: TaskQueue,
    pub(crate) counters: Mutex<Counters>,
    pub(crate) cancellation_token: CancellationToken,
    pub(crate) failure_policy: Arc<dyn FailurePolicy>,
    result_tx: Mutex<Option<mpsc::Sender<TaskResult>>>,
    error_tx: Mutex<Option<mpsc::Sender<SystemError>>>,
    results: PoolReceiver<TaskResult>,
    errors: PoolReceiver<SystemError>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
    stopping: AtomicBool,
    stopped: CancellationToken,
}

impl WorkerPoolInner {
    pub fn new(num_workers: usize) -> Result<WorkerPool, PoolError> {
        Self::with_config(Config::with_workers(num_workers))
    }

    pub fn with_config(config: Config) -> Result<WorkerPool, PoolError> {
        let policy = RandomFailure::new(config.failure_rate);
        Self::with_failure_policy(config, policy)
    }

    pub fn with_failure_policy<P>(config: Config, policy: P) -> Result<WorkerPool, PoolError>
    where
        P: FailurePolicy + 'static,
    {
        Self::build(config, Arc::new(policy), CancellationToken::new())
    }

    /// Отмена `parent` каскадно отменяет пул, но не наоборот
    pub fn with_parent_token<P>(
        config: Config,
        policy: P,
        parent: &CancellationToken,
    ) -> Result<WorkerPool, PoolError>
    where
        P: FailurePolicy + 'static,
    {
        Self::build(config, Arc::new(policy), parent.child_token())
    }

    fn build(
        config: Config,
        failure_policy: Arc<dyn FailurePolicy>,
        cancellation_token: CancellationToken,
    ) -> Result<WorkerPool, PoolError> {
        config.validate()?;

        let (result_tx, result_rx) = mpsc::channel(config.result_capacity);
        let (error_tx, error_rx) = mpsc::channel(config.error_capacity);

        Ok(Arc::new(WorkerPoolInner {
            queue: TaskQueue::new(config.task_capacity, config.dispatch),
            counters: Mutex::new(Counters::default()),
            cancellation_token,
            failure_policy,
            result_tx: Mutex::new(Some(result_tx)),
            error_tx: Mutex::new(Some(error_tx)),
            results: PoolReceiver::new(result_rx),
            errors: PoolReceiver::new(error_rx),
            handles: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
            stopped: CancellationToken::new(),
            config,
        }))
    }

    /// Запускает воркеры, монитор и (если задан) таймер дедлайна.
    /// Повторный вызов, как и вызов после остановки, ничего не делает.
    /// Должен вызываться внутри tokio runtime.
    pub fn start(self: &Arc<Self>) {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);

        if self.stopping.load(Ordering::Acquire) || self.cancellation_token.is_cancelled() {
            warn!("start() called on a stopped or cancelled pool, ignoring");
            return;
        }
        if self.started.swap(true, Ordering::AcqRel) {
            warn!("start() called more than once, ignoring");
            return;
        }

        let senders = (
            self.result_tx.lock().unwrap_or_else(PoisonError::into_inner).clone(),
            self.error_tx.lock().unwrap_or_else(PoisonError::into_inner).clone(),
        );
        let (Some(results), Some(errors)) = senders else {
            warn!("result queues already released, not starting workers");
            return;
        };

        for id in 0..self.config.num_workers {
            let pool = Arc::clone(self);
            let results = results.clone();
            let errors = errors.clone();
            handles.push(tokio::spawn(async move {
                pool.worker_loop(id, results, errors).await;
            }));
        }

        let pool = Arc::clone(self);
        handles.push(tokio::spawn(async move {
            pool.monitor_loop().await;
        }));

        if let Some(deadline) = self.config.deadline {
            let token = self.cancellation_token.clone();
            handles.push(tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(deadline) => {
                        info!(?deadline, "deadline reached, cancelling pool");
                        token.cancel();
                    }
                    _ = token.cancelled() => {}
                }
            }));
        }

        info!(
            workers = self.config.num_workers,
            capacity = self.queue.capacity(),
            dispatch = ?self.config.dispatch,
            "worker pool started"
        );
    }

    /// Ставит задачу в очередь, ожидая свободного места.
    /// Ошибка `ShuttingDown`, если отмена наступила раньше.
    pub async fn submit(&self, task: Task) -> Result<(), PoolError> {
        if self.cancellation_token.is_cancelled() {
            return Err(PoolError::ShuttingDown);
        }
        let task_id = task.id;
        let res = tokio::select! {
            biased;
            _ = self.cancellation_token.cancelled() => Err(PoolError::ShuttingDown),
            res = self.queue.push(task) => res,
        };
        if res.is_ok() {
            debug!(task = task_id, "task submitted");
        }
        res
    }

    /// Неблокирующая отправка; при отказе задача возвращается
    pub fn try_submit(&self, task: Task) -> Result<(), TrySubmitError> {
        if self.cancellation_token.is_cancelled() {
            return Err(TrySubmitError::ShuttingDown(task));
        }
        self.queue.try_push(task)
    }

    #[inline]
    pub fn results(&self) -> PoolReceiver<TaskResult> {
        self.results.clone()
    }

    #[inline]
    pub fn errors(&self) -> PoolReceiver<SystemError> {
        self.errors.clone()
    }

    /// Отменяет пул, дожидается выхода всех воркеров и монитора, затем
    /// закрывает очереди. Возвращает задачи, которые так и не были взяты в работу.
    ///
    /// Идемпотентен: повторные и конкурентные вызовы ждут завершения первого
    /// и возвращают пустой список.
    pub async fn stop(&self) -> Vec<Task> {
        if self.stopping.swap(true, Ordering::AcqRel) {
            self.stopped.cancelled().await;
            return Vec::new();
        }

        info!("stopping worker pool");
        self.cancellation_token.cancel();

        let handles = std::mem::take(&mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner));
        for joined in join_all(handles).await {
            if let Err(e) = joined {
                error!(error = %e, "pool task terminated abnormally");
            }
        }

        self.queue.close();
        let unclaimed = self.queue.drain();
        self.result_tx.lock().unwrap_or_else(PoisonError::into_inner).take();
        self.error_tx.lock().unwrap_or_else(PoisonError::into_inner).take();
        self.stopped.cancel();

        let stats = self.stats();
        info!(
            completed = stats.completed_tasks,
            failed = stats.failed_tasks,
            cancelled = stats.cancelled_tasks,
            unclaimed = unclaimed.len(),
            "worker pool stopped"
        );
        unclaimed
    }

    /// Только отменяет пул, без ожидания воркеров и освобождения очередей
    #[inline]
    pub fn cancel(&self) {
        self.cancellation_token.cancel();
    }

    #[inline]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::Acquire) && !self.cancellation_token.is_cancelled()
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stopped.is_cancelled()
    }

    #[inline]
    pub fn worker_count(&self) -> usize {
        self.config.num_workers
    }

    #[inline]
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Согласованный снимок счетчиков (читаются под одним захватом мьютекса)
    pub fn stats(&self) -> PoolStats {
        let counters = *self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        PoolStats {
            worker_count: self.config.num_workers,
            active_workers: counters.active_workers,
            completed_tasks: counters.completed_tasks,
            failed_tasks: counters.failed_tasks,
            cancelled_tasks: counters.cancelled_tasks,
            queued_tasks: self.queue.len(),
        }
    }

    /// `(active_workers, completed_tasks)`
    pub fn get_stats(&self) -> (usize, u64) {
        let counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        (counters.active_workers, counters.completed_tasks)
    }

    pub(crate) fn begin_task(&self) {
        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        counters.active_workers += 1;
    }

    pub(crate) fn finish_task(&self, result: &TaskResult) {
        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        counters.active_workers -= 1;
        counters.completed_tasks += 1;
        if result.is_cancelled() {
            counters.cancelled_tasks += 1;
        } else if !result.is_ok() {
            counters.failed_tasks += 1;
        }
    }
}
