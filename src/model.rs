use super::errors::TaskError;
use std::time::Duration;


/// Единица работы: идентификатор, полезная нагрузка, длительность и приоритет.
/// После создания не изменяется.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: u64,
    pub payload: String,
    pub duration: Duration,
    /// Чем больше значение, тем срочнее задача.
    /// Учитывается только при `DispatchOrder::Priority`.
    pub priority: u32,
}

impl Task {
    pub fn new(id: u64, payload: impl Into<String>) -> Self {
        Self {
            id,
            payload: payload.into(),
            duration: Duration::ZERO,
            priority: 0,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }
}


/// Результат выполнения задачи.
/// `duration` - фактически измеренное время, а не запрошенное.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult {
    pub task_id: u64,
    pub output: Option<String>,
    pub error: Option<TaskError>,
    pub duration: Duration,
}

impl TaskResult {
    pub fn success(task_id: u64, output: String, duration: Duration) -> Self {
        Self {
            task_id,
            output: Some(output),
            error: None,
            duration,
        }
    }

    pub fn failure(task_id: u64, error: TaskError, duration: Duration) -> Self {
        Self {
            task_id,
            output: None,
            error: Some(error),
            duration,
        }
    }

    #[inline]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.error, Some(TaskError::Cancelled))
    }
}


/// Снимок статистики пула
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub worker_count: usize,
    pub active_workers: usize,
    /// Все завершенные задачи, включая упавшие и отмененные
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    pub cancelled_tasks: u64,
    pub queued_tasks: usize,
}

impl PoolStats {
    pub fn utilization(&self) -> f64 {
        if self.worker_count == 0 {
            return 0.0;
        }
        self.active_workers as f64 / self.worker_count as f64
    }

    pub fn idle_workers(&self) -> usize {
        self.worker_count.saturating_sub(self.active_workers)
    }

    pub fn success_rate(&self) -> f64 {
        if self.completed_tasks == 0 {
            return 1.0;
        }
        let succeeded = self
            .completed_tasks
            .saturating_sub(self.failed_tasks + self.cancelled_tasks);
        succeeded as f64 / self.completed_tasks as f64
    }
}


/// Порядок выдачи задач воркерам
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchOrder {
    /// Кто первым поставлен, тот первым и выдан. Приоритет только информационный.
    #[default]
    Fifo,
    /// Сначала больший приоритет, при равенстве - порядок постановки
    Priority,
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_ratios() {
        let stats = PoolStats {
            worker_count: 4,
            active_workers: 1,
            completed_tasks: 10,
            failed_tasks: 2,
            cancelled_tasks: 3,
            queued_tasks: 0,
        };
        assert_eq!(stats.utilization(), 0.25);
        assert_eq!(stats.idle_workers(), 3);
        assert_eq!(stats.success_rate(), 0.5);

        let empty = PoolStats::default();
        assert_eq!(empty.utilization(), 0.0);
        assert_eq!(empty.success_rate(), 1.0);
    }

    #[test]
    fn result_helpers() {
        let ok = TaskResult::success(1, "out".into(), Duration::ZERO);
        assert!(ok.is_ok());
        assert!(!ok.is_cancelled());

        let cancelled = TaskResult::failure(2, TaskError::Cancelled, Duration::ZERO);
        assert!(!cancelled.is_ok());
        assert!(cancelled.is_cancelled());
        assert!(cancelled.output.is_none());
    }
}
