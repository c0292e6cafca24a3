use super::model::Task;
use thiserror::Error;


/// Ошибки API пула (конструирование и отправка задач)
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum PoolError {
    #[error("worker count must be positive, got {0}")]
    InvalidWorkerCount(usize),
    #[error("invalid pool configuration: {0}")]
    InvalidConfig(String),
    #[error("worker pool is shutting down")]
    ShuttingDown,
}

/// Ошибка конкретной задачи. Передается как данные в `TaskResult::error`,
/// а не через границу пула.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum TaskError {
    #[error("task cancelled")]
    Cancelled,
    #[error("random error processing task {task_id}")]
    Processing { task_id: u64 },
    #[error("failure policy panicked: {0}")]
    Panicked(String),
}

/// Системная ошибка пула, не привязанная к результату задачи
#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("system error: {0}")]
pub struct SystemError(pub String);

/// Неблокирующая отправка не удалась, задача возвращается вызывающему
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum TrySubmitError {
    #[error("task queue is full")]
    Full(Task),
    #[error("worker pool is shutting down")]
    ShuttingDown(Task),
}

impl TrySubmitError {
    pub fn into_inner(self) -> Task {
        match self {
            TrySubmitError::Full(task) | TrySubmitError::ShuttingDown(task) => task,
        }
    }
}
