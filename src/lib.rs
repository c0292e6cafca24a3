//! Ограниченный отменяемый пул воркеров поверх tokio
//!
//! # Features
//! - Фиксированное число воркеров и ограниченные очереди задач, результатов и ошибок
//! - Backpressure: `submit` ждет свободного места в очереди
//! - Общий сигнал отмены (`CancellationToken`) на всех точках ожидания
//! - Идемпотентные `start` / `stop`, остановка дожидается выхода всех воркеров
//! - FIFO или приоритетная выдача задач
//! - Подменяемая политика отказов для детерминированных тестов
//! - Периодический мониторинг утилизации

pub mod collector;
pub mod errors;
pub mod generator;
pub mod handle;
pub mod model;
pub mod monitor;
pub mod policy;
pub mod pool;
pub mod queue;
mod worker;

pub use errors::{PoolError, SystemError, TaskError, TrySubmitError};
pub use model::{DispatchOrder, PoolStats, Task, TaskResult};
pub use pool::{Config, WorkerPool, WorkerPoolInner};
