use super::{
    errors::{SystemError, TaskError},
    model::{Task, TaskResult},
    pool::WorkerPoolInner,
};
use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
};
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    time::Instant,
};
use tracing::{debug, trace, warn};


impl WorkerPoolInner {
    /// Цикл одного воркера. Завершается только по отмене пула:
    /// ошибки задач передаются как данные в `TaskResult`.
    pub(crate) async fn worker_loop(
        &self,
        id: usize,
        results: mpsc::Sender<TaskResult>,
        errors: mpsc::Sender<SystemError>,
    ) {
        debug!(worker = id, "worker started");

        loop {
            let task = tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => break,
                task = self.queue.pop() => match task {
                    Some(task) => task,
                    None => break,
                },
            };

            self.begin_task();
            debug!(worker = id, task = task.id, priority = task.priority, "worker started task");

            let result = self.process_task(&task, &errors).await;
            self.finish_task(&result);

            trace!(worker = id, task = task.id, ok = result.is_ok(), elapsed = ?result.duration, "task finished");
            if !self.publish(&results, result).await {
                debug!(worker = id, task = task.id, "result dropped, pool is shutting down");
            }
        }

        debug!(worker = id, "worker shutting down");
    }

    /// Имитирует работу длительностью `task.duration`, прерываемую отменой пула
    pub(crate) async fn process_task(
        &self,
        task: &Task,
        errors: &mpsc::Sender<SystemError>,
    ) -> TaskResult {
        let started = Instant::now();

        tokio::select! {
            _ = tokio::time::sleep(task.duration) => {}
            _ = self.cancellation_token.cancelled() => {
                return TaskResult::failure(task.id, TaskError::Cancelled, started.elapsed());
            }
        }

        let policy = &self.failure_policy;
        match panic::catch_unwind(AssertUnwindSafe(|| policy.should_fail(task))) {
            Ok(false) => TaskResult::success(
                task.id,
                format!("Processed task {}: {}", task.id, task.payload),
                started.elapsed(),
            ),
            Ok(true) => TaskResult::failure(
                task.id,
                TaskError::Processing { task_id: task.id },
                started.elapsed(),
            ),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(task = task.id, %message, "failure policy panicked");
                let fault = SystemError(format!(
                    "failure policy panicked on task {}: {}",
                    task.id, message
                ));
                self.report_fault(errors, fault);
                TaskResult::failure(task.id, TaskError::Panicked(message), started.elapsed())
            }
        }
    }

    /// Очередь ошибок не участвует в управлении потоком задач:
    /// если она заполнена или закрыта, ошибка только пишется в лог.
    pub(crate) fn report_fault(&self, errors: &mpsc::Sender<SystemError>, fault: SystemError) {
        match errors.try_send(fault) {
            Ok(()) => {}
            Err(TrySendError::Full(fault)) => {
                warn!(error = %fault, "error queue is full, system error dropped");
            }
            Err(TrySendError::Closed(fault)) => {
                debug!(error = %fault, "error queue is closed, system error dropped");
            }
        }
    }

    /// Отправка в ограниченную очередь с приоритетом над отменой: если место
    /// есть, значение доставляется даже во время остановки. Иначе ожидание
    /// прерывается отменой и возвращается `false`.
    pub(crate) async fn publish<T>(&self, tx: &mpsc::Sender<T>, value: T) -> bool {
        tokio::select! {
            biased;
            sent = tx.send(value) => sent.is_ok(),
            _ = self.cancellation_token.cancelled() => false,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
