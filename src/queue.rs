use super::{
    errors::{PoolError, TrySubmitError},
    model::{DispatchOrder, Task},
};
use std::{
    cmp::Ordering as CmpOrdering,
    collections::BinaryHeap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex, PoisonError,
    },
};
use crossbeam::queue::ArrayQueue;
use tokio::sync::{Semaphore, TryAcquireError};


struct Queued {
    seq: u64,
    task: Task,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    // max-heap: больший приоритет, затем меньший порядковый номер
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.task
            .priority
            .cmp(&other.task.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

enum Backlog {
    Fifo(ArrayQueue<Task>),
    Priority(Mutex<BinaryHeap<Queued>>),
}


/// Ограниченная MPMC очередь задач.
///
/// Емкость контролируется двумя семафорами: `slots` (свободные места) и
/// `items` (готовые к выдаче задачи). Разрешение берется до изменения хранилища
/// и "забывается", поэтому число задач в хранилище никогда не превышает емкость.
pub struct TaskQueue {
    backlog: Backlog,
    slots: Semaphore,
    items: Semaphore,
    sequence: AtomicU64,
    capacity: usize,
}

impl TaskQueue {
    pub fn new(capacity: usize, order: DispatchOrder) -> Self {
        let backlog = match order {
            DispatchOrder::Fifo => Backlog::Fifo(ArrayQueue::new(capacity)),
            DispatchOrder::Priority => {
                Backlog::Priority(Mutex::new(BinaryHeap::with_capacity(capacity)))
            }
        };
        Self {
            backlog,
            slots: Semaphore::new(capacity),
            items: Semaphore::new(0),
            sequence: AtomicU64::new(0),
            capacity,
        }
    }

    /// Ждет свободного места. Ошибка только если очередь закрыта.
    pub async fn push(&self, task: Task) -> Result<(), PoolError> {
        let permit = self
            .slots
            .acquire()
            .await
            .map_err(|_| PoolError::ShuttingDown)?;
        permit.forget();
        self.store(task);
        Ok(())
    }

    pub fn try_push(&self, task: Task) -> Result<(), TrySubmitError> {
        match self.slots.try_acquire() {
            Ok(permit) => {
                permit.forget();
                self.store(task);
                Ok(())
            }
            Err(TryAcquireError::NoPermits) => Err(TrySubmitError::Full(task)),
            Err(TryAcquireError::Closed) => Err(TrySubmitError::ShuttingDown(task)),
        }
    }

    /// Ждет задачу. `None` после `close()`.
    ///
    /// Между получением разрешения и извлечением задачи нет точек ожидания,
    /// поэтому отмена future не теряет задачу.
    pub async fn pop(&self) -> Option<Task> {
        let permit = self.items.acquire().await.ok()?;
        permit.forget();
        let task = self.take();
        self.slots.add_permits(1);
        task
    }

    pub fn try_pop(&self) -> Option<Task> {
        let permit = self.items.try_acquire().ok()?;
        permit.forget();
        let task = self.take();
        self.slots.add_permits(1);
        task
    }

    /// Будит всех ожидающих производителей и потребителей с ошибкой закрытия
    pub fn close(&self) {
        self.slots.close();
        self.items.close();
    }

    pub fn is_closed(&self) -> bool {
        self.items.is_closed()
    }

    /// Забирает все оставшиеся задачи в порядке выдачи
    pub fn drain(&self) -> Vec<Task> {
        let mut drained = Vec::with_capacity(self.len());
        while let Some(task) = self.take() {
            drained.push(task);
        }
        drained
    }

    #[inline]
    pub fn len(&self) -> usize {
        match &self.backlog {
            Backlog::Fifo(queue) => queue.len(),
            Backlog::Priority(heap) => heap.lock().unwrap_or_else(PoisonError::into_inner).len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn store(&self, task: Task) {
        match &self.backlog {
            Backlog::Fifo(queue) => {
                let pushed = queue.push(task);
                debug_assert!(pushed.is_ok(), "slot permit guarantees free space");
            }
            Backlog::Priority(heap) => {
                let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
                heap.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(Queued { seq, task });
            }
        }
        self.items.add_permits(1);
    }

    fn take(&self) -> Option<Task> {
        match &self.backlog {
            Backlog::Fifo(queue) => queue.pop(),
            Backlog::Priority(heap) => heap
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop()
                .map(|queued| queued.task),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fifo_keeps_submission_order() {
        let queue = TaskQueue::new(4, DispatchOrder::Fifo);
        for (id, priority) in [(1, 0), (2, 9), (3, 4)] {
            queue.try_push(Task::new(id, "p").with_priority(priority)).unwrap();
        }
        let ids: Vec<_> = std::iter::from_fn(|| queue.try_pop()).map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn priority_orders_by_priority_then_sequence() {
        let queue = TaskQueue::new(8, DispatchOrder::Priority);
        for (id, priority) in [(1, 1), (2, 5), (3, 1), (4, 5), (5, 3)] {
            queue.try_push(Task::new(id, "p").with_priority(priority)).unwrap();
        }
        let ids: Vec<_> = std::iter::from_fn(|| queue.try_pop()).map(|t| t.id).collect();
        assert_eq!(ids, vec![2, 4, 5, 1, 3]);
    }

    #[test]
    fn try_push_hands_task_back_when_full() {
        let queue = TaskQueue::new(1, DispatchOrder::Fifo);
        queue.try_push(Task::new(1, "a")).unwrap();
        let err = queue.try_push(Task::new(2, "b")).unwrap_err();
        assert!(matches!(err, TrySubmitError::Full(_)));
        assert_eq!(err.into_inner().id, 2);
        assert_eq!(queue.len(), 1);

        queue.close();
        let err = queue.try_push(Task::new(3, "c")).unwrap_err();
        assert!(matches!(err, TrySubmitError::ShuttingDown(_)));
    }

    #[tokio::test]
    async fn push_waits_for_free_slot() {
        let queue = std::sync::Arc::new(TaskQueue::new(1, DispatchOrder::Fifo));
        queue.push(Task::new(1, "a")).await.unwrap();

        let blocked = tokio::time::timeout(Duration::from_millis(30), queue.push(Task::new(2, "b"))).await;
        assert!(blocked.is_err(), "push into a full queue must wait");

        let producer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.push(Task::new(3, "c")).await })
        };
        assert_eq!(queue.pop().await.map(|t| t.id), Some(1));
        producer.await.unwrap().unwrap();
        assert_eq!(queue.pop().await.map(|t| t.id), Some(3));
    }

    #[tokio::test]
    async fn close_wakes_waiters_and_drain_returns_leftovers() {
        let queue = std::sync::Arc::new(TaskQueue::new(2, DispatchOrder::Fifo));
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.close();
        assert_eq!(consumer.await.unwrap(), None);
        assert!(queue.is_closed());
        assert_eq!(queue.push(Task::new(1, "a")).await, Err(PoolError::ShuttingDown));

        let queue = TaskQueue::new(2, DispatchOrder::Fifo);
        queue.try_push(Task::new(7, "x")).unwrap();
        queue.close();
        let left: Vec<_> = queue.drain().into_iter().map(|t| t.id).collect();
        assert_eq!(left, vec![7]);
        assert!(queue.is_empty());
    }
}
