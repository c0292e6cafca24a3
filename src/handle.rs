use std::sync::Arc;
use tokio::{
    sync::{
        mpsc::{self, error::TryRecvError},
        Mutex,
    },
    time::{error::Elapsed, Duration},
};


/// Read-only handle на поток результатов или системных ошибок пула.
///
/// Handle можно клонировать: все клоны читают один и тот же канал, каждое
/// значение получает ровно один читатель. Пока пул работает, пустой канал
/// остается открытым; после `stop()` и вычитывания буфера `recv` возвращает `None`.
pub struct PoolReceiver<T> {
    receiver: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> Clone for PoolReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            receiver: Arc::clone(&self.receiver),
        }
    }
}

impl<T> PoolReceiver<T> {
    pub(crate) fn new(receiver: mpsc::Receiver<T>) -> Self {
        Self {
            receiver: Arc::new(Mutex::new(receiver)),
        }
    }

    /// Следующее значение или `None`, если поток закрыт и пуст
    pub async fn recv(&self) -> Option<T> {
        self.receiver.lock().await.recv().await
    }

    /// `Empty` - данных пока нет, `Disconnected` - поток закрыт и пуст.
    ///
    /// Если другой клон сейчас ждет в `recv()`, канал занят и возвращается
    /// `Empty`, даже когда поток уже закрыт. Окончательный ответ о закрытии
    /// дает только `recv()` (`None`).
    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        match self.receiver.try_lock() {
            Ok(mut rx) => rx.try_recv(),
            Err(_) => Err(TryRecvError::Empty),
        }
    }

    pub async fn recv_timeout(&self, timeout: Duration) -> Result<Option<T>, Elapsed> {
        tokio::time::timeout(timeout, self.recv()).await
    }

    /// Вычитывает поток до закрытия
    pub async fn collect(&self) -> Vec<T> {
        let mut rx = self.receiver.lock().await;
        let mut out = Vec::new();
        while let Some(value) = rx.recv().await {
            out.push(value);
        }
        out
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closed_is_distinguishable_from_empty() {
        let (tx, rx) = mpsc::channel(4);
        let stream = PoolReceiver::new(rx);

        assert_eq!(stream.try_recv(), Err(TryRecvError::Empty));
        tx.send(1).await.unwrap();
        drop(tx);

        assert_eq!(stream.try_recv(), Ok(1));
        assert_eq!(stream.try_recv(), Err(TryRecvError::Disconnected));
        assert_eq!(stream.recv().await, None);
    }

    #[tokio::test]
    async fn clones_share_one_channel() {
        let (tx, rx) = mpsc::channel(4);
        let a = PoolReceiver::new(rx);
        let b = a.clone();
        tx.send("x").await.unwrap();
        tx.send("y").await.unwrap();
        drop(tx);

        assert_eq!(a.recv().await, Some("x"));
        assert_eq!(b.collect().await, vec!["y"]);
        assert_eq!(a.recv().await, None);
    }

    #[tokio::test]
    async fn try_recv_reports_empty_while_another_clone_waits() {
        let (tx, rx) = mpsc::channel::<u8>(1);
        let stream = PoolReceiver::new(rx);
        let waiter = {
            let stream = stream.clone();
            tokio::spawn(async move { stream.recv().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        drop(tx);
        assert_eq!(stream.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(waiter.await.unwrap(), None);
        assert_eq!(stream.try_recv(), Err(TryRecvError::Disconnected));
    }

    #[tokio::test]
    async fn recv_timeout_elapses_on_open_empty_stream() {
        let (_tx, rx) = mpsc::channel::<u8>(1);
        let stream = PoolReceiver::new(rx);
        assert!(stream.recv_timeout(Duration::from_millis(20)).await.is_err());
    }
}
