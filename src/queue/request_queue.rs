//! Rate-limited request queue — a single consumer runs queued operations
//! strictly in arrival order with a fixed delay after each one.

use std::future::Future;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

type Job = BoxFuture<'static, ()>;

/// Handle for enqueueing work. Clones share the same consumer.
#[derive(Clone)]
pub struct RequestQueue {
    jobs: mpsc::UnboundedSender<Job>,
}

impl RequestQueue {
    /// Start the queue and its consumer task. The consumer runs one
    /// operation at a time and sleeps `delay` between the end of one and
    /// the start of the next; it stops once every queue handle is gone.
    pub fn start(delay: Duration) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let handle = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                job.await;
                tokio::time::sleep(delay).await;
            }
            debug!("Request queue consumer stopped");
        });
        (Self { jobs: tx }, handle)
    }

    /// Queue an operation and return a receiver for its result without
    /// waiting for a turn. The operation runs only when the consumer
    /// reaches it; dropping the receiver abandons the result without
    /// disturbing the queue. If the consumer is gone the receiver
    /// resolves to an error.
    pub fn enqueue<T, F>(&self, op: F) -> oneshot::Receiver<T>
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            let _ = tx.send(op.await);
        });
        if self.jobs.send(job).is_err() {
            debug!("Request queue is closed, dropping operation");
        }
        rx
    }

    pub fn is_closed(&self) -> bool {
        self.jobs.is_closed()
    }
}
