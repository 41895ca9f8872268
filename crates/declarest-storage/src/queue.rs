// SPDX-FileCopyrightText: 2026 Declarest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide FIFO write serializer.
//!
//! All mutations against one database connection funnel through a single
//! [`WriteQueue`]. Tasks execute strictly in submission order, one at a
//! time; each task resolves its own result channel, so one task's failure
//! never aborts its siblings. The queue imposes no timeout or cancellation
//! of its own -- a caller may stop awaiting a result, but the task still
//! runs to completion.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use declarest_core::Error;

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

/// FIFO serializer guaranteeing at most one in-flight mutation per backing
/// connection.
#[derive(Clone)]
pub struct WriteQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl WriteQueue {
    /// Create a queue and spawn its drain task. Draining happens
    /// automatically whenever a task lands on an idle queue.
    pub fn new() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                job.await;
            }
            debug!("write queue closed");
        });
        WriteQueue { tx }
    }

    /// Submit a task. The task is enqueued immediately, before the returned
    /// future is first polled, so submission order is the call order.
    pub fn enqueue<T, F>(&self, task: F) -> impl Future<Output = Result<T, Error>>
    where
        F: Future<Output = Result<T, Error>> + Send + 'static,
        T: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            // A dropped receiver means the caller stopped waiting; the task
            // has already run to completion either way.
            let _ = done_tx.send(task.await);
        });
        let queued = self.tx.send(job).is_ok();
        async move {
            if !queued {
                return Err(Error::Internal("write queue is shut down".into()));
            }
            done_rx
                .await
                .map_err(|_| Error::Internal("write task dropped before completion".into()))?
        }
    }
}

impl Default for WriteQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Mutex;

    #[tokio::test]
    async fn tasks_run_in_submission_order() {
        let queue = WriteQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut results = Vec::new();
        for i in 0..10u32 {
            let log = Arc::clone(&log);
            // Earlier tasks sleep longer; FIFO order must still hold.
            let pause = Duration::from_millis(u64::from(10 - i));
            results.push(queue.enqueue(async move {
                tokio::time::sleep(pause).await;
                log.lock().await.push(i);
                Ok(i)
            }));
        }
        let outcomes = futures::future::join_all(results).await;

        assert_eq!(*log.lock().await, (0..10).collect::<Vec<_>>());
        for (i, outcome) in outcomes.into_iter().enumerate() {
            assert_eq!(outcome.unwrap(), i as u32);
        }
    }

    #[tokio::test]
    async fn a_failing_task_does_not_abort_siblings() {
        let queue = WriteQueue::new();
        let ok = queue.enqueue(async { Ok::<_, Error>(1) });
        let bad = queue.enqueue(async { Err::<u32, _>(Error::Internal("boom".into())) });
        let after = queue.enqueue(async { Ok::<_, Error>(3) });

        assert_eq!(ok.await.unwrap(), 1);
        assert!(bad.await.is_err());
        assert_eq!(after.await.unwrap(), 3);
    }

    #[tokio::test]
    async fn enqueue_on_idle_queue_drains_without_caller_action() {
        let queue = WriteQueue::new();
        // First burst fully drains.
        queue.enqueue(async { Ok::<_, Error>(()) }).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        // A later task on the now-idle queue still runs.
        let v = queue.enqueue(async { Ok::<_, Error>(42) }).await.unwrap();
        assert_eq!(v, 42);
    }

    #[tokio::test]
    async fn abandoned_result_still_executes_the_task() {
        let queue = WriteQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let log_a = Arc::clone(&log);
        let abandoned = queue.enqueue(async move {
            log_a.lock().await.push("a");
            Ok(())
        });
        drop(abandoned);

        let log_b = Arc::clone(&log);
        queue
            .enqueue(async move {
                log_b.lock().await.push("b");
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(*log.lock().await, vec!["a", "b"]);
    }
}
