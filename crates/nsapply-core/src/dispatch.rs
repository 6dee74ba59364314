//! Bounded concurrent fan-out/fan-in over namespace apply tasks.
//!
//! One producer offers tasks onto a shared bounded queue; `width` workers
//! pull from it and push every outcome into a fan-in stream the caller
//! drains. A task's failure is just a failed [`ApplyResult`]; it never stops
//! sibling workers or the aggregator. Cancellation is cooperative: a shared
//! watch signal is checked at task boundaries and in-flight work finishes
//! naturally.

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::debug;

use crate::options::DEFAULT_DISPATCH_WIDTH;
use crate::pipeline::{ApplyResult, ApplyTask};

/// Fixed-width concurrent dispatcher.
///
/// The width stays small by default: each task spawns external tools and may
/// run for minutes, so the workload is process/IO bound and a wider pool
/// mostly risks exhausting the host.
#[derive(Debug, Clone, Copy)]
pub struct BoundedDispatcher {
    width: usize,
}

impl Default for BoundedDispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_DISPATCH_WIDTH)
    }
}

impl BoundedDispatcher {
    pub fn new(width: usize) -> Self {
        Self {
            width: width.max(1),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Run `executor` over every task and collect all results.
    ///
    /// Results carry no ordering guarantee beyond the order tasks were
    /// offered to the queue; the first free worker wins.
    pub async fn run<F, Fut>(&self, tasks: Vec<ApplyTask>, executor: F) -> Vec<ApplyResult>
    where
        F: Fn(ApplyTask) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApplyResult> + Send + 'static,
    {
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        self.run_with_cancel(tasks, cancel_rx, executor).await
    }

    /// Like [`run`](Self::run), stopping workers at their next task boundary
    /// once `cancel` turns true. In-flight tasks are not terminated.
    pub async fn run_with_cancel<F, Fut>(
        &self,
        tasks: Vec<ApplyTask>,
        cancel: watch::Receiver<bool>,
        executor: F,
    ) -> Vec<ApplyResult>
    where
        F: Fn(ApplyTask) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApplyResult> + Send + 'static,
    {
        let total = tasks.len();
        let executor = Arc::new(executor);

        let (task_tx, task_rx) = mpsc::channel::<ApplyTask>(self.width);
        let task_rx = Arc::new(Mutex::new(task_rx));
        let (result_tx, mut result_rx) = mpsc::unbounded_channel::<ApplyResult>();

        // Producer: offer tasks in order until consumed or cancelled.
        let producer = tokio::spawn(async move {
            for task in tasks {
                if task_tx.send(task).await.is_err() {
                    break;
                }
            }
        });

        let mut workers = Vec::with_capacity(self.width);
        for worker_id in 0..self.width {
            let task_rx = Arc::clone(&task_rx);
            let result_tx = result_tx.clone();
            let executor = Arc::clone(&executor);
            let cancel = cancel.clone();

            workers.push(tokio::spawn(async move {
                loop {
                    if *cancel.borrow() {
                        debug!(worker_id, "cancellation raised, stopping at task boundary");
                        break;
                    }

                    let task = { task_rx.lock().await.recv().await };
                    let Some(task) = task else {
                        break;
                    };

                    let result = executor(task).await;
                    if result_tx.send(result).is_err() {
                        break;
                    }
                }
            }));
        }
        // Workers hold the remaining senders; the fan-in drains until the
        // last worker exits. The receiver handle must go with them: once the
        // last worker drops its clone the task channel closes, which is what
        // unblocks a producer still offering tasks after cancellation.
        drop(result_tx);
        drop(task_rx);

        let mut results = Vec::with_capacity(total);
        while let Some(result) = result_rx.recv().await {
            results.push(result);
        }

        let _ = producer.await;
        join_all(workers).await;

        results
    }
}
