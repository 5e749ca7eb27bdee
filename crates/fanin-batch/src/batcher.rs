//! The batching engine: a single worker task draining a bounded
//! submission channel, forming size- and time-bounded batches, and
//! coalescing equivalent operations into one backend call each.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use metrics::{counter, histogram};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::BatchError;
use crate::executor::Executor;
use crate::request::{Operation, Request};

/// How long `shutdown` waits for the worker to drain in-flight batches
/// before aborting it. Aborting drops the pending requests' delivery
/// channels, which unblocks any caller still waiting.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Submission channel capacity, as a multiple of the batch cap. The
/// headroom absorbs bursts; a full channel suspends `submit`, which is
/// the agent's only backpressure mechanism.
const CHANNEL_BUFFER_FACTOR: usize = 10;

/// Batch formation policy.
#[derive(Debug, Clone)]
pub struct BatcherConfig {
    /// When false, every submitted request executes directly on the
    /// caller's task; no queue, no window, no coalescing.
    pub enabled: bool,
    /// Maximum time to wait after the first request of a batch before
    /// closing it.
    pub batch_window: Duration,
    /// Cap on requests per batch; a full batch closes without waiting
    /// for the window.
    pub max_batch_size: usize,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_window: Duration::from_millis(100),
            max_batch_size: 10,
        }
    }
}

/// Queues requests and coalesces equivalent ones into shared backend
/// calls.
///
/// Exactly one worker task consumes the submission channel; that single
/// consumer is the serialization point that makes per-batch grouping
/// correct without locks on the request path. Backend I/O suspends the
/// worker while the channel keeps buffering new submissions.
///
/// No ordering is guaranteed between concurrent submissions. Members of
/// one group all observe the result of the group's single backend call,
/// including its timestamps.
pub struct Batcher<E: Executor> {
    executor: Arc<E>,
    config: BatcherConfig,
    tx: Mutex<Option<mpsc::Sender<Request<E::Op, E::Reply>>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl<E: Executor> Batcher<E> {
    /// Creates the batcher and, when batching is enabled, spawns its
    /// worker task.
    pub fn new(executor: Arc<E>, config: BatcherConfig) -> Self {
        let (tx, worker) = if config.enabled {
            let capacity = config.max_batch_size.max(1) * CHANNEL_BUFFER_FACTOR;
            let (tx, rx) = mpsc::channel(capacity);
            let worker = tokio::spawn(run_worker(rx, Arc::clone(&executor), config.clone()));
            (Some(tx), Some(worker))
        } else {
            (None, None)
        };

        Self {
            executor,
            config,
            tx: Mutex::new(tx),
            worker: Mutex::new(worker),
            closed: AtomicBool::new(false),
        }
    }

    /// Submits a request for execution.
    ///
    /// With batching enabled this hands the request to the worker,
    /// suspending only when the submission channel is full. With
    /// batching disabled the operation executes on the caller's task
    /// before `submit` returns. Either way the outcome arrives on the
    /// request's delivery channel; once shutdown has begun the request
    /// is failed with [`BatchError::ShuttingDown`] instead.
    pub async fn submit(&self, request: Request<E::Op, E::Reply>) {
        counter!("fanin_requests_total").increment(1);

        if self.closed.load(Ordering::Acquire) {
            request.fail(BatchError::ShuttingDown);
            return;
        }

        if !self.config.enabled {
            counter!("fanin_backend_calls_total").increment(1);
            let group = vec![(request.op().clone(), vec![request])];
            execute_groups(&*self.executor, group).await;
            return;
        }

        // Clone the sender out of the lock; the lock is never held
        // across an await.
        let tx = self
            .tx
            .lock()
            .expect("batcher sender lock poisoned")
            .clone();

        match tx {
            Some(tx) => {
                if let Err(rejected) = tx.send(request).await {
                    rejected.0.fail(BatchError::ShuttingDown);
                }
            }
            None => request.fail(BatchError::ShuttingDown),
        }
    }

    /// Closes intake, drains in-flight batches, and releases the worker.
    ///
    /// Requests admitted before shutdown are still processed; requests
    /// submitted afterwards fail with [`BatchError::ShuttingDown`]. If
    /// the worker has not drained within [`SHUTDOWN_GRACE`] it is
    /// aborted, failing whatever was still pending. Idempotent.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);

        // Dropping the sender closes the channel: the Rust rendition of
        // closing the submission queue.
        drop(self.tx.lock().expect("batcher sender lock poisoned").take());

        let handle = self.worker.lock().expect("batcher worker lock poisoned").take();
        if let Some(mut handle) = handle {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await.is_err() {
                warn!(
                    grace = ?SHUTDOWN_GRACE,
                    "batch worker did not drain within the grace period, aborting"
                );
                handle.abort();
            }
        }
    }
}

/// Worker loop: one batch per iteration.
///
/// Blocks on the channel for the first request, then races further
/// receives against the batch window until the batch is full, the window
/// elapses, or intake closes. Channel closure ends the loop only after
/// the already-admitted requests have been processed.
async fn run_worker<E: Executor>(
    mut rx: mpsc::Receiver<Request<E::Op, E::Reply>>,
    executor: Arc<E>,
    config: BatcherConfig,
) {
    debug!(backend = executor.backend_name(), "batch worker started");

    while let Some(first) = rx.recv().await {
        let mut batch = Vec::with_capacity(config.max_batch_size);
        batch.push(first);

        let window = tokio::time::sleep(config.batch_window);
        tokio::pin!(window);

        while batch.len() < config.max_batch_size {
            tokio::select! {
                received = rx.recv() => match received {
                    Some(request) => batch.push(request),
                    // Intake closed mid-collection; what was admitted is
                    // still processed below.
                    None => break,
                },
                _ = &mut window => break,
            }
        }

        process_batch(&*executor, batch).await;
    }

    debug!("batch worker drained, exiting");
}

async fn process_batch<E: Executor>(executor: &E, batch: Vec<Request<E::Op, E::Reply>>) {
    let admitted = batch.len();
    let groups = group_requests(batch);

    counter!("fanin_batches_total").increment(1);
    histogram!("fanin_batch_size").record(admitted as f64);
    counter!("fanin_backend_calls_total").increment(groups.len() as u64);
    counter!("fanin_coalesced_requests_total").increment((admitted - groups.len()) as u64);
    debug!(requests = admitted, groups = groups.len(), "processing batch");

    execute_groups(executor, groups).await;
}

/// Groups a batch by operation grouping key, first-seen order.
fn group_requests<O: Operation, R>(
    batch: Vec<Request<O, R>>,
) -> Vec<(O, Vec<Request<O, R>>)> {
    let mut index: HashMap<O::GroupKey, usize> = HashMap::new();
    let mut groups: Vec<(O, Vec<Request<O, R>>)> = Vec::new();

    for request in batch {
        match index.get(&request.op().group_key()) {
            Some(&at) => groups[at].1.push(request),
            None => {
                index.insert(request.op().group_key(), groups.len());
                let representative = request.op().clone();
                groups.push((representative, vec![request]));
            }
        }
    }

    groups
}

/// Executes one batch's groups and distributes each group's single
/// outcome to every member.
async fn execute_groups<E: Executor>(
    executor: &E,
    groups: Vec<(E::Op, Vec<Request<E::Op, E::Reply>>)>,
) {
    if groups.is_empty() {
        return;
    }

    let ops: Vec<E::Op> = groups.iter().map(|(op, _)| op.clone()).collect();

    match executor.execute(&ops).await {
        Ok(results) => {
            if results.len() != groups.len() {
                warn!(
                    expected = groups.len(),
                    returned = results.len(),
                    "executor returned a misaligned result set"
                );
                let error = BatchError::Backend(
                    "backend returned a misaligned result set".to_string(),
                );
                fail_all(groups, error);
                return;
            }

            for ((op, members), result) in groups.into_iter().zip(results) {
                if let Err(error) = &result {
                    warn!(op = op.name(), %error, "group execution failed");
                }
                for request in members {
                    request.deliver(result.clone());
                }
            }
        }
        Err(error) => {
            warn!(%error, "batch execution failed");
            fail_all(groups, error);
        }
    }
}

fn fail_all<O: Operation, R>(groups: Vec<(O, Vec<Request<O, R>>)>, error: BatchError) {
    for (_, members) in groups {
        for request in members {
            request.fail(error.clone());
        }
    }
}
