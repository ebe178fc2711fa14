//! # Work Queue
//!
//! Delivers resource keys to a [`Reconcile`] implementation with the guarantees the
//! reconcilers rely on:
//!
//! - **Single flight**: at most one pass per key runs at a time. A key enqueued while its pass
//!   is running is run once more afterwards.
//! - **Deduplication**: a key waiting in the queue is queued only once.
//! - **Bounded parallelism**: up to `workers` passes for different keys run concurrently.
//! - **Retry with backoff**: a retryable failure re-enqueues the key after an exponentially
//!   growing delay.
//!
//! The queue itself is an actor: one task owns all bookkeeping and is driven by commands sent
//! from [`WorkQueue`] handles and from finished passes.

use crate::error::{Outcome, ReconcileError};
use crate::resource::ObjectKey;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const REPORT_CAPACITY: usize = 256;

/// One reconciliation pass for one key.
#[async_trait]
pub trait Reconcile: Send + Sync + 'static {
    async fn reconcile(
        &self,
        key: &ObjectKey,
        cancel: &CancellationToken,
    ) -> Result<Outcome, ReconcileError>;
}

/// Exponential backoff for failed passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Retries per key before giving up; `0` retries forever.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            max_attempts: 0,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (starting at 1).
    pub fn delay(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(20);
        self.base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }

    fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts != 0 && attempt > self.max_attempts
    }
}

/// Result of one finished pass, published to [`WorkQueue::subscribe`] receivers.
#[derive(Debug, Clone)]
pub struct PassReport {
    pub key: ObjectKey,
    /// Retries that preceded this pass.
    pub retries: u32,
    pub result: Result<Outcome, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("work queue has stopped")]
pub struct QueueClosed;

enum Command {
    Enqueue(ObjectKey),
    Done {
        key: ObjectKey,
        result: Result<Outcome, PassFailure>,
    },
}

enum PassFailure {
    Error(ReconcileError),
    Panicked,
}

/// Handle for feeding keys into a running queue. Cheap to clone.
#[derive(Clone)]
pub struct WorkQueue {
    sender: mpsc::UnboundedSender<Command>,
    reports: broadcast::Sender<PassReport>,
}

impl WorkQueue {
    /// Spawns the queue task. It runs until `cancel` fires, then waits for running passes.
    pub fn start(
        reconciler: Arc<dyn Reconcile>,
        workers: usize,
        retry: RetryPolicy,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (reports, _) = broadcast::channel(REPORT_CAPACITY);
        let runner = QueueRunner {
            reconciler,
            retry,
            cancel,
            workers: workers.max(1),
            semaphore: Arc::new(Semaphore::new(workers.max(1))),
            sender: sender.clone(),
            receiver,
            reports: reports.clone(),
            tasks: JoinSet::new(),
            pending: VecDeque::new(),
            queued: HashSet::new(),
            in_flight: HashSet::new(),
            dirty: HashSet::new(),
            attempts: HashMap::new(),
        };
        let handle = tokio::spawn(runner.run());
        (Self { sender, reports }, handle)
    }

    pub fn enqueue(&self, key: ObjectKey) -> Result<(), QueueClosed> {
        self.sender
            .send(Command::Enqueue(key))
            .map_err(|_| QueueClosed)
    }

    /// Receives a report for every pass finished after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<PassReport> {
        self.reports.subscribe()
    }
}

struct QueueRunner {
    reconciler: Arc<dyn Reconcile>,
    retry: RetryPolicy,
    cancel: CancellationToken,
    workers: usize,
    semaphore: Arc<Semaphore>,
    sender: mpsc::UnboundedSender<Command>,
    receiver: mpsc::UnboundedReceiver<Command>,
    reports: broadcast::Sender<PassReport>,
    tasks: JoinSet<()>,
    pending: VecDeque<ObjectKey>,
    queued: HashSet<ObjectKey>,
    in_flight: HashSet<ObjectKey>,
    dirty: HashSet<ObjectKey>,
    attempts: HashMap<ObjectKey, u32>,
}

impl QueueRunner {
    async fn run(mut self) {
        info!(workers = self.workers, "Work queue started");
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                Some(command) = self.receiver.recv() => self.handle(command),
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    if let Err(e) = joined {
                        warn!(error = %e, "Queue task ended abnormally");
                    }
                }
            }
            self.dispatch();
        }

        // Passes observe the token and stop at their next store call.
        while self.tasks.join_next().await.is_some() {}
        info!(pending = self.pending.len(), "Work queue stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Enqueue(key) => self.enqueue(key),
            Command::Done { key, result } => self.finish(key, result),
        }
    }

    fn enqueue(&mut self, key: ObjectKey) {
        if self.in_flight.contains(&key) {
            debug!(%key, "Pass running; will rerun");
            self.dirty.insert(key);
        } else if self.queued.insert(key.clone()) {
            self.pending.push_back(key);
        }
    }

    fn finish(&mut self, key: ObjectKey, result: Result<Outcome, PassFailure>) {
        self.in_flight.remove(&key);
        let retries = self.attempts.get(&key).copied().unwrap_or(0);

        let report = match result {
            Ok(outcome) => {
                self.attempts.remove(&key);
                Ok(outcome)
            }
            Err(failure) => {
                let (message, retryable) = match failure {
                    PassFailure::Error(e) => (e.to_string(), e.is_retryable()),
                    PassFailure::Panicked => ("reconcile pass panicked".to_string(), true),
                };
                let attempt = retries + 1;
                if retryable && !self.retry.exhausted(attempt) {
                    let delay = self.retry.delay(attempt);
                    warn!(%key, attempt, ?delay, error = %message, "Pass failed; retrying");
                    self.attempts.insert(key.clone(), attempt);
                    self.schedule_retry(key.clone(), delay);
                } else {
                    error!(%key, attempt, error = %message, "Pass failed; giving up");
                    self.attempts.remove(&key);
                }
                Err(message)
            }
        };

        let _ = self.reports.send(PassReport {
            key: key.clone(),
            retries,
            result: report,
        });

        if self.dirty.remove(&key) {
            self.enqueue(key);
        }
    }

    fn schedule_retry(&mut self, key: ObjectKey, delay: Duration) {
        let sender = self.sender.clone();
        let cancel = self.cancel.clone();
        self.tasks.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = sender.send(Command::Enqueue(key));
                }
            }
        });
    }

    fn dispatch(&mut self) {
        while !self.pending.is_empty() {
            let Ok(permit) = self.semaphore.clone().try_acquire_owned() else {
                break;
            };
            let Some(key) = self.pending.pop_front() else {
                break;
            };
            self.queued.remove(&key);
            self.in_flight.insert(key.clone());

            let reconciler = self.reconciler.clone();
            let cancel = self.cancel.clone();
            let sender = self.sender.clone();
            self.tasks.spawn(async move {
                let pass_key = key.clone();
                // A nested task turns a panicking pass into a reportable failure.
                let pass = tokio::spawn(async move { reconciler.reconcile(&pass_key, &cancel).await });
                let result = match pass.await {
                    Ok(Ok(outcome)) => Ok(outcome),
                    Ok(Err(e)) => Err(PassFailure::Error(e)),
                    Err(_) => Err(PassFailure::Panicked),
                };
                drop(permit);
                let _ = sender.send(Command::Done { key, result });
            });
        }
    }
}
