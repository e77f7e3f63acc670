//! Reconcile work queue and dispatch.
//!
//! Events enqueue resource names; the dispatcher deduplicates per key (at
//! most one pass in flight or pending for a given resource), runs passes
//! on a bounded worker pool, honors requeue-after as a non-error outcome,
//! and retries retryable failures with per-key Fibonacci backoff.
//!
//! There is no per-resource locking inside a pass: concurrent-safety
//! comes from the cluster API's optimistic concurrency on writes.

use crate::backoff::FibonacciBackoff;
use crate::cluster::ClusterAccess;
use crate::error::ControllerError;
use crate::reconciler::{Outcome, Reconciler};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, warn};

/// Handle for enqueuing reconcile requests, keyed by resource name.
#[derive(Debug, Clone)]
pub struct WorkQueue {
    tx: UnboundedSender<String>,
}

impl WorkQueue {
    /// Requests a reconcile of the named resource.
    pub fn enqueue(&self, key: String) {
        if self.tx.send(key).is_err() {
            warn!("Work queue closed, dropping reconcile request");
        }
    }
}

#[derive(Debug, Default)]
struct KeyState {
    in_flight: bool,
    dirty: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Pulls keys off the queue and runs reconcile passes on worker tasks.
pub struct Dispatcher<C> {
    reconciler: Arc<Reconciler<C>>,
    rx: UnboundedReceiver<String>,
    queue: WorkQueue,
    states: Arc<Mutex<HashMap<String, KeyState>>>,
    backoffs: Arc<Mutex<HashMap<String, FibonacciBackoff>>>,
    workers: Arc<Semaphore>,
    pass_timeout: Duration,
}

impl<C: ClusterAccess + 'static> Dispatcher<C> {
    /// Creates a dispatcher with `workers` concurrent passes and a
    /// per-pass deadline, returning the queue handle watchers feed.
    pub fn new(
        reconciler: Reconciler<C>,
        workers: usize,
        pass_timeout: Duration,
    ) -> (WorkQueue, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = WorkQueue { tx };
        let dispatcher = Self {
            reconciler: Arc::new(reconciler),
            rx,
            queue: queue.clone(),
            states: Arc::new(Mutex::new(HashMap::new())),
            backoffs: Arc::new(Mutex::new(HashMap::new())),
            workers: Arc::new(Semaphore::new(workers)),
            pass_timeout,
        };
        (queue, dispatcher)
    }

    /// Runs until every queue handle is dropped.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        while let Some(key) = self.rx.recv().await {
            {
                let mut states = lock(&self.states);
                let state = states.entry(key.clone()).or_default();
                if state.in_flight {
                    // collapse: one rerun covers any number of triggers
                    // that arrived while this key was busy
                    state.dirty = true;
                    continue;
                }
                state.in_flight = true;
            }

            let reconciler = Arc::clone(&self.reconciler);
            let states = Arc::clone(&self.states);
            let backoffs = Arc::clone(&self.backoffs);
            let workers = Arc::clone(&self.workers);
            let queue = self.queue.clone();
            let pass_timeout = self.pass_timeout;
            tokio::spawn(async move {
                let Ok(_permit) = workers.acquire_owned().await else {
                    return;
                };
                run_pass(&reconciler, &queue, &backoffs, pass_timeout, &key).await;

                let rerun = {
                    let mut states = lock(&states);
                    match states.get_mut(&key) {
                        Some(state) => {
                            state.in_flight = false;
                            let dirty = state.dirty;
                            state.dirty = false;
                            if !dirty {
                                states.remove(&key);
                            }
                            dirty
                        }
                        None => false,
                    }
                };
                if rerun {
                    queue.enqueue(key);
                }
            });
        }
        Ok(())
    }
}

/// One pass under its deadline, with scheduling of any follow-up trigger.
async fn run_pass<C: ClusterAccess>(
    reconciler: &Reconciler<C>,
    queue: &WorkQueue,
    backoffs: &Mutex<HashMap<String, FibonacciBackoff>>,
    pass_timeout: Duration,
    key: &str,
) {
    let result = match tokio::time::timeout(pass_timeout, reconciler.reconcile(key)).await {
        Ok(result) => result,
        Err(_) => Err(ControllerError::Timeout(pass_timeout)),
    };

    match result {
        Ok(Outcome::Done) => {
            lock(backoffs).remove(key);
        }
        Ok(Outcome::RequeueAfter(delay)) => {
            lock(backoffs).remove(key);
            debug!("Requeuing {} after {:?}", key, delay);
            schedule(queue.clone(), key.to_string(), delay);
        }
        Err(e) if e.is_retryable() => {
            let delay = lock(backoffs)
                .entry(key.to_string())
                .or_insert_with(|| FibonacciBackoff::new(1, 10))
                .next_backoff();
            warn!("Failed to reconcile {}: {}, retrying in {:?}", key, e, delay);
            schedule(queue.clone(), key.to_string(), delay);
        }
        Err(e) => {
            // construction-class failures: only a spec change can help,
            // and that change will arrive as a new event
            error!("Failed to reconcile {}: {}, waiting for next change", key, e);
        }
    }
}

fn schedule(queue: WorkQueue, key: String, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        queue.enqueue(key);
    });
}
