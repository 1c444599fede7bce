//! Bounded worker pool over the shared sample source.
//!
//! Each worker receives [`FetchTask`] requests via a crossbeam channel,
//! runs the query against the shared [`SampleSource`], and sends the
//! result back via a bounded(1) reply channel. Workers run until the
//! task channel closes; the pool joins them on drop.
//!
//! All sessions fetch through one pool, so a slow read for one session
//! delays others only through pool contention, never through a lock.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use tracing::debug;

use spikecast_core::{InitError, SampleBundle, SampleSource, SourceError, TrialId};

use crate::config::PoolConfig;

/// A task dispatched to a fetch worker.
struct FetchTask {
    kind: FetchKind,
    reply: Sender<Result<SampleBundle, SourceError>>,
}

enum FetchKind {
    /// Query a half-open index range.
    Range { start: u64, end: u64 },
    /// Query the span of one trial.
    Trial(TrialId),
}

/// Fixed pool of fetch worker threads over one shared source.
///
/// The task channel is bounded at `worker_count * 4`; a full channel
/// means the pool is saturated and the caller's budget should absorb
/// the wait rather than queueing unboundedly.
pub struct FetchPool {
    task_tx: Option<Sender<FetchTask>>,
    workers: Vec<JoinHandle<()>>,
}

impl FetchPool {
    /// Spawn the worker threads over `source`.
    pub fn new(source: Arc<dyn SampleSource>, config: &PoolConfig) -> Result<Self, InitError> {
        let worker_count = config.resolved_worker_count();
        let (task_tx, task_rx) = crossbeam_channel::bounded(worker_count * 4);

        let mut workers = Vec::with_capacity(worker_count);
        for i in 0..worker_count {
            let task_rx = task_rx.clone();
            let source = Arc::clone(&source);
            let handle = thread::Builder::new()
                .name(format!("replay-fetch-{i}"))
                .spawn(move || worker_loop(task_rx, source))
                .map_err(|e| InitError::ThreadSpawn {
                    reason: format!("fetch worker {i}: {e}"),
                })?;
            workers.push(handle);
        }
        debug!(worker_count, "fetch pool started");

        Ok(Self {
            task_tx: Some(task_tx),
            workers,
        })
    }

    /// Fetch the half-open sample range `[start, end)` within `budget`.
    ///
    /// The budget covers the whole round trip: enqueueing the task and
    /// waiting for the reply. A reply that arrives after the budget is
    /// discarded by the abandoned reply channel.
    pub fn fetch_range(
        &self,
        start: u64,
        end: u64,
        budget: Duration,
    ) -> Result<SampleBundle, SourceError> {
        self.dispatch(FetchKind::Range { start, end }, budget)
    }

    /// Fetch the full span of one trial within `budget`.
    pub fn fetch_trial(&self, trial: TrialId, budget: Duration) -> Result<SampleBundle, SourceError> {
        self.dispatch(FetchKind::Trial(trial), budget)
    }

    fn dispatch(
        &self,
        kind: FetchKind,
        budget: Duration,
    ) -> Result<SampleBundle, SourceError> {
        let task_tx = self.task_tx.as_ref().ok_or_else(|| SourceError::Unavailable {
            reason: "fetch pool shut down".into(),
        })?;

        let deadline = Instant::now() + budget;
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        let task = FetchTask {
            kind,
            reply: reply_tx,
        };

        task_tx
            .send_timeout(task, budget)
            .map_err(|_| SourceError::Unavailable {
                reason: "fetch pool saturated".into(),
            })?;

        reply_rx
            .recv_deadline(deadline)
            .map_err(|_| SourceError::Unavailable {
                reason: format!("fetch reply not received within {budget:?}"),
            })?
    }

    /// Close the task channel and join all workers.
    ///
    /// Idempotent; also invoked by `Drop`.
    pub fn shutdown(&mut self) {
        self.task_tx.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for FetchPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Main loop for one fetch worker thread.
///
/// Runs until the task channel is closed (sender dropped). Replies are
/// best-effort: a caller that timed out has dropped its receiver.
fn worker_loop(task_rx: Receiver<FetchTask>, source: Arc<dyn SampleSource>) {
    while let Ok(task) = task_rx.recv() {
        let result = match task.kind {
            FetchKind::Range { start, end } => source.query(start, end),
            FetchKind::Trial(trial) => source.query_by_trial(trial),
        };
        let _ = task.reply.send(result);
    }
    // Channel closed — worker exits cleanly.
}
