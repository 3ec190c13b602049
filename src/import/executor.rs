//! Bounded-concurrency batch execution with retry, backoff and session
//! repair.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::bolt::{ClientSession, SessionFactory, SessionStatus};
use crate::error::{ClientError, Result};
use crate::import::batch::Batch;
use crate::import::future::{pair_with_notifier, Future};
use crate::import::notifier::{Notifier, ReadinessToken};
use crate::import::pool::WorkerPool;
use crate::input::source::Query;

/// A batch that keeps failing is abandoned once it has burned this many
/// attempts; statements that can never succeed would otherwise retry
/// forever.
pub const MAX_BATCH_ATTEMPTS: u64 = 32;

/// Owns the worker pool and one long-lived session per worker slot.
/// Parallel lanes fan out over all slots; serial phases run on slot 0.
pub struct BatchRunner<F: SessionFactory + 'static> {
    pool: WorkerPool,
    factory: Arc<F>,
    sessions: Arc<Vec<Mutex<F::Session>>>,
}

impl<F: SessionFactory + 'static> BatchRunner<F> {
    /// Opens `workers` sessions up front. A connection failure here is
    /// fatal for the whole import.
    pub fn new(factory: F, workers: usize) -> Result<Self> {
        assert!(workers > 0, "import needs at least one worker");
        let factory = Arc::new(factory);
        let mut sessions = Vec::with_capacity(workers);
        for _ in 0..workers {
            sessions.push(Mutex::new(factory.open()?));
        }
        Ok(Self {
            pool: WorkerPool::new(workers),
            factory,
            sessions: Arc::new(sessions),
        })
    }

    pub fn workers(&self) -> usize {
        self.pool.workers()
    }

    /// Executes statements one at a time on slot 0's session, each in its
    /// own auto-committed transaction. Any error is fatal to the caller.
    pub fn run_serial(&self, queries: &[Query]) -> Result<u64> {
        if queries.is_empty() {
            return Ok(0);
        }
        let mut session = self.sessions[0].lock();
        if session.status() == SessionStatus::Bad {
            *session = self.factory.open()?;
        }
        let mut executed = 0u64;
        for query in queries {
            session.execute(&query.text)?;
            executed += 1;
        }
        Ok(executed)
    }

    /// Executes one lane to completion. Returns how many batches flipped to
    /// executed, which equals the lane length on success.
    ///
    /// Each scheduling round picks up to `workers` unexecuted batches in
    /// index order; the position within the round pins the task to that
    /// slot's session. The round's promises notify a shared readiness
    /// channel, and the caller drains exactly one token per dispatched
    /// batch before scheduling the next round, so batch state is never
    /// read while a task could still be writing it.
    pub fn run_parallel(&self, batches: Arc<Vec<Batch>>) -> Result<u64> {
        if batches.is_empty() {
            return Ok(0);
        }
        let notifier = Notifier::new();
        let executed = Arc::new(AtomicU64::new(0));
        let mut round_futures: Vec<Future<bool>> = Vec::new();

        loop {
            if executed.load(Ordering::SeqCst) >= batches.len() as u64 {
                break;
            }
            for batch in batches.iter() {
                if !batch.is_executed() && batch.attempts() >= MAX_BATCH_ATTEMPTS {
                    return Err(ClientError::RetriesExhausted(batch.index(), batch.attempts()));
                }
            }

            let mut dispatched = 0usize;
            for (position, batch) in batches.iter().enumerate() {
                if dispatched >= self.workers() {
                    break;
                }
                if batch.is_executed() {
                    continue;
                }
                let slot = dispatched;
                dispatched += 1;

                let token = ReadinessToken(position);
                let fill_notifier = {
                    let notifier = notifier.clone();
                    move || notifier.notify(token)
                };
                let (future, promise) = pair_with_notifier(fill_notifier);
                round_futures.push(future);

                let batches = Arc::clone(&batches);
                let sessions = Arc::clone(&self.sessions);
                let factory = Arc::clone(&self.factory);
                let executed = Arc::clone(&executed);
                self.pool.submit(move || {
                    let batch = &batches[position];
                    let backoff = batch.backoff_ms();
                    if backoff > 1 {
                        debug!(batch = batch.index(), backoff_ms = backoff, "import.executor.backoff");
                        thread::sleep(Duration::from_millis(backoff));
                    }
                    let mut session = sessions[slot].lock();
                    match execute_batch(&mut *session, batch) {
                        Ok(()) => {
                            batch.mark_executed();
                            executed.fetch_add(1, Ordering::SeqCst);
                            debug!(batch = batch.index(), "import.executor.batch_done");
                            promise.fill(true);
                        }
                        Err(err) => {
                            let attempts = batch.record_failure();
                            warn!(
                                batch = batch.index(),
                                attempts,
                                error = %err,
                                "import.executor.batch_failed"
                            );
                            promise.fill(false);
                        }
                    }
                    if session.status() == SessionStatus::Bad {
                        match factory.open() {
                            Ok(fresh) => {
                                *session = fresh;
                                warn!(slot, "import.executor.session_replaced");
                            }
                            Err(err) => {
                                warn!(slot, error = %err, "import.executor.reconnect_failed");
                            }
                        }
                    }
                });
            }

            for _ in 0..dispatched {
                notifier.await_one();
            }
            round_futures.clear();
        }
        Ok(executed.load(Ordering::SeqCst))
    }
}

/// Runs every statement of the batch inside one explicit transaction, so
/// the batch either commits whole or leaves no side effects. The session
/// is handed back with no transaction open: a statement failure usually
/// aborts it server-side already, and the rollback covers any path where
/// it survives.
fn execute_batch<S: ClientSession>(session: &mut S, batch: &Batch) -> Result<()> {
    session.begin()?;
    for query in batch.queries() {
        if let Err(err) = session.execute(&query.text) {
            if session.status() == SessionStatus::Good {
                // Best effort; the batch already failed either way.
                let _ = session.rollback();
            }
            return Err(err);
        }
    }
    session.commit()
}
