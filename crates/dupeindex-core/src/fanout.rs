//! Bounded fan-out with many-to-many emission.
//!
//! A [`FanOut`] owns a dedicated rayon pool of exactly `workers` threads. The
//! input source is pulled on the calling thread, so it does not have to be
//! `Send` (a SQLite row cursor is not); every item becomes one pool task. Tasks
//! emit any number of outputs through an [`Emitter`] backed by a crossbeam
//! channel. [`FanOut::run`] returns only after every task has finished, so the
//! returned [`Merged`] sequence is complete by the time the caller sees it.

use crate::error::Error;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::trace;

/// Queued-but-unstarted tasks allowed per worker before the feeder blocks.
const IN_FLIGHT_PER_WORKER: usize = 4;

pub struct FanOut {
    pool: ThreadPool,
    workers: usize,
}

/// Handle a worker uses to push outputs into the merged sequence.
pub struct Emitter<U> {
    tx: Sender<U>,
}

impl<U> Emitter<U> {
    pub fn emit(&self, item: U) {
        // The receiver lives until `run` returns, which is after every task.
        let _ = self.tx.send(item);
    }
}

/// Everything emitted during one [`FanOut::run`], in arrival order.
pub struct Merged<U> {
    rx: Receiver<U>,
}

impl<U> Iterator for Merged<U> {
    type Item = U;

    fn next(&mut self) -> Option<U> {
        // All senders are gone once `run` returns, so this never blocks.
        self.rx.recv().ok()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.rx.len();
        (n, Some(n))
    }
}

/// Releases an in-flight slot when a task ends, including by panic.
struct Permit<'a>(&'a Receiver<()>);

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        let _ = self.0.try_recv();
    }
}

impl FanOut {
    pub fn new(workers: usize) -> Result<Self, Error> {
        if workers == 0 {
            return Err(Error::InvalidConfig(
                "fan-out concurrency must be at least 1".to_string(),
            ));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("fanout-{}", i))
            .build()?;
        Ok(Self { pool, workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `worker` over every item of `items` on at most `workers` threads.
    ///
    /// The source is consumed exactly once, on the calling thread. A panic in
    /// any worker is re-raised here after the remaining tasks finish.
    pub fn run<I, U, F>(&self, items: I, worker: F) -> Merged<U>
    where
        I: IntoIterator,
        I::Item: Send,
        U: Send,
        F: Fn(I::Item, &Emitter<U>) + Send + Sync,
    {
        let (tx, rx) = unbounded();
        let (slot_tx, slot_rx) = bounded::<()>(self.workers * IN_FLIGHT_PER_WORKER);
        let worker = &worker;
        let slot_rx = &slot_rx;

        let mut dispatched = 0usize;
        self.pool.in_place_scope(|scope| {
            for item in items {
                // Blocks while the pool is saturated; both ends are held here.
                let _ = slot_tx.send(());
                let emitter = Emitter { tx: tx.clone() };
                scope.spawn(move |_| {
                    let _permit = Permit(slot_rx);
                    worker(item, &emitter);
                });
                dispatched += 1;
            }
        });
        drop(tx);

        trace!("Fan-out finished: {} items, {} outputs", dispatched, rx.len());
        Merged { rx }
    }
}
