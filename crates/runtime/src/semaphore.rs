//! A weighted semaphore that admits waiters in priority order.
//!
//! OLAP statements carry a caller-supplied priority; when the pool is
//! contended, queued higher-priority work is admitted first and equal
//! priorities drain in arrival order. Running work is never preempted, and
//! starvation of low-priority waiters is accepted by design of the callers.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::Mutex;

use thiserror::Error;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("semaphore wait cancelled")]
pub struct Cancelled;

/// Waiters sort by `(priority desc, arrival asc)`; `BTreeMap` iteration
/// order gives us the admission order directly.
type WaiterKey = (Reverse<i32>, u64);

struct State {
    in_use: usize,
    next_seq: u64,
    waiters: BTreeMap<WaiterKey, oneshot::Sender<()>>,
}

pub struct PrioritySemaphore {
    capacity: usize,
    state: Mutex<State>,
}

impl PrioritySemaphore {
    /// `capacity` must be at least 1.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "semaphore capacity must be at least 1");
        Self {
            capacity,
            state: Mutex::new(State {
                in_use: 0,
                next_seq: 0,
                waiters: BTreeMap::new(),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently held.
    pub fn in_use(&self) -> usize {
        self.state.lock().unwrap().in_use
    }

    /// Waiters currently queued.
    pub fn waiting(&self) -> usize {
        self.state.lock().unwrap().waiters.len()
    }

    /// Acquires one permit, waiting behind any higher-priority (or
    /// equal-priority, earlier) waiters. Returns [`Cancelled`] without
    /// consuming a permit if `cancel` fires first.
    pub async fn acquire(&self, cancel: &CancellationToken, priority: i32) -> Result<(), Cancelled> {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }
        let (key, rx) = {
            let mut s = self.state.lock().unwrap();
            if s.in_use < self.capacity && s.waiters.is_empty() {
                s.in_use += 1;
                return Ok(());
            }
            let key = (Reverse(priority), s.next_seq);
            s.next_seq += 1;
            let (tx, rx) = oneshot::channel();
            s.waiters.insert(key, tx);
            (key, rx)
        };

        let mut wait = Waiter {
            sem: self,
            key,
            rx,
            finished: false,
        };
        match cancel.run_until_cancelled(&mut wait.rx).await {
            Some(Ok(())) => {
                // The releaser handed its permit to us; in_use is unchanged.
                wait.finished = true;
                Ok(())
            }
            Some(Err(_)) => {
                // Semaphore dropped while we were queued.
                wait.finished = true;
                Err(Cancelled)
            }
            None => {
                wait.finished = true;
                self.forget_waiter(key, &mut wait.rx);
                Err(Cancelled)
            }
        }
    }

    /// Returns one permit. Must be called exactly once per successful
    /// [`acquire`](Self::acquire); the permit is handed directly to the
    /// highest-priority waiter if any is queued.
    pub fn release(&self) {
        let mut s = self.state.lock().unwrap();
        loop {
            match s.waiters.pop_first() {
                Some((_, tx)) => {
                    // Send under the lock so a cancelling waiter that finds
                    // its entry gone can rely on the permit being in its
                    // channel already.
                    if tx.send(()).is_ok() {
                        return;
                    }
                    // Receiver was dropped; try the next waiter.
                }
                None => {
                    debug_assert!(s.in_use > 0, "release without matching acquire");
                    s.in_use = s.in_use.saturating_sub(1);
                    return;
                }
            }
        }
    }

    /// Removes a waiter that gave up. If the entry is already gone, the
    /// permit was handed over concurrently and must be returned.
    fn forget_waiter(&self, key: WaiterKey, rx: &mut oneshot::Receiver<()>) {
        let removed = self.state.lock().unwrap().waiters.remove(&key).is_some();
        if !removed && rx.try_recv().is_ok() {
            self.release();
        }
    }
}

/// Cleans up the queue entry when an `acquire` future is dropped without
/// completing (e.g. a timed-out caller).
struct Waiter<'a> {
    sem: &'a PrioritySemaphore,
    key: WaiterKey,
    rx: oneshot::Receiver<()>,
    finished: bool,
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.sem.forget_waiter(self.key, &mut self.rx);
        }
    }
}
