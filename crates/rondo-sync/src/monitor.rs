//! Monitor: one mutex paired with one condition variable
//!
//! Every primitive in this crate owns exactly one monitor and performs all
//! of its state transitions under the monitor lock. The monitor carries a
//! latched interrupt flag: once latched, waits fail with `Interrupted`
//! until the owning primitive resets it at the end of a cycle.

use parking_lot::{Condvar, Mutex, MutexGuard};
use rondo_core::error::SyncError;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

/// Mutex + condvar pair guarding a state value of type `S`.
pub struct Monitor<S> {
    state: Mutex<S>,
    condvar: Condvar,
    interrupted: AtomicBool,
    waiters: AtomicUsize,
}

impl<S> Monitor<S> {
    pub fn new(state: S) -> Self {
        Self {
            state: Mutex::new(state),
            condvar: Condvar::new(),
            interrupted: AtomicBool::new(false),
            waiters: AtomicUsize::new(0),
        }
    }

    /// Acquire the monitor lock.
    pub fn lock(&self) -> MutexGuard<'_, S> {
        self.state.lock()
    }

    /// Block until notified, interrupted, or past `deadline`.
    ///
    /// `None` waits indefinitely. The interrupt flag is checked before
    /// sleeping and again after waking; a latched interrupt is reported
    /// ahead of an expired deadline.
    pub fn wait(
        &self,
        guard: &mut MutexGuard<'_, S>,
        deadline: Option<Instant>,
    ) -> Result<(), SyncError> {
        if self.interrupted() {
            return Err(SyncError::Interrupted);
        }
        let timed_out = self.block(guard, deadline);
        if self.interrupted() {
            Err(SyncError::Interrupted)
        } else if timed_out {
            Err(SyncError::Timeout)
        } else {
            Ok(())
        }
    }

    /// Wait without honouring the interrupt flag. Destructors drain with
    /// this so their own `interrupt` call does not bounce the wait.
    /// Returns true once the deadline has passed.
    pub(crate) fn drain_wait(&self, guard: &mut MutexGuard<'_, S>, deadline: Instant) -> bool {
        self.block(guard, Some(deadline))
    }

    fn block(&self, guard: &mut MutexGuard<'_, S>, deadline: Option<Instant>) -> bool {
        self.waiters.fetch_add(1, Ordering::Relaxed);
        let timed_out = match deadline {
            Some(at) => self.condvar.wait_until(guard, at).timed_out(),
            None => {
                self.condvar.wait(guard);
                false
            }
        };
        self.waiters.fetch_sub(1, Ordering::Relaxed);
        timed_out
    }

    /// Wake one waiter.
    pub fn notify_one(&self) {
        self.condvar.notify_one();
    }

    /// Wake every waiter.
    pub fn notify_all(&self) {
        self.condvar.notify_all();
    }

    /// Latch the interrupt flag, then wake every waiter so it is observed.
    ///
    /// Takes the monitor lock: waiters check the flag under the lock before
    /// parking, so latching under it guarantees the wake-up cannot slip
    /// between a waiter's check and its park.
    pub fn interrupt(&self) {
        let _guard = self.state.lock();
        self.interrupted.store(true, Ordering::Release);
        self.condvar.notify_all();
    }

    pub fn interrupted(&self) -> bool {
        self.interrupted.load(Ordering::Acquire)
    }

    /// Drop the latch. Only a cycle reset may do this.
    pub(crate) fn clear_interrupt(&self) {
        self.interrupted.store(false, Ordering::Release);
    }

    /// Number of threads currently blocked in [`wait`](Self::wait).
    pub fn waiters(&self) -> usize {
        self.waiters.load(Ordering::Relaxed)
    }
}
