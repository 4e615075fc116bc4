//! Barrier (all-or-none breakage model)
//!
//! A barrier is a meeting point for a fixed group of threads ("parties")
//! that must occasionally wait for each other. When the last party arrives
//! the cycle trips: an optional command runs once on the tripping thread,
//! then every party is released carrying its arrival index. Failed
//! synchronization attempts use an all-or-none model: if one party leaves
//! the cycle prematurely through a timeout or interrupt, the parties still
//! inside leave with `BrokenBarrier` until the cycle has drained and reset.
//! A drained barrier is indistinguishable from a fresh one and can be
//! reused indefinitely.

use crate::attributes::SyncAttributes;
use crate::monitor::Monitor;
use crate::semaphore::Semaphore;
use parking_lot::MutexGuard;
use rondo_core::error::SyncError;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

/// Trip action run once per successful cycle by the last-arriving party.
pub type BarrierCommand = Box<dyn FnMut() + Send>;

pub struct Barrier {
    monitor: Monitor<BarrierState>,
    /// Entry gate holding `parties` permits; admission to a cycle consumes
    /// one, cycle reset tops the gate back up.
    gate: Semaphore,
    parties: usize,
    attributes: SyncAttributes,
}

struct BarrierState {
    /// Parties currently inside the cycle.
    count: usize,
    /// Generation counter, incremented on every reset.
    resets: u64,
    broken: bool,
    triggered: bool,
    command: Option<BarrierCommand>,
}

impl Barrier {
    /// Create a barrier for `parties` threads with no trip action.
    pub fn new(parties: usize) -> Result<Self, SyncError> {
        Self::build(parties, None, SyncAttributes::default())
    }

    /// Create a barrier whose `command` runs once per successful cycle, on
    /// the last-arriving thread, before the other parties are released.
    pub fn with_command(
        parties: usize,
        command: impl FnMut() + Send + 'static,
    ) -> Result<Self, SyncError> {
        Self::build(parties, Some(Box::new(command)), SyncAttributes::default())
    }

    pub fn with_attributes(parties: usize, attributes: SyncAttributes) -> Result<Self, SyncError> {
        Self::build(parties, None, attributes)
    }

    fn build(
        parties: usize,
        command: Option<BarrierCommand>,
        attributes: SyncAttributes,
    ) -> Result<Self, SyncError> {
        if parties == 0 {
            return Err(SyncError::Initialization);
        }
        Ok(Self {
            monitor: Monitor::new(BarrierState {
                count: 0,
                resets: 0,
                broken: false,
                triggered: false,
                command,
            }),
            gate: Semaphore::new(parties),
            parties,
            attributes,
        })
    }

    /// Wait at the barrier, returning this party's arrival index in
    /// `0..parties`.
    ///
    /// `deadline` is absolute; `None` waits indefinitely. An expired
    /// deadline at the entry gate fails `Timeout` without touching the
    /// cycle; inside the cycle it breaks the barrier for everyone unless
    /// the cycle tripped or broke in the interim.
    pub fn barrier(&self, deadline: Option<Instant>) -> Result<usize, SyncError> {
        // Entry gate: admission into the current cycle.
        {
            let state = self.monitor.lock();
            if self.monitor.interrupted() {
                return Err(SyncError::Interrupted);
            }
            if state.triggered || state.broken || self.gate.permits() == 0 {
                return Err(SyncError::IllegalState);
            }
        }
        self.gate.acquire(deadline).map_err(|err| match err {
            SyncError::Interrupted => SyncError::Interrupted,
            SyncError::Timeout => SyncError::Timeout,
            _ => SyncError::IllegalState,
        })?;

        let mut state = self.monitor.lock();
        let resets = state.resets;
        let index = state.count;
        state.count += 1;

        match self.run_cycle(&mut state, resets, index, deadline) {
            Ok(index) => Ok(index),
            Err(err) => {
                self.fail_party(&mut state);
                Err(err)
            }
        }
    }

    /// Like [`barrier`](Self::barrier) with a deadline of `timeout` from now.
    pub fn barrier_for(&self, timeout: Duration) -> Result<usize, SyncError> {
        self.barrier(Some(Instant::now() + timeout))
    }

    fn run_cycle(
        &self,
        state: &mut MutexGuard<'_, BarrierState>,
        resets: u64,
        index: usize,
        deadline: Option<Instant>,
    ) -> Result<usize, SyncError> {
        loop {
            if self.monitor.interrupted() {
                return Err(SyncError::Interrupted);
            }
            if state.resets != resets {
                // The cycle was reset underneath us.
                return Err(SyncError::IllegalState);
            }
            if state.broken {
                return Err(SyncError::BrokenBarrier);
            }
            if state.triggered {
                state.count -= 1;
                if state.count > 0 {
                    self.monitor.notify_one();
                } else {
                    self.reset_cycle(state);
                }
                return Ok(index);
            }
            if self.gate.permits() > 0 {
                // Not the last party yet.
                match self.monitor.wait(state, deadline) {
                    Ok(()) => {}
                    Err(SyncError::Timeout) if state.triggered || state.broken => {
                        // The cycle completed or broke while the deadline
                        // fired; resolve it on the next pass.
                    }
                    Err(err @ (SyncError::Interrupted | SyncError::Timeout)) => return Err(err),
                    Err(_) => state.broken = true,
                }
            } else {
                state.triggered = true;
                tracing::debug!("barrier tripped with {} parties", self.parties);
                let trip = match state.command.as_mut() {
                    Some(command) => panic::catch_unwind(AssertUnwindSafe(|| command())),
                    None => Ok(()),
                };
                if let Err(payload) = trip {
                    // The trip action panicked: poison the cycle, do this
                    // party's bookkeeping, and let the panic continue.
                    self.fail_party(state);
                    panic::resume_unwind(payload);
                }
                self.monitor.notify_all();
            }
        }
    }

    /// Bookkeeping for a party leaving the cycle on a failure path: the
    /// remaining parties are poisoned, the last one out resets.
    fn fail_party(&self, state: &mut MutexGuard<'_, BarrierState>) {
        state.count = state.count.saturating_sub(1);
        if state.count > 0 {
            state.broken = true;
            self.monitor.notify_all();
        } else {
            self.reset_cycle(state);
        }
    }

    /// Return the barrier to its idle state. Called with the lock held by
    /// the last party out of a cycle, or by `wait_reset` on an idle one.
    fn reset_cycle(&self, state: &mut MutexGuard<'_, BarrierState>) {
        state.broken = false;
        state.triggered = false;
        state.count = 0;
        let missing = self.parties - self.gate.permits();
        if missing > 0 {
            self.gate.release(missing);
        }
        state.resets = state.resets.wrapping_add(1);
        self.monitor.clear_interrupt();
        self.gate.clear_interrupt();
        self.monitor.notify_one();
        tracing::debug!("barrier reset, generation {}", state.resets);
    }

    /// Block until the current cycle has fully drained and reset.
    ///
    /// A clean drain returns `Ok(())`. If the deadline expires (or a wait
    /// fails for any reason other than an interrupt) the barrier is forced
    /// broken, the deadline is disabled so the drain can complete, and the
    /// first error is returned once it has.
    pub fn wait_reset(&self, deadline: Option<Instant>) -> Result<(), SyncError> {
        if self.monitor.interrupted() {
            return Err(SyncError::Interrupted);
        }

        let mut deadline = deadline;
        let mut first_error = None;

        let mut state = self.monitor.lock();
        let resets = state.resets;
        while state.resets == resets {
            if state.count > 0 {
                match self.monitor.wait(&mut state, deadline) {
                    Ok(()) => {}
                    Err(SyncError::Interrupted) => return Err(SyncError::Interrupted),
                    Err(err) => {
                        first_error.get_or_insert(err);
                        state.broken = true;
                        self.monitor.notify_all();
                        deadline = None; // the drain must complete
                    }
                }
            } else {
                self.reset_cycle(&mut state);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Like [`wait_reset`](Self::wait_reset) with a deadline of `timeout`
    /// from now.
    pub fn wait_reset_for(&self, timeout: Duration) -> Result<(), SyncError> {
        self.wait_reset(Some(Instant::now() + timeout))
    }

    /// Replace the trip action. Takes effect from the next trip.
    pub fn set_barrier_command(&self, command: impl FnMut() + Send + 'static) {
        self.monitor.lock().command = Some(Box::new(command));
    }

    /// Number of parties required to trip the barrier.
    pub fn parties(&self) -> usize {
        self.parties
    }

    /// Whether the current cycle is poisoned.
    pub fn broken(&self) -> bool {
        self.monitor.lock().broken
    }

    /// Number of parties currently blocked inside the cycle.
    pub fn waiters(&self) -> usize {
        self.monitor.waiters()
    }

    pub fn interrupted(&self) -> bool {
        self.monitor.interrupted()
    }

    /// Latch the interrupt flag on both the monitor and the entry gate;
    /// parties inside the cycle and threads blocked at the gate fail out
    /// with `Interrupted`.
    pub fn interrupt(&self) {
        tracing::debug!("barrier interrupted");
        self.gate.interrupt();
        self.monitor.interrupt();
    }
}

impl Drop for Barrier {
    fn drop(&mut self) {
        self.interrupt();
        let deadline = Instant::now() + self.attributes.drain_timeout;
        let mut state = self.monitor.lock();
        while state.count > 0 {
            if self.monitor.drain_wait(&mut state, deadline) {
                break;
            }
        }
    }
}
