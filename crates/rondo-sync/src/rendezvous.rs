//! Rendezvous (value-exchanging barrier)
//!
//! A rendezvous is a barrier at which each arriving party contributes a
//! value. When the last party arrives, an exchange function transforms the
//! collected slot vector once, on the arriving thread, and every party is
//! released with the value sitting in its arrival slot. The default
//! exchange is [`rotate`], which hands each party the contribution of the
//! next arrival, so a two-party rendezvous behaves as an exchanger.
//!
//! Breakage follows the same all-or-none model as
//! [`Barrier`](crate::barrier::Barrier): a timeout, interrupt, or a panic
//! in the exchange function poisons the cycle for every party still inside,
//! and the rendezvous is reusable once the cycle has drained and reset.

use crate::attributes::SyncAttributes;
use crate::monitor::Monitor;
use crate::semaphore::Semaphore;
use parking_lot::MutexGuard;
use rondo_core::error::SyncError;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

/// Exchange function applied to the slot vector by the last-arriving party.
pub type RendezvousFunction<T> = Box<dyn FnMut(&mut Vec<T>) + Send>;

/// Default exchange function: left-rotate the slots by one so the party
/// that arrived at index `i` receives the contribution of index
/// `(i + 1) % parties`. Values are moved, never inspected.
pub fn rotate<T>(slots: &mut Vec<T>) {
    if !slots.is_empty() {
        slots.rotate_left(1);
    }
}

pub struct Rendezvous<T> {
    monitor: Monitor<RendezvousState<T>>,
    gate: Semaphore,
    parties: usize,
    attributes: SyncAttributes,
}

struct RendezvousState<T> {
    count: usize,
    resets: u64,
    broken: bool,
    triggered: bool,
    /// One contribution per party, in arrival order.
    slots: Vec<T>,
    function: RendezvousFunction<T>,
}

impl<T: Clone + Send + 'static> Rendezvous<T> {
    /// Create a rendezvous for `parties` threads using the [`rotate`]
    /// exchange.
    pub fn new(parties: usize) -> Result<Self, SyncError> {
        Self::build(parties, Box::new(rotate), SyncAttributes::default())
    }

    /// Create a rendezvous with a custom exchange function.
    pub fn with_function(
        parties: usize,
        function: impl FnMut(&mut Vec<T>) + Send + 'static,
    ) -> Result<Self, SyncError> {
        Self::build(parties, Box::new(function), SyncAttributes::default())
    }

    pub fn with_attributes(parties: usize, attributes: SyncAttributes) -> Result<Self, SyncError> {
        Self::build(parties, Box::new(rotate), attributes)
    }

    fn build(
        parties: usize,
        function: RendezvousFunction<T>,
        attributes: SyncAttributes,
    ) -> Result<Self, SyncError> {
        if parties == 0 {
            return Err(SyncError::Initialization);
        }
        Ok(Self {
            monitor: Monitor::new(RendezvousState {
                count: 0,
                resets: 0,
                broken: false,
                triggered: false,
                // Headroom for exchange functions that grow before trimming.
                slots: Vec::with_capacity(parties + 2),
                function,
            }),
            gate: Semaphore::new(parties),
            parties,
            attributes,
        })
    }

    /// Meet the other parties, contributing `value` and returning the value
    /// left in this party's slot by the exchange function.
    ///
    /// `deadline` is absolute; `None` waits indefinitely.
    pub fn rendezvous(&self, value: T, deadline: Option<Instant>) -> Result<T, SyncError> {
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
        state.slots.push(value);

        match self.run_cycle(&mut state, resets, index, deadline) {
            Ok(value) => Ok(value),
            Err(err) => {
                self.fail_party(&mut state);
                Err(err)
            }
        }
    }

    /// Like [`rendezvous`](Self::rendezvous) with a deadline of `timeout`
    /// from now.
    pub fn rendezvous_for(&self, value: T, timeout: Duration) -> Result<T, SyncError> {
        self.rendezvous(value, Some(Instant::now() + timeout))
    }

    fn run_cycle(
        &self,
        state: &mut MutexGuard<'_, RendezvousState<T>>,
        resets: u64,
        index: usize,
        deadline: Option<Instant>,
    ) -> Result<T, SyncError> {
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
                let value = state.slots[index].clone();
                state.count -= 1;
                if state.count > 0 {
                    self.monitor.notify_one();
                } else {
                    self.reset_cycle(state);
                }
                return Ok(value);
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
                tracing::debug!("rendezvous tripped with {} parties", self.parties);
                let inner = &mut **state;
                let slots = &mut inner.slots;
                let function = &mut inner.function;
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| function(slots))) {
                    // The exchange function panicked: poison the cycle, do
                    // this party's bookkeeping, and let the panic continue.
                    self.fail_party(state);
                    panic::resume_unwind(payload);
                }
                self.monitor.notify_all();
            }
        }
    }

    /// Bookkeeping for a party leaving the cycle on a failure path: the
    /// remaining parties are poisoned, the last one out resets.
    fn fail_party(&self, state: &mut MutexGuard<'_, RendezvousState<T>>) {
        state.count = state.count.saturating_sub(1);
        if state.count > 0 {
            state.broken = true;
            self.monitor.notify_all();
        } else {
            self.reset_cycle(state);
        }
    }

    /// Return the rendezvous to its idle state. Called with the lock held
    /// by the last party out of a cycle, or by `wait_reset` on an idle one.
    fn reset_cycle(&self, state: &mut MutexGuard<'_, RendezvousState<T>>) {
        state.broken = false;
        state.triggered = false;
        state.count = 0;
        state.slots.clear();
        let missing = self.parties - self.gate.permits();
        if missing > 0 {
            self.gate.release(missing);
        }
        state.resets = state.resets.wrapping_add(1);
        self.monitor.clear_interrupt();
        self.gate.clear_interrupt();
        self.monitor.notify_one();
        tracing::debug!("rendezvous reset, generation {}", state.resets);
    }

    /// Block until the current cycle has fully drained and reset.
    ///
    /// Same contract as [`Barrier::wait_reset`](crate::barrier::Barrier::wait_reset):
    /// a clean drain returns `Ok(())`; an expired deadline forces the cycle
    /// broken, completes the drain with the deadline disabled, and returns
    /// the first error.
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

    /// Number of parties required to complete an exchange.
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

    /// Latch the interrupt flag on both the monitor and the entry gate.
    pub fn interrupt(&self) {
        tracing::debug!("rendezvous interrupted");
        self.gate.interrupt();
        self.monitor.interrupt();
    }
}

impl<T> Drop for Rendezvous<T> {
    fn drop(&mut self) {
        self.gate.interrupt();
        self.monitor.interrupt();
        let deadline = Instant::now() + self.attributes.drain_timeout;
        let mut state = self.monitor.lock();
        while state.count > 0 {
            if self.monitor.drain_wait(&mut state, deadline) {
                break;
            }
        }
    }
}
