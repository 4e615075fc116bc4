//! SynchValue (waitable value cell)
//!
//! A cell over a value of type `T` that threads can wait on: `wait_value`
//! blocks until the cell compares equal to a requested value, and
//! `set_value` publishes a new value and then holds the setter until every
//! thread that was waiting at publication time has re-checked the cell and
//! acknowledged it (or has left through an interrupt or timeout). Equality
//! is pluggable through [`with_comparator`](SynchValue::with_comparator).

use crate::attributes::SyncAttributes;
use crate::monitor::Monitor;
use crate::semaphore::Semaphore;
use parking_lot::Mutex;
use rondo_core::error::SyncError;
use std::time::{Duration, Instant};

type Comparator<T> = Box<dyn Fn(&T, &T) -> bool + Send + Sync>;

pub struct SynchValue<T> {
    monitor: Monitor<SynchState<T>>,
    /// Serializes setters for the whole of `set_value`, acknowledgement
    /// drain included. Also taken by `get_value`, so reads see a fully
    /// published value.
    value_lock: Mutex<()>,
    /// Zero-permit acknowledgement channel from waiters back to the setter.
    ack: Semaphore,
    comparator: Comparator<T>,
    attributes: SyncAttributes,
}

struct SynchState<T> {
    value: T,
    /// Threads currently blocked in `wait_value`.
    waiters: usize,
}

impl<T: Send + 'static> SynchValue<T> {
    /// Create a cell holding `value`, compared with `==`.
    pub fn new(value: T) -> Self
    where
        T: PartialEq,
    {
        Self::with_comparator(value, |current: &T, wanted: &T| current == wanted)
    }

    /// Create a cell with a custom equality comparator. The comparator is
    /// called as `comparator(current, wanted)`.
    pub fn with_comparator(
        value: T,
        comparator: impl Fn(&T, &T) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::build(value, Box::new(comparator), SyncAttributes::default())
    }

    pub fn with_attributes(value: T, attributes: SyncAttributes) -> Self
    where
        T: PartialEq,
    {
        Self::build(
            value,
            Box::new(|current: &T, wanted: &T| current == wanted),
            attributes,
        )
    }

    fn build(value: T, comparator: Comparator<T>, attributes: SyncAttributes) -> Self {
        Self {
            monitor: Monitor::new(SynchState { value, waiters: 0 }),
            value_lock: Mutex::new(()),
            ack: Semaphore::new(0),
            comparator,
            attributes,
        }
    }

    /// Read the current value.
    pub fn get_value(&self) -> T
    where
        T: Clone,
    {
        let _serial = self.value_lock.lock();
        self.monitor.lock().value.clone()
    }

    /// Publish `value` and wait for every current waiter to acknowledge it.
    ///
    /// The waiter count is snapshotted under the monitor lock together with
    /// the assignment; the setter does not return until that many
    /// acknowledgements have drained. A failed acknowledgement acquire is
    /// recorded but the drain still runs to completion.
    pub fn set_value(&self, value: T) -> Result<(), SyncError> {
        let _serial = self.value_lock.lock();
        if self.monitor.interrupted() {
            return Err(SyncError::Interrupted);
        }

        let waiter_count = {
            let mut state = self.monitor.lock();
            state.value = value;
            if state.waiters > 0 {
                self.monitor.notify_all();
            }
            state.waiters
        };
        tracing::trace!("value published to {} waiters", waiter_count);

        let mut result = Ok(());
        for _ in 0..waiter_count {
            if let Err(err) = self.ack.acquire(None) {
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }
        result
    }

    /// Block until the cell compares equal to `value`.
    ///
    /// `deadline` is absolute; `None` waits indefinitely. An expired
    /// deadline re-checks the cell once before failing `Timeout`.
    pub fn wait_value(&self, value: &T, deadline: Option<Instant>) -> Result<(), SyncError> {
        let mut state = self.monitor.lock();
        loop {
            if self.monitor.interrupted() {
                return Err(SyncError::Interrupted);
            }
            if (self.comparator)(&state.value, value) {
                return Ok(());
            }

            state.waiters += 1;
            let waited = self.monitor.wait(&mut state, deadline);
            state.waiters -= 1;
            // One acknowledgement per wake, whatever the wake reason, so
            // the setter's accounting always balances.
            self.ack.release(1);
            if self.monitor.interrupted() {
                // Nudge a draining destructor to re-check the waiter count.
                self.monitor.notify_one();
            }

            match waited {
                Ok(()) => {}
                Err(SyncError::Timeout) => {
                    if (self.comparator)(&state.value, value) {
                        return Ok(());
                    }
                    return Err(SyncError::Timeout);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Like [`wait_value`](Self::wait_value) with a deadline of `timeout`
    /// from now.
    pub fn wait_value_for(&self, value: &T, timeout: Duration) -> Result<(), SyncError> {
        self.wait_value(value, Some(Instant::now() + timeout))
    }

    /// Number of threads currently blocked in `wait_value`.
    pub fn waiters(&self) -> usize {
        self.monitor.lock().waiters
    }

    pub fn interrupted(&self) -> bool {
        self.monitor.interrupted()
    }

    /// Latch the interrupt flag; current and future waiters and setters
    /// fail with `Interrupted`.
    pub fn interrupt(&self) {
        tracing::debug!("synch value interrupted");
        self.ack.interrupt();
        self.monitor.interrupt();
    }
}

impl<T> Drop for SynchValue<T> {
    fn drop(&mut self) {
        self.ack.interrupt();
        self.monitor.interrupt();
        let deadline = Instant::now() + self.attributes.drain_timeout;
        let mut state = self.monitor.lock();
        while state.waiters > 0 {
            if self.monitor.drain_wait(&mut state, deadline) {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set_without_waiters() {
        let cell = SynchValue::new(0);
        assert_eq!(cell.get_value(), 0);
        assert_eq!(cell.set_value(5), Ok(()));
        assert_eq!(cell.get_value(), 5);
    }

    #[test]
    fn test_wait_on_current_value_returns_immediately() {
        let cell = SynchValue::new(9);
        assert_eq!(cell.wait_value(&9, None), Ok(()));
        assert_eq!(cell.waiters(), 0);
    }

    #[test]
    fn test_wait_times_out() {
        let cell = SynchValue::new(0);
        assert_eq!(
            cell.wait_value_for(&1, Duration::from_millis(20)),
            Err(SyncError::Timeout)
        );
        assert_eq!(cell.waiters(), 0);
    }

    #[test]
    fn test_custom_comparator() {
        let cell = SynchValue::with_comparator(23u32, |current, wanted| {
            current % 10 == wanted % 10
        });
        // 23 and 13 agree in their last digit.
        assert_eq!(cell.wait_value(&13, None), Ok(()));
    }

    #[test]
    fn test_interrupt_fails_setter() {
        let cell = SynchValue::new(0);
        cell.interrupt();
        assert_eq!(cell.set_value(1), Err(SyncError::Interrupted));
    }
}
