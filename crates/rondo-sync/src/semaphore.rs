//! Interruptible counting semaphore
//!
//! Serves as the entry gate that admits parties into a barrier or
//! rendezvous cycle, and as the acknowledgement channel inside
//! [`SynchValue`](crate::synch_value::SynchValue).

use crate::monitor::Monitor;
use rondo_core::error::SyncError;
use std::time::Instant;

pub struct Semaphore {
    monitor: Monitor<usize>,
}

impl Semaphore {
    pub fn new(permits: usize) -> Self {
        Self {
            monitor: Monitor::new(permits),
        }
    }

    /// Take one permit, blocking until one becomes available.
    ///
    /// Fails `Interrupted` when the flag latches and `Timeout` when the
    /// absolute deadline passes first. A permit that arrives together with
    /// the deadline still wins.
    pub fn acquire(&self, deadline: Option<Instant>) -> Result<(), SyncError> {
        let mut permits = self.monitor.lock();
        loop {
            if *permits > 0 {
                *permits -= 1;
                return Ok(());
            }
            match self.monitor.wait(&mut permits, deadline) {
                Ok(()) => {}
                Err(SyncError::Timeout) if *permits > 0 => {}
                Err(err) => return Err(err),
            }
        }
    }

    /// Take one permit only if one is immediately available.
    pub fn try_acquire(&self) -> bool {
        let mut permits = self.monitor.lock();
        if *permits > 0 {
            *permits -= 1;
            true
        } else {
            false
        }
    }

    /// Return `n` permits in a single step.
    pub fn release(&self, n: usize) {
        let mut permits = self.monitor.lock();
        *permits += n;
        if n == 1 {
            self.monitor.notify_one();
        } else {
            self.monitor.notify_all();
        }
    }

    pub fn permits(&self) -> usize {
        *self.monitor.lock()
    }

    /// Latch the interrupt flag and wake every blocked acquirer.
    pub fn interrupt(&self) {
        self.monitor.interrupt();
    }

    pub fn interrupted(&self) -> bool {
        self.monitor.interrupted()
    }

    pub(crate) fn clear_interrupt(&self) {
        self.monitor.clear_interrupt();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_acquire_release() {
        let sem = Semaphore::new(2);
        sem.acquire(None).unwrap();
        sem.acquire(None).unwrap();
        assert_eq!(sem.permits(), 0);

        sem.release(2);
        assert_eq!(sem.permits(), 2);
    }

    #[test]
    fn test_try_acquire() {
        let sem = Semaphore::new(1);
        assert!(sem.try_acquire());
        assert!(!sem.try_acquire());
        sem.release(1);
        assert!(sem.try_acquire());
    }

    #[test]
    fn test_acquire_times_out() {
        let sem = Semaphore::new(0);
        let deadline = Instant::now() + Duration::from_millis(20);
        assert_eq!(sem.acquire(Some(deadline)), Err(SyncError::Timeout));
        assert_eq!(sem.permits(), 0);
    }

    #[test]
    fn test_release_wakes_blocked_acquirer() {
        let sem = Arc::new(Semaphore::new(0));
        let acquirer = {
            let sem = Arc::clone(&sem);
            thread::spawn(move || sem.acquire(None))
        };

        thread::sleep(Duration::from_millis(20));
        sem.release(1);
        assert_eq!(acquirer.join().unwrap(), Ok(()));
        assert_eq!(sem.permits(), 0);
    }

    #[test]
    fn test_interrupt_fails_blocked_acquirer() {
        let sem = Arc::new(Semaphore::new(0));
        let acquirer = {
            let sem = Arc::clone(&sem);
            thread::spawn(move || sem.acquire(None))
        };

        thread::sleep(Duration::from_millis(20));
        sem.interrupt();
        assert_eq!(acquirer.join().unwrap(), Err(SyncError::Interrupted));
        assert!(sem.interrupted());
    }
}
