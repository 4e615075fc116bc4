//! Cyclic thread-synchronization primitives
//!
//! Three primitives built on a shared monitor + entry-gate skeleton:
//!
//! - [`Barrier`] — a fixed-party meeting point that releases all parties
//!   atomically once the last one arrives, optionally running a trip
//!   command on the releasing thread.
//! - [`Rendezvous`] — a barrier at which each party contributes a value and
//!   an exchange function decides what each party takes home.
//! - [`SynchValue`] — a waitable cell whose setter only returns once every
//!   waiter has observed the new value.
//!
//! All three use an all-or-none breakage model: a party that leaves a cycle
//! prematurely (timeout, interrupt, panic in a user callback) poisons the
//! cycle for everyone still inside, and the primitive resets itself once
//! the failed cycle has drained.

pub mod attributes;
pub mod barrier;
pub mod monitor;
pub mod rendezvous;
pub mod semaphore;
pub mod synch_value;

pub use attributes::SyncAttributes;
pub use barrier::{Barrier, BarrierCommand};
pub use monitor::Monitor;
pub use rendezvous::{rotate, Rendezvous, RendezvousFunction};
pub use semaphore::Semaphore;
pub use synch_value::SynchValue;
