//! Cyclic thread-synchronization primitives with an all-or-none failure
//! model.
//!
//! A [`Barrier`] is a meeting point for a fixed group of threads; a
//! [`Rendezvous`] additionally exchanges a value between the parties; a
//! [`SynchValue`] is a cell threads can wait on until it holds a requested
//! value. Fallible operations return [`SyncError`], and every wait accepts
//! an absolute deadline (`None` waits indefinitely).
//!
//! # Examples
//!
//! ```
//! use rondo::Barrier;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let barrier = Arc::new(Barrier::new(3).unwrap());
//! let mut handles = Vec::new();
//! for _ in 0..3 {
//!     let barrier = Arc::clone(&barrier);
//!     handles.push(thread::spawn(move || barrier.barrier(None).unwrap()));
//! }
//!
//! let mut indices: Vec<usize> = handles
//!     .into_iter()
//!     .map(|handle| handle.join().unwrap())
//!     .collect();
//! indices.sort();
//! assert_eq!(indices, vec![0, 1, 2]);
//! ```
//!
//! Two threads can swap values through a rendezvous:
//!
//! ```
//! use rondo::Rendezvous;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let rendezvous = Arc::new(Rendezvous::new(2).unwrap());
//! let peer = Arc::clone(&rendezvous);
//! let handle = thread::spawn(move || peer.rendezvous(10, None).unwrap());
//!
//! assert_eq!(rendezvous.rendezvous(20, None).unwrap(), 10);
//! assert_eq!(handle.join().unwrap(), 20);
//! ```

pub use rondo_core::SyncError;
pub use rondo_sync::{
    rotate, Barrier, BarrierCommand, Monitor, Rendezvous, RendezvousFunction, Semaphore,
    SyncAttributes, SynchValue,
};
