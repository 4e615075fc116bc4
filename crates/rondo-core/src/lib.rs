//! Shared foundation for the rondo workspace.
//!
//! Holds the error types common to every primitive crate.

pub mod error;

pub use error::SyncError;
