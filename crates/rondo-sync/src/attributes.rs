//! Construction-time attributes shared by the primitives

use std::time::Duration;

/// Tunables applied when a primitive is constructed.
#[derive(Debug, Clone, Copy)]
pub struct SyncAttributes {
    /// Upper bound a destructor spends waiting for in-flight parties to
    /// drain before giving up.
    pub drain_timeout: Duration,
}

impl Default for SyncAttributes {
    fn default() -> Self {
        Self {
            drain_timeout: Duration::from_secs(1),
        }
    }
}
