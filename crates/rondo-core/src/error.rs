//! Error types for the rondo synchronization primitives

use thiserror::Error;

/// Failure kinds surfaced by the synchronization primitives.
///
/// Every fallible operation in the workspace returns `Result<_, SyncError>`.
/// The variants are deliberately `Copy` and comparable so callers can match
/// on outcomes without allocation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncError {
    /// A primitive was constructed for zero parties.
    #[error("at least one party is required")]
    Initialization,

    /// Entry or release was attempted against a cycle that cannot accept it,
    /// for example entering a barrier whose current cycle is already full.
    #[error("operation is not valid for the current cycle")]
    IllegalState,

    /// The interrupt flag was latched before or during a wait.
    #[error("interrupted while waiting")]
    Interrupted,

    /// The deadline expired before the awaited condition became true.
    #[error("timed out before the condition became true")]
    Timeout,

    /// Another party failed out of the cycle, poisoning it for everyone
    /// still inside.
    #[error("broken by another party")]
    BrokenBarrier,

    /// The monitor lock could not be acquired.
    #[error("monitor lock failure")]
    LockFailure,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            SyncError::Interrupted.to_string(),
            "interrupted while waiting"
        );
        assert_eq!(SyncError::BrokenBarrier.to_string(), "broken by another party");
    }

    #[test]
    fn test_error_comparable() {
        let err = SyncError::Timeout;
        assert_eq!(err, SyncError::Timeout);
        assert_ne!(err, SyncError::Interrupted);
    }
}
