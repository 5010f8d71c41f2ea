//! Scheduler error handling
//!
//! Precondition violations (scheduling a non-Ready thread, yielding a thread
//! that is not running, priorities out of range) indicate driver bugs and
//! halt immediately with a diagnostic rather than propagating. Only
//! conditions a caller can meaningfully observe are expressed as errors.

use core::fmt;

/// Errors surfaced to callers of scheduler operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerError {
    /// The operation is declared in the contract but has no implemented
    /// semantics. Calling it always fails; it is never a silent no-op.
    UnsupportedOperation { operation: &'static str },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedOperation { operation } => {
                write!(f, "unsupported scheduler operation: {}", operation)
            }
        }
    }
}

/// Result type for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;
