//! Timing and wakeup collaborators
//!
//! The scheduler consumes a monotonic tick counter for CPU-time accounting
//! and delegates sleep/wakeup mechanics to the external thread-lifecycle
//! layer through [`WakeupTimer`].

use crate::thread::Thread;
use alloc::sync::Arc;

/// Monotonic tick counter used for CPU-time deltas between switches.
pub trait TickSource: Send + Sync {
    fn ticks(&self) -> u64;
}

/// Sleep/wakeup mechanics owned by the external thread-lifecycle layer.
pub trait WakeupTimer: Send + Sync {
    /// Put `thread` to sleep and arrange its wakeup after `delay_ticks`.
    ///
    /// Zero delay is the yield path: the implementation takes the thread out
    /// of the Running state and later makes it Ready again and re-enters it
    /// into its assigned core's ready queue. Called without the scheduler
    /// lock held, so the implementation may call back into the scheduler.
    fn schedule_wakeup(&self, thread: &Arc<Thread>, delay_ticks: u64);

    /// Drop any pending wakeup for `thread`.
    ///
    /// Invoked from the context-switch protocol while the scheduler lock is
    /// held; the implementation must not re-enter the scheduler.
    fn cancel_wakeup(&self, thread: &Arc<Thread>);
}
