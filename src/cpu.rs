//! CPU core interface
//!
//! Seam between the scheduler and the per-core interpreter/JIT. Each
//! emulated core's execution loop owns one implementation and passes it to
//! `Scheduler::reschedule`; the context-switch protocol drives it while the
//! scheduler lock is held, so implementations must not block.

use crate::thread::ThreadContext;

/// Register-file surface of one emulated CPU core.
pub trait CpuCore {
    /// Snapshot the core's machine state into `context`.
    fn save_context(&mut self, context: &mut ThreadContext);

    /// Restore the core's machine state from `context`.
    fn load_context(&mut self, context: &ThreadContext);

    /// Current thread-local-storage base pointer.
    fn tls_address(&self) -> u64;

    fn set_tls_address(&mut self, address: u64);

    /// Current value of the per-thread system scratch register.
    fn tpidr(&self) -> u64;

    fn set_tpidr(&mut self, value: u64);

    /// Drop any exclusive-access (atomic monitor) state left over from the
    /// previous thread.
    fn clear_exclusive_state(&mut self);

    /// Install a process's address-translation table root.
    fn set_page_table_root(&mut self, root: u64);
}
