//! Thread handles
//!
//! The scheduler holds shared, non-owning references to threads constructed
//! and torn down by the external thread-lifecycle layer. All fields the
//! scheduler mutates are atomics or behind a small lock so a handle can be
//! touched from any core's driver thread.

use crate::affinity::CoreMask;
use crate::process::Process;
use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::{Arc, Weak};
use core::fmt;
use core::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use spin::{Mutex, MutexGuard};

/// Thread identifier.
pub type ThreadId = u64;

/// Number of distinct priority levels. Lower numeric value means higher
/// scheduling priority.
pub const THREAD_PRIORITY_COUNT: u32 = 64;

/// Best (numerically lowest) priority.
pub const THREAD_PRIORITY_HIGHEST: u32 = 0;

/// Worst (numerically highest) priority.
pub const THREAD_PRIORITY_LOWEST: u32 = THREAD_PRIORITY_COUNT - 1;

/// Thread status as seen by the scheduler.
///
/// The scheduler only ever acts on Ready and Running threads; Paused covers
/// every externally managed wait (sleep, synchronization, suspension).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ThreadStatus {
    /// Eligible to run, sitting in some core's ready queue.
    Ready = 0,

    /// Currently occupying exactly one core.
    Running = 1,

    /// Waiting on an external event (sleep, sync object, suspension).
    Paused = 2,

    /// Stopped for good; never scheduled again.
    Stopped = 3,
}

impl ThreadStatus {
    fn from_raw(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Ready),
            1 => Some(Self::Running),
            2 => Some(Self::Paused),
            3 => Some(Self::Stopped),
            _ => None,
        }
    }
}

impl fmt::Display for ThreadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "Ready"),
            Self::Running => write!(f, "Running"),
            Self::Paused => write!(f, "Paused"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Atomic cell for [`ThreadStatus`].
struct AtomicThreadStatus(AtomicU8);

impl AtomicThreadStatus {
    fn new(status: ThreadStatus) -> Self {
        Self(AtomicU8::new(status as u8))
    }

    fn load(&self) -> ThreadStatus {
        ThreadStatus::from_raw(self.0.load(Ordering::Acquire)).unwrap_or(ThreadStatus::Stopped)
    }

    fn store(&self, status: ThreadStatus) {
        self.0.store(status as u8, Ordering::Release);
    }
}

/// Saved machine-register snapshot for an emulated thread.
///
/// Treated as an opaque buffer by the scheduler; the CPU core interface
/// fills and drains it during context switches.
#[derive(Debug, Clone)]
pub struct ThreadContext {
    /// General purpose registers.
    pub regs: [u64; 31],
    /// Stack pointer.
    pub sp: u64,
    /// Program counter.
    pub pc: u64,
    /// Processor state flags.
    pub pstate: u64,
}

impl ThreadContext {
    pub const fn zeroed() -> Self {
        Self {
            regs: [0; 31],
            sp: 0,
            pc: 0,
            pstate: 0,
        }
    }
}

impl Default for ThreadContext {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// An emulated thread as the scheduler sees it.
pub struct Thread {
    /// Unique thread ID.
    id: ThreadId,

    /// Thread name (for diagnostics).
    name: Box<str>,

    /// Current status.
    status: AtomicThreadStatus,

    /// Scheduling priority; lower value runs first.
    priority: AtomicU32,

    /// Cores this thread may run on.
    affinity: AtomicU64,

    /// Core currently assigned to this thread.
    processor_id: AtomicU32,

    /// Saved machine context, restored when the thread next runs.
    context: Mutex<ThreadContext>,

    /// Thread-local-storage base pointer.
    tls_address: AtomicU64,

    /// System scratch register preserved across switches.
    tpidr: AtomicU64,

    /// Total CPU ticks consumed, updated at every context switch.
    cpu_ticks: AtomicU64,

    /// Owning process. Back-reference only; the process registry owns it.
    owner: Weak<Process>,
}

impl Thread {
    /// Create a thread handle in the Paused state. The lifecycle layer marks
    /// it Ready before handing it to the scheduler.
    ///
    /// Halts if `priority` is outside the valid range.
    pub fn new(
        id: ThreadId,
        name: &str,
        priority: u32,
        affinity: CoreMask,
        processor_id: u32,
        owner: Weak<Process>,
    ) -> Arc<Self> {
        assert!(
            priority < THREAD_PRIORITY_COUNT,
            "thread {} created with priority {} out of range 0..{}",
            id,
            priority,
            THREAD_PRIORITY_COUNT
        );
        Arc::new(Self {
            id,
            name: String::from(name).into_boxed_str(),
            status: AtomicThreadStatus::new(ThreadStatus::Paused),
            priority: AtomicU32::new(priority),
            affinity: AtomicU64::new(affinity.bits()),
            processor_id: AtomicU32::new(processor_id),
            context: Mutex::new(ThreadContext::zeroed()),
            tls_address: AtomicU64::new(0),
            tpidr: AtomicU64::new(0),
            cpu_ticks: AtomicU64::new(0),
            owner,
        })
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> ThreadStatus {
        self.status.load()
    }

    pub fn set_status(&self, status: ThreadStatus) {
        self.status.store(status);
    }

    pub fn priority(&self) -> u32 {
        self.priority.load(Ordering::Acquire)
    }

    /// Record a new priority. Queue repositioning is the scheduler's job;
    /// use `Scheduler::set_thread_priority` for Ready threads.
    pub fn set_priority(&self, priority: u32) {
        assert!(
            priority < THREAD_PRIORITY_COUNT,
            "thread {} priority {} out of range 0..{}",
            self.id,
            priority,
            THREAD_PRIORITY_COUNT
        );
        self.priority.store(priority, Ordering::Release);
    }

    pub fn affinity_mask(&self) -> CoreMask {
        CoreMask::from_bits(self.affinity.load(Ordering::Acquire))
    }

    pub fn set_affinity_mask(&self, mask: CoreMask) {
        self.affinity.store(mask.bits(), Ordering::Release);
    }

    pub fn processor_id(&self) -> u32 {
        self.processor_id.load(Ordering::Acquire)
    }

    pub fn set_processor_id(&self, core: u32) {
        self.processor_id.store(core, Ordering::Release);
    }

    /// Lock the saved machine context for saving or restoring.
    pub fn context(&self) -> MutexGuard<'_, ThreadContext> {
        self.context.lock()
    }

    pub fn tls_address(&self) -> u64 {
        self.tls_address.load(Ordering::Acquire)
    }

    pub fn set_tls_address(&self, address: u64) {
        self.tls_address.store(address, Ordering::Release);
    }

    pub fn tpidr(&self) -> u64 {
        self.tpidr.load(Ordering::Acquire)
    }

    pub fn set_tpidr(&self, value: u64) {
        self.tpidr.store(value, Ordering::Release);
    }

    /// Attribute a slice of CPU time to this thread.
    pub fn update_cpu_time_ticks(&self, ticks: u64) {
        self.cpu_ticks.fetch_add(ticks, Ordering::Relaxed);
    }

    pub fn cpu_time_ticks(&self) -> u64 {
        self.cpu_ticks.load(Ordering::Relaxed)
    }

    /// Owning process, if it is still alive.
    pub fn owner_process(&self) -> Option<Arc<Process>> {
        self.owner.upgrade()
    }

    /// Mark the thread stopped. Used by scheduler teardown; the handle
    /// itself stays alive until the lifecycle layer drops it.
    pub fn stop(&self) {
        self.status.store(ThreadStatus::Stopped);
    }
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("status", &self.status())
            .field("priority", &self.priority())
            .field("processor_id", &self.processor_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_thread(priority: u32) -> Arc<Thread> {
        Thread::new(7, "worker", priority, CoreMask::all(), 0, Weak::new())
    }

    #[test]
    fn starts_paused() {
        let thread = make_thread(32);
        assert_eq!(thread.status(), ThreadStatus::Paused);
        assert_eq!(thread.priority(), 32);
        assert_eq!(thread.name(), "worker");
    }

    #[test]
    fn status_transitions_round_trip() {
        let thread = make_thread(10);
        thread.set_status(ThreadStatus::Ready);
        assert_eq!(thread.status(), ThreadStatus::Ready);
        thread.set_status(ThreadStatus::Running);
        assert_eq!(thread.status(), ThreadStatus::Running);
        thread.stop();
        assert_eq!(thread.status(), ThreadStatus::Stopped);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn rejects_out_of_range_priority() {
        make_thread(THREAD_PRIORITY_COUNT);
    }

    #[test]
    fn accumulates_cpu_ticks() {
        let thread = make_thread(10);
        thread.update_cpu_time_ticks(40);
        thread.update_cpu_time_ticks(2);
        assert_eq!(thread.cpu_time_ticks(), 42);
    }

    #[test]
    fn preserves_tls_and_scratch_register() {
        let thread = make_thread(10);
        thread.set_tls_address(0x7fff_0000);
        thread.set_tpidr(0xdead_beef);
        assert_eq!(thread.tls_address(), 0x7fff_0000);
        assert_eq!(thread.tpidr(), 0xdead_beef);
    }
}
