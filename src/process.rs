//! Process handles
//!
//! The scheduler only needs a thin view of the owning process: identity for
//! active-process switch detection, the address-translation root installed
//! into the CPU core on activation, and CPU-time accounting.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicU64, Ordering};

/// Process identifier.
pub type ProcessId = u64;

/// Owning process of one or more emulated threads.
pub struct Process {
    /// Unique process ID, used for active-process comparisons.
    id: ProcessId,

    /// Opaque address-translation table root for this process.
    page_table_root: u64,

    /// Total CPU ticks consumed by this process's threads.
    cpu_ticks: AtomicU64,
}

impl Process {
    pub fn new(id: ProcessId, page_table_root: u64) -> Arc<Self> {
        Arc::new(Self {
            id,
            page_table_root,
            cpu_ticks: AtomicU64::new(0),
        })
    }

    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn page_table_root(&self) -> u64 {
        self.page_table_root
    }

    /// Attribute a slice of CPU time to this process.
    pub fn update_cpu_time_ticks(&self, ticks: u64) {
        self.cpu_ticks.fetch_add(ticks, Ordering::Relaxed);
    }

    pub fn cpu_time_ticks(&self) -> u64 {
        self.cpu_ticks.load(Ordering::Relaxed)
    }
}
