//! Mock collaborators for unit tests
//!
//! Stand-ins for the CPU core, timing source, and thread-lifecycle wakeup
//! timer, recording enough to assert on the context-switch protocol.

use crate::cpu::CpuCore;
use crate::scheduler::Scheduler;
use crate::thread::{Thread, ThreadContext, ThreadStatus};
use crate::timing::{TickSource, WakeupTimer};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use spin::Mutex;

/// CPU core that records every interaction.
pub(crate) struct RecordingCore {
    pub context: ThreadContext,
    pub tls: u64,
    pub tpidr: u64,
    pub page_table_root: Option<u64>,
    pub page_table_installs: usize,
    pub exclusive_clears: usize,
    pub saves: usize,
    pub loads: usize,
}

impl RecordingCore {
    pub fn new() -> Self {
        Self {
            context: ThreadContext::zeroed(),
            tls: 0,
            tpidr: 0,
            page_table_root: None,
            page_table_installs: 0,
            exclusive_clears: 0,
            saves: 0,
            loads: 0,
        }
    }
}

impl CpuCore for RecordingCore {
    fn save_context(&mut self, context: &mut ThreadContext) {
        *context = self.context.clone();
        self.saves += 1;
    }

    fn load_context(&mut self, context: &ThreadContext) {
        self.context = context.clone();
        self.loads += 1;
    }

    fn tls_address(&self) -> u64 {
        self.tls
    }

    fn set_tls_address(&mut self, address: u64) {
        self.tls = address;
    }

    fn tpidr(&self) -> u64 {
        self.tpidr
    }

    fn set_tpidr(&mut self, value: u64) {
        self.tpidr = value;
    }

    fn clear_exclusive_state(&mut self) {
        self.exclusive_clears += 1;
    }

    fn set_page_table_root(&mut self, root: u64) {
        self.page_table_root = Some(root);
        self.page_table_installs += 1;
    }
}

/// Manually advanced monotonic tick counter.
pub(crate) struct ManualTicks(AtomicU64);

impl ManualTicks {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn advance(&self, ticks: u64) {
        self.0.fetch_add(ticks, Ordering::Relaxed);
    }
}

impl TickSource for ManualTicks {
    fn ticks(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Wakeup timer that parks sleeping threads until the test fires them,
/// mirroring how the host kernel's zero-duration sleep requeues a yielding
/// thread only after the reschedule has moved past it.
pub(crate) struct DeferredTimer {
    pending: Mutex<Vec<Arc<Thread>>>,
    pub cancels: AtomicUsize,
}

impl DeferredTimer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            pending: Mutex::new(Vec::new()),
            cancels: AtomicUsize::new(0),
        })
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Wake every parked thread: mark it Ready and queue it on its assigned
    /// core's scheduler.
    pub fn fire(&self, schedulers: &[Scheduler]) {
        let woken: Vec<Arc<Thread>> = self.pending.lock().drain(..).collect();
        for thread in woken {
            thread.set_status(ThreadStatus::Ready);
            let sched = &schedulers[thread.processor_id() as usize];
            sched.schedule_thread(thread.clone(), thread.priority());
        }
    }
}

impl WakeupTimer for DeferredTimer {
    fn schedule_wakeup(&self, thread: &Arc<Thread>, _delay_ticks: u64) {
        thread.set_status(ThreadStatus::Paused);
        self.pending.lock().push(thread.clone());
    }

    fn cancel_wakeup(&self, thread: &Arc<Thread>) {
        let mut pending = self.pending.lock();
        let before = pending.len();
        pending.retain(|t| t.id() != thread.id());
        if pending.len() != before {
            self.cancels.fetch_add(1, Ordering::Relaxed);
        }
    }
}
