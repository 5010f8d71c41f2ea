//! Per-core scheduler
//!
//! One `Scheduler` handle per emulated core, all sharing one machine-wide
//! state behind a single lock. The driver thread of each core calls
//! `reschedule` at every reschedule point (time-slice expiry, yield, wake);
//! selection follows a non-strict preemption policy and the context-switch
//! protocol moves machine state between the thread handle and the core.

use crate::cpu::CpuCore;
use crate::process::Process;
use crate::queue::ReadyQueue;
use crate::thread::{Thread, ThreadStatus, THREAD_PRIORITY_COUNT};
use crate::timing::{TickSource, WakeupTimer};
use alloc::sync::Arc;
use alloc::vec::Vec;
use log::trace;
use spin::Mutex;

/// Counters exposed for one core.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulerStats {
    /// Context switches where the occupying thread actually changed.
    pub context_switches: u64,
    /// Threads currently sitting in the ready queue.
    pub ready_threads: usize,
    /// Threads migrated onto this core by load balancing.
    pub migrations_in: u64,
    /// Threads migrated away from this core by load balancing.
    pub migrations_out: u64,
}

/// Scheduling state of a single emulated core.
pub(crate) struct CoreState {
    /// Thread occupying the core, or none when idle.
    pub(crate) current: Option<Arc<Thread>>,

    /// Ready threads eligible on this core.
    pub(crate) ready: ReadyQueue,

    /// Every thread ever registered on this core, regardless of state.
    /// Used for teardown only.
    pub(crate) threads: Vec<Arc<Thread>>,

    /// Tick of the most recent context switch, for CPU-time deltas.
    pub(crate) last_switch_tick: u64,

    pub(crate) switches: u64,
    pub(crate) migrations_in: u64,
    pub(crate) migrations_out: u64,
}

impl CoreState {
    fn new(now: u64) -> Self {
        Self {
            current: None,
            ready: ReadyQueue::new(),
            threads: Vec::new(),
            last_switch_tick: now,
            switches: 0,
            migrations_in: 0,
            migrations_out: 0,
        }
    }

    /// Selection policy. Picks the thread that should occupy the core next;
    /// may be the incumbent, a queued thread, or none (idle).
    ///
    /// A ready thread only displaces the running thread when its priority is
    /// strictly better (numerically lower). Ties keep the incumbent, so
    /// same-priority threads never thrash each other off the core.
    fn select_next_thread(&self) -> Option<Arc<Thread>> {
        let running = self
            .current
            .as_ref()
            .filter(|thread| thread.status() == ThreadStatus::Running);

        if let Some(current) = running {
            match self.ready.front() {
                Some(next) if next.priority() < current.priority() => Some(next),
                _ => Some(current.clone()),
            }
        } else {
            self.ready.front()
        }
    }

    /// First ready thread that may run on `requesting_core` and beats
    /// `max_priority` strictly. Read-only; used for cross-core suggestions.
    pub(crate) fn next_suggested(&self, requesting_core: u32, max_priority: u32) -> Option<Arc<Thread>> {
        self.ready
            .iter()
            .find(|thread| {
                thread.affinity_mask().contains(requesting_core as usize)
                    && thread.priority() < max_priority
            })
            .cloned()
    }
}

/// Machine-wide scheduling state: every core plus the active process.
/// Guarded as a whole by one lock so cross-core decisions are atomic.
pub(crate) struct Machine {
    pub(crate) cores: Vec<CoreState>,
    pub(crate) active_process: Option<Arc<Process>>,
}

impl Drop for Machine {
    fn drop(&mut self) {
        // Teardown stops every registered thread; the lifecycle layer still
        // owns and frees the handles.
        for core in &self.cores {
            for thread in &core.threads {
                thread.stop();
            }
        }
    }
}

pub(crate) struct Shared {
    pub(crate) machine: Mutex<Machine>,
    pub(crate) timing: Arc<dyn TickSource>,
    pub(crate) timer: Arc<dyn WakeupTimer>,
}

/// Per-core scheduler handle.
///
/// Cheap to clone; all handles created by [`Scheduler::new_cores`] share the
/// same machine state. Every public operation takes the machine lock for its
/// full duration and never blocks while holding it.
#[derive(Clone)]
pub struct Scheduler {
    pub(crate) core_id: u32,
    pub(crate) shared: Arc<Shared>,
}

impl Scheduler {
    /// Build one scheduler handle per emulated core over fresh shared state.
    pub fn new_cores(
        count: usize,
        timing: Arc<dyn TickSource>,
        timer: Arc<dyn WakeupTimer>,
    ) -> Vec<Scheduler> {
        assert!(
            count > 0 && count <= crate::affinity::MAX_CORES,
            "core count {} out of range 1..={}",
            count,
            crate::affinity::MAX_CORES
        );
        let now = timing.ticks();
        let shared = Arc::new(Shared {
            machine: Mutex::new(Machine {
                cores: (0..count).map(|_| CoreState::new(now)).collect(),
                active_process: None,
            }),
            timing,
            timer,
        });
        (0..count as u32)
            .map(|core_id| Scheduler {
                core_id,
                shared: shared.clone(),
            })
            .collect()
    }

    /// Core this handle schedules for.
    pub fn core_id(&self) -> u32 {
        self.core_id
    }

    /// True iff this core's ready queue is non-empty.
    pub fn have_ready_threads(&self) -> bool {
        let machine = self.shared.machine.lock();
        !machine.cores[self.core_id as usize].ready.is_empty()
    }

    /// Thread currently occupying this core, or none when idle.
    pub fn current_thread(&self) -> Option<Arc<Thread>> {
        let machine = self.shared.machine.lock();
        machine.cores[self.core_id as usize].current.clone()
    }

    /// Tick of this core's most recent context switch.
    pub fn last_context_switch_ticks(&self) -> u64 {
        let machine = self.shared.machine.lock();
        machine.cores[self.core_id as usize].last_switch_tick
    }

    /// Per-core counters.
    pub fn stats(&self) -> SchedulerStats {
        let machine = self.shared.machine.lock();
        let core = &machine.cores[self.core_id as usize];
        SchedulerStats {
            context_switches: core.switches,
            ready_threads: core.ready.len(),
            migrations_in: core.migrations_in,
            migrations_out: core.migrations_out,
        }
    }

    /// Register a thread in this core's membership list and record its
    /// priority and assigned core. Does not touch the ready queue.
    pub fn add_thread(&self, thread: Arc<Thread>, priority: u32) {
        thread.set_priority(priority);
        thread.set_processor_id(self.core_id);
        let mut machine = self.shared.machine.lock();
        machine.cores[self.core_id as usize].threads.push(thread);
    }

    /// Drop a thread from this core's membership list. Does not touch the
    /// ready queue; absent threads are ignored.
    pub fn remove_thread(&self, thread: &Arc<Thread>) {
        let mut machine = self.shared.machine.lock();
        machine.cores[self.core_id as usize]
            .threads
            .retain(|t| t.id() != thread.id());
    }

    /// Insert a Ready thread into this core's ready queue.
    ///
    /// Halts if the thread is not Ready: queueing a thread in any other
    /// state is a caller bug, not a runtime condition.
    pub fn schedule_thread(&self, thread: Arc<Thread>, priority: u32) {
        assert_eq!(
            thread.status(),
            ThreadStatus::Ready,
            "thread {} must be ready to be scheduled, was {}",
            thread.id(),
            thread.status()
        );
        let mut machine = self.shared.machine.lock();
        machine.cores[self.core_id as usize]
            .ready
            .push_back(thread, priority);
    }

    /// Take a Ready thread out of this core's ready queue.
    ///
    /// Halts if the thread is not Ready or not queued at `priority`.
    pub fn unschedule_thread(&self, thread: &Arc<Thread>, priority: u32) {
        assert_eq!(
            thread.status(),
            ThreadStatus::Ready,
            "thread {} must be ready to be unscheduled, was {}",
            thread.id(),
            thread.status()
        );
        let mut machine = self.shared.machine.lock();
        let removed = machine.cores[self.core_id as usize]
            .ready
            .remove(thread, priority);
        assert!(
            removed,
            "thread {} not queued at priority {} on core {}",
            thread.id(),
            priority,
            self.core_id
        );
    }

    /// Change a thread's priority, repositioning it in the ready queue when
    /// it is Ready. No-op when the priority is unchanged. Running or Paused
    /// threads only get the new value recorded on the handle.
    pub fn set_thread_priority(&self, thread: &Arc<Thread>, priority: u32) {
        assert!(
            priority < THREAD_PRIORITY_COUNT,
            "thread {} priority {} out of range 0..{}",
            thread.id(),
            priority,
            THREAD_PRIORITY_COUNT
        );
        let mut machine = self.shared.machine.lock();
        let old_priority = thread.priority();
        if old_priority == priority {
            return;
        }
        if thread.status() == ThreadStatus::Ready {
            machine.cores[self.core_id as usize]
                .ready
                .adjust(thread, old_priority, priority);
        }
        thread.set_priority(priority);
    }

    /// Read-only cross-core query: first thread in this core's ready queue
    /// that may run on `requesting_core` with priority strictly better than
    /// `max_priority`. Mutates nothing.
    pub fn next_suggested_thread(&self, requesting_core: u32, max_priority: u32) -> Option<Arc<Thread>> {
        let machine = self.shared.machine.lock();
        machine.cores[self.core_id as usize].next_suggested(requesting_core, max_priority)
    }

    /// Top-level reschedule entry point: select under the lock, then run the
    /// context-switch protocol (possibly a no-op switch to the same thread).
    pub fn reschedule(&self, cpu: &mut dyn CpuCore) {
        let mut machine = self.shared.machine.lock();
        let core = &machine.cores[self.core_id as usize];
        let current = core.current.clone();
        let next = core.select_next_thread();

        match (&current, &next) {
            (Some(cur), Some(next)) => {
                trace!("core {}: context switch {} -> {}", self.core_id, cur.id(), next.id())
            }
            (Some(cur), None) => trace!("core {}: context switch {} -> idle", self.core_id, cur.id()),
            (None, Some(next)) => trace!("core {}: context switch idle -> {}", self.core_id, next.id()),
            (None, None) => {}
        }

        self.switch_context(&mut machine, cpu, next);
    }

    /// Context-switch protocol. Saves the outgoing thread's machine state,
    /// attributes CPU time, and installs the incoming thread (or idles).
    fn switch_context(&self, machine: &mut Machine, cpu: &mut dyn CpuCore, new_thread: Option<Arc<Thread>>) {
        let core_index = self.core_id as usize;
        let previous = machine.cores[core_index].current.clone();
        let previous_process = machine.active_process.clone();

        // CPU time since the last switch is attributed to the outgoing
        // thread and its process whether or not a switch actually happens.
        let now = self.shared.timing.ticks();
        {
            let core = &mut machine.cores[core_index];
            let elapsed = now - core.last_switch_tick;
            if let Some(thread) = previous.as_deref() {
                thread.update_cpu_time_ticks(elapsed);
            }
            if let Some(process) = previous_process.as_deref() {
                process.update_cpu_time_ticks(elapsed);
            }
            core.last_switch_tick = now;
        }

        if let Some(prev) = &previous {
            cpu.save_context(&mut prev.context());
            // The scratch register may have been rewritten by the guest.
            prev.set_tpidr(cpu.tpidr());

            if prev.status() == ThreadStatus::Running {
                // Still Running here means the reschedule was forced on the
                // thread (time slice, wake event) rather than a voluntary
                // yield or sleep; it goes back into the queue.
                machine.cores[core_index]
                    .ready
                    .push_back(prev.clone(), prev.priority());
                prev.set_status(ThreadStatus::Ready);
            }
        }

        match new_thread {
            Some(next) => {
                assert_eq!(
                    next.status(),
                    ThreadStatus::Ready,
                    "thread {} must be ready to become running, was {}",
                    next.id(),
                    next.status()
                );

                // It is about to run; a stale timed wakeup must not fire.
                self.shared.timer.cancel_wakeup(&next);

                let removed = machine.cores[core_index].ready.remove(&next, next.priority());
                assert!(
                    removed,
                    "thread {} missing from core {} ready queue at switch",
                    next.id(),
                    self.core_id
                );
                next.set_status(ThreadStatus::Running);

                let changed = previous.as_ref().map_or(true, |p| p.id() != next.id());
                if changed {
                    machine.cores[core_index].switches += 1;
                }
                machine.cores[core_index].current = Some(next.clone());

                if let Some(owner) = next.owner_process() {
                    let process_changed = previous_process
                        .as_ref()
                        .map_or(true, |p| p.id() != owner.id());
                    if process_changed {
                        cpu.set_page_table_root(owner.page_table_root());
                        machine.active_process = Some(owner);
                    }
                }

                cpu.load_context(&next.context());
                cpu.set_tls_address(next.tls_address());
                cpu.set_tpidr(next.tpidr());
                cpu.clear_exclusive_state();
            }
            None => {
                if previous.is_some() {
                    machine.cores[core_index].switches += 1;
                }
                machine.cores[core_index].current = None;
                // Idling is not a process switch: the active process and its
                // page table stay installed.
            }
        }
    }
}
