//! Cross-core load balancing
//!
//! Yield variants layered over the per-core schedulers. A yielding core may
//! pull ("steal") a strictly better ready thread off another core's queue
//! instead of keeping work serialized behind a single global queue. The
//! suggest-then-migrate sequence runs inside one critical section of the
//! machine lock so two cores can never migrate the same thread.

use crate::error::{SchedulerError, SchedulerResult};
use crate::scheduler::Scheduler;
use crate::thread::{Thread, ThreadStatus, THREAD_PRIORITY_COUNT};
use alloc::sync::Arc;
use log::debug;

impl Scheduler {
    /// Voluntarily give up the core without looking at other cores.
    ///
    /// The thread is put to sleep for zero duration through the external
    /// lifecycle layer; the following reschedule then picks among this
    /// core's own ready queue (which the woken thread re-enters at the back
    /// of its priority bucket).
    ///
    /// Halts unless the thread is Running with a valid priority.
    pub fn yield_without_load_balancing(&self, thread: &Arc<Thread>) -> SchedulerResult<()> {
        Self::assert_can_yield(thread);
        self.shared.timer.schedule_wakeup(thread, 0);
        Ok(())
    }

    /// Voluntarily give up the core and offer it to another core's work.
    ///
    /// After the zero-duration sleep, every other core is asked for its best
    /// ready thread that may run here and beats the yielder's priority
    /// strictly. The best such candidate (first one wins ties) is migrated:
    /// reassigned to this core and queued here, with its affinity mask left
    /// untouched so eligibility never narrows.
    ///
    /// Halts unless the thread is Running with a valid priority.
    pub fn yield_with_load_balancing(&self, thread: &Arc<Thread>) -> SchedulerResult<()> {
        Self::assert_can_yield(thread);
        let priority = thread.priority();
        let core = thread.processor_id();

        // Sleep first; the lifecycle layer may re-enter the scheduler, so
        // this happens before the lock is taken.
        self.shared.timer.schedule_wakeup(thread, 0);

        let mut machine = self.shared.machine.lock();

        let mut suggested: Option<(usize, Arc<Thread>)> = None;
        for (index, state) in machine.cores.iter().enumerate() {
            if index as u32 == core {
                continue;
            }
            if let Some(candidate) = state.next_suggested(core, priority) {
                let better = suggested
                    .as_ref()
                    .map_or(true, |(_, best)| candidate.priority() < best.priority());
                if better {
                    suggested = Some((index, candidate));
                }
            }
        }

        if let Some((from, stolen)) = suggested {
            let removed = machine.cores[from].ready.remove(&stolen, stolen.priority());
            assert!(
                removed,
                "suggested thread {} vanished from core {} ready queue",
                stolen.id(),
                from
            );
            machine.cores[from].migrations_out += 1;

            stolen.set_processor_id(core);
            let to = core as usize;
            machine.cores[to].ready.push_back(stolen.clone(), stolen.priority());
            machine.cores[to].migrations_in += 1;

            debug!(
                "thread {} migrated core {} -> {} (priority {})",
                stolen.id(),
                from,
                core,
                stolen.priority()
            );
        }

        Ok(())
    }

    /// Declared by the contract but without implemented semantics; always
    /// fails, never silently no-ops.
    pub fn yield_and_wait_for_load_balancing(&self, _thread: &Arc<Thread>) -> SchedulerResult<()> {
        Err(SchedulerError::UnsupportedOperation {
            operation: "yield and wait for load balancing",
        })
    }

    fn assert_can_yield(thread: &Arc<Thread>) {
        assert_eq!(
            thread.status(),
            ThreadStatus::Running,
            "thread {} must be running to yield, was {}",
            thread.id(),
            thread.status()
        );
        assert!(
            thread.priority() < THREAD_PRIORITY_COUNT,
            "thread {} yielding with priority {} out of range 0..{}",
            thread.id(),
            thread.priority(),
            THREAD_PRIORITY_COUNT
        );
    }
}
