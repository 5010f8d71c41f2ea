//! Multi-core priority-preemptive thread scheduler for an HLE emulator
//! kernel.
//!
//! Decides, per emulated CPU core, which emulated thread runs next, performs
//! the context switch (machine registers, TLS pointer, per-thread scratch
//! register), tracks CPU-time accounting, and load-balances ready threads
//! across cores by affinity and priority.
//!
//! # Structure
//! - [`queue`]: per-core priority ready queue (FIFO buckets per level)
//! - [`scheduler`]: per-core selection and the context-switch protocol
//! - [`balancer`]: yield variants and cross-core thread migration
//! - [`thread`], [`process`], [`affinity`]: scheduled entities
//! - [`cpu`], [`timing`]: collaborator seams (core register file, tick
//!   source, wakeup timers)
//!
//! One lock guards all per-core scheduler state so cross-core migration
//! decisions are atomic; drivers on different host threads may call in
//! concurrently. Lower numeric priority value means higher scheduling
//! priority, and a ready thread preempts the running one only when strictly
//! better — equal priority keeps the incumbent.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod affinity;
mod balancer;
pub mod cpu;
pub mod error;
pub mod process;
pub mod queue;
pub mod scheduler;
pub mod thread;
pub mod timing;

#[cfg(test)]
pub(crate) mod testing;

pub use affinity::{CoreMask, MAX_CORES};
pub use cpu::CpuCore;
pub use error::{SchedulerError, SchedulerResult};
pub use process::{Process, ProcessId};
pub use queue::ReadyQueue;
pub use scheduler::{Scheduler, SchedulerStats};
pub use thread::{
    Thread, ThreadContext, ThreadId, ThreadStatus, THREAD_PRIORITY_COUNT, THREAD_PRIORITY_HIGHEST,
    THREAD_PRIORITY_LOWEST,
};
pub use timing::{TickSource, WakeupTimer};
