//! # Simulated Kernel
//!
//! Hosted, deterministic collaborators for the blocking core.
//!
//! ## Purpose
//!
//! The simulated kernel allows testing the wait/wake protocol without
//! hardware:
//! - Runs under `cargo test`
//! - Deterministic (scripted time and interrupts, no real concurrency)
//! - Inspectable (interrupt mask, run queue and audit logs are visible)
//!
//! ## Philosophy
//!
//! **Testability is a first-class design constraint.**
//!
//! The core is written against two seams, [`hal::InterruptHal`] and
//! [`wait_core::Scheduler`]. This crate implements both so that a single
//! host thread can play every role: the blocked thread, the producer that
//! wakes it, and the timer interrupt that times it out.

pub mod interrupt_script;
pub mod interrupts;
pub mod scheduler;
pub mod test_utils;
pub mod timer;

pub use interrupt_script::{InterruptScript, SimEvent};
pub use interrupts::{InterruptProbe, SimInterruptController};
pub use scheduler::{ScheduleEvent, SimScheduler, SimSchedulerConfig};
pub use test_utils::SimKernel;
pub use timer::{SimTimerDevice, TickDriver};
