//! # Wait Core
//!
//! The blocking-synchronization core of the kernel: how a thread suspends
//! on a kernel object and how it is later resumed, either because the
//! object became available or because its bounded wait expired.
//!
//! ## Components
//!
//! - [`CriticalSection`]: reentrant interrupt mask; the only lock
//! - [`WaitQueue`]: FIFO of threads blocked on one kernel object
//! - [`TimeoutLedger`]: deadline-ordered delta queue of bounded waits
//! - [`Kernel`]: the block/unblock protocol tying a thread's state to its
//!   membership in both structures
//!
//! ## Philosophy
//!
//! **Exactly one outcome per wait.**
//!
//! A waiter is woken by an event or by its timeout, never both and never
//! neither. All state lives in an explicitly passed [`Kernel`] context so
//! independent instances can run side by side in tests.
//!
//! The ready queue, context switching, and the kernel objects themselves
//! are collaborators; the core only talks to them through [`Scheduler`].

pub mod audit;
pub mod critical;
pub mod error;
pub mod kernel;
pub mod scheduler;
pub mod thread;
pub mod timeout;
pub mod wait_queue;

pub use audit::{WaitAuditLog, WaitEvent};
pub use critical::{CriticalSection, IrqKey};
pub use error::{invariant_breach, CoreError};
pub use kernel::{Kernel, KernelConfig};
pub use scheduler::Scheduler;
pub use thread::{Thread, ThreadTable, TimeoutEntry};
pub use timeout::{DefaultLedger, DeltaQueue, Expired, Expiry, TimeoutLedger, Untimed};
pub use wait_queue::{WaitQueue, Waiters};
