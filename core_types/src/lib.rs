//! # Core Types
//!
//! This crate defines the fundamental types shared by the blocking core,
//! its hardware seams, and the simulated collaborators.
//!
//! ## Philosophy
//!
//! - **Handles, not pointers**: Threads and wait queues are named by small
//!   copyable handles into a kernel-owned arena.
//! - **One kernel, one namespace**: Every handle remembers the kernel
//!   instance that minted it, so independent kernels never mix state.
//! - **Time is explicit**: Ticks wrap, and all arithmetic on them says so.
//!
//! ## Key Types
//!
//! - [`KernelId`]: Identity of one kernel instance
//! - [`ThreadId`]: Handle to a thread record
//! - [`WaitQueueId`]: Handle to a wait queue owned by a kernel object
//! - [`Tick`], [`Timeout`], [`Deadline`]: Wrapping tick arithmetic
//! - [`ThreadState`], [`WaitOutcome`]: The blocked/ready state machine

pub mod ids;
pub mod thread;
pub mod time;

pub use ids::{KernelId, ThreadId, WaitQueueId};
pub use thread::{Priority, ThreadState, WaitOutcome};
pub use time::{Deadline, Tick, Timeout};
