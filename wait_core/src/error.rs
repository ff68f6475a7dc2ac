//! Kernel invariant violations

use core_types::{KernelId, ThreadId, ThreadState, WaitQueueId};
use thiserror::Error;

/// A broken contract between the blocking core and its callers
///
/// None of these are recoverable. Data-structure operations report them so
/// they can be tested; the block/unblock protocol turns every one of them
/// into [`invariant_breach`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Thread handle does not name a live slot
    #[error("Unknown thread: {0}")]
    UnknownThread(ThreadId),

    /// Wait queue handle does not name a registered queue
    #[error("Unknown wait queue: {0}")]
    UnknownWaitQueue(WaitQueueId),

    /// Handle was minted by a different kernel instance
    #[error("Handle belongs to {handle_kernel}, not {kernel}")]
    ForeignHandle {
        kernel: KernelId,
        handle_kernel: KernelId,
    },

    /// Thread is already a member of some wait queue
    #[error("{thread} is already queued on {queue}")]
    AlreadyQueued { thread: ThreadId, queue: WaitQueueId },

    /// Thread is not a member of the given wait queue
    #[error("{thread} is not queued on {queue}")]
    NotInQueue { thread: ThreadId, queue: WaitQueueId },

    /// Thread already owns a live timeout entry
    #[error("{0} already has a pending timeout")]
    AlreadyScheduled(ThreadId),

    /// Ledger links name a thread that has no timeout entry
    #[error("{0} has no timeout entry")]
    NotScheduled(ThreadId),

    /// Thread is in the wrong state for the requested transition
    #[error("{thread} is {actual}, expected {expected}")]
    InvalidState {
        thread: ThreadId,
        actual: ThreadState,
        expected: ThreadState,
    },

    /// Thread arena is at capacity
    #[error("Thread table full ({0} threads)")]
    ThreadTableFull(usize),

    /// The scheduler returned control to a thread nobody woke
    #[error("{0} resumed while still blocked")]
    ResumedWhileBlocked(ThreadId),
}

/// Halts on a broken kernel invariant
///
/// Reaching this means the thread/queue/ledger relationships are corrupt;
/// continuing would lose wakeups or double-schedule threads.
#[cold]
#[track_caller]
pub fn invariant_breach(err: CoreError) -> ! {
    log::error!("kernel invariant breach: {}", err);
    panic!("kernel invariant breach: {}", err);
}
