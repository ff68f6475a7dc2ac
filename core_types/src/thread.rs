//! Thread scheduling states and wait results

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scheduling priority, carried for collaborators
///
/// The blocking core never orders by priority; wait queues are FIFO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Priority(pub u8);

impl Default for Priority {
    fn default() -> Self {
        Priority(128)
    }
}

/// Thread state as seen by the blocking core
///
/// BLOCKED is the only suspended state. A bounded wait is not a separate
/// state: it is the presence of a timeout ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreadState {
    /// Currently executing
    Running,
    /// Admitted to the ready set, waiting to be dispatched
    Ready,
    /// Suspended on a wait queue
    Blocked,
}

impl fmt::Display for ThreadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadState::Running => write!(f, "RUNNING"),
            ThreadState::Ready => write!(f, "READY"),
            ThreadState::Blocked => write!(f, "BLOCKED"),
        }
    }
}

/// How a blocked thread was resumed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaitOutcome {
    /// A producer operation woke the thread
    WokenByEvent,
    /// The bounded wait expired first
    TimedOut,
}
