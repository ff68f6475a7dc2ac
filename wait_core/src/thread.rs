//! Thread records and the thread arena
//!
//! Threads live in a stable arena indexed by [`ThreadId`]. Wait queues and
//! the timeout ledger thread their intrusive links through these records,
//! so membership is a pair of handles on the thread plus a head/tail on the
//! owning structure. Removal from either structure is O(1) without any
//! aliased pointers.

use crate::error::CoreError;
use core_types::{KernelId, Priority, ThreadId, ThreadState, WaitOutcome, WaitQueueId};

/// Intrusive doubly-linked list node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Link {
    pub(crate) prev: Option<ThreadId>,
    pub(crate) next: Option<ThreadId>,
}

/// A thread's entry in the timeout ledger
///
/// Embedded in the thread record; present only while a bounded wait is
/// pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutEntry {
    /// Ticks after the previous entry's deadline (or after the ledger's
    /// current tick, for the head). Signed because a tick announcement may
    /// overshoot the head before it is popped.
    pub(crate) delta: i64,
    pub(crate) link: Link,
    /// Queue to leave if this entry expires
    pub(crate) wait_queue: Option<WaitQueueId>,
}

impl TimeoutEntry {
    pub(crate) fn new(delta: i64, wait_queue: Option<WaitQueueId>) -> Self {
        Self {
            delta,
            link: Link::default(),
            wait_queue,
        }
    }

    /// Ticks relative to the previous entry
    pub fn delta(&self) -> i64 {
        self.delta
    }

    /// The wait queue recorded for expiry
    pub fn wait_queue(&self) -> Option<WaitQueueId> {
        self.wait_queue
    }
}

/// A schedulable execution context, as far as the blocking core sees it
#[derive(Debug, Clone)]
pub struct Thread {
    id: ThreadId,
    name: String,
    priority: Priority,
    pub(crate) state: ThreadState,
    pub(crate) wait_queue: Option<WaitQueueId>,
    pub(crate) wait_link: Link,
    pub(crate) timeout: Option<TimeoutEntry>,
    pub(crate) outcome: Option<WaitOutcome>,
}

impl Thread {
    fn new(id: ThreadId, name: String, priority: Priority) -> Self {
        Self {
            id,
            name,
            priority,
            state: ThreadState::Ready,
            wait_queue: None,
            wait_link: Link::default(),
            timeout: None,
            outcome: None,
        }
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn state(&self) -> ThreadState {
        self.state
    }

    /// The wait queue this thread currently occupies
    pub fn wait_queue(&self) -> Option<WaitQueueId> {
        self.wait_queue
    }

    /// The live timeout entry, if a bounded wait is pending
    pub fn timeout_entry(&self) -> Option<&TimeoutEntry> {
        self.timeout.as_ref()
    }

    /// Outcome recorded by a wake or expiry, not yet collected by `block`
    pub fn pending_outcome(&self) -> Option<WaitOutcome> {
        self.outcome
    }
}

/// Fixed-capacity arena of thread records for one kernel instance
#[derive(Debug, Clone)]
pub struct ThreadTable {
    kernel: KernelId,
    capacity: usize,
    threads: Vec<Thread>,
}

impl ThreadTable {
    /// Creates an empty table for `kernel` holding at most `capacity` threads
    pub fn new(kernel: KernelId, capacity: usize) -> Self {
        Self {
            kernel,
            capacity,
            threads: Vec::with_capacity(capacity),
        }
    }

    /// Registers a new thread record in the READY state
    pub fn spawn(
        &mut self,
        name: impl Into<String>,
        priority: Priority,
    ) -> Result<ThreadId, CoreError> {
        if self.threads.len() >= self.capacity {
            return Err(CoreError::ThreadTableFull(self.capacity));
        }
        let id = ThreadId::new(self.kernel, self.threads.len() as u32);
        self.threads.push(Thread::new(id, name.into(), priority));
        Ok(id)
    }

    pub fn get(&self, id: ThreadId) -> Result<&Thread, CoreError> {
        let slot = self.slot(id)?;
        Ok(&self.threads[slot])
    }

    pub fn get_mut(&mut self, id: ThreadId) -> Result<&mut Thread, CoreError> {
        let slot = self.slot(id)?;
        Ok(&mut self.threads[slot])
    }

    /// Timeout entry of a thread that must have one
    pub(crate) fn timeout_mut(&mut self, id: ThreadId) -> Result<&mut TimeoutEntry, CoreError> {
        self.get_mut(id)?
            .timeout
            .as_mut()
            .ok_or(CoreError::NotScheduled(id))
    }

    pub(crate) fn timeout(&self, id: ThreadId) -> Result<&TimeoutEntry, CoreError> {
        self.get(id)?
            .timeout
            .as_ref()
            .ok_or(CoreError::NotScheduled(id))
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Thread> {
        self.threads.iter()
    }

    fn slot(&self, id: ThreadId) -> Result<usize, CoreError> {
        if id.kernel() != self.kernel {
            return Err(CoreError::ForeignHandle {
                kernel: self.kernel,
                handle_kernel: id.kernel(),
            });
        }
        let slot = id.index() as usize;
        if slot >= self.threads.len() {
            return Err(CoreError::UnknownThread(id));
        }
        Ok(slot)
    }
}
