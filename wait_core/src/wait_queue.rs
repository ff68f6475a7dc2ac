//! Wait Queue
//!
//! FIFO sequence of threads blocked on one kernel object.
//!
//! # Design
//!
//! - **Intrusive**: The links live in the thread records; the queue only
//!   holds head, tail, and a length.
//! - **FIFO**: First blocked, first woken. Priority ordering is left to the
//!   kernel objects layered on top.
//! - **Membership only**: The queue never touches thread state. Moving a
//!   thread between BLOCKED and READY is the block/unblock protocol's job.
//! - **O(1) removal**: A thread records which queue it is on, so a timeout
//!   can pull it out from any position without a scan.

use crate::error::CoreError;
use crate::thread::{Link, ThreadTable};
use core_types::{ThreadId, WaitQueueId};

/// Wait queue body
///
/// Owned by the kernel context on behalf of the kernel object that holds
/// its [`WaitQueueId`].
#[derive(Debug, Clone)]
pub struct WaitQueue {
    id: WaitQueueId,
    head: Option<ThreadId>,
    tail: Option<ThreadId>,
    len: usize,
}

impl WaitQueue {
    /// Creates an empty wait queue
    pub fn new(id: WaitQueueId) -> Self {
        Self {
            id,
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn id(&self) -> WaitQueueId {
        self.id
    }

    /// Appends a thread at the tail
    ///
    /// The thread must not be on any wait queue.
    pub fn enqueue(&mut self, threads: &mut ThreadTable, thread: ThreadId) -> Result<(), CoreError> {
        let record = threads.get_mut(thread)?;
        if let Some(queue) = record.wait_queue {
            return Err(CoreError::AlreadyQueued { thread, queue });
        }
        record.wait_queue = Some(self.id);
        record.wait_link = Link {
            prev: self.tail,
            next: None,
        };

        match self.tail {
            Some(tail) => threads.get_mut(tail)?.wait_link.next = Some(thread),
            None => self.head = Some(thread),
        }
        self.tail = Some(thread);
        self.len += 1;

        log::trace!("{} enqueued on {} (len {})", thread, self.id, self.len);
        Ok(())
    }

    /// Removes and returns the head, if any
    pub fn dequeue_first(&mut self, threads: &mut ThreadTable) -> Result<Option<ThreadId>, CoreError> {
        let Some(head) = self.head else {
            return Ok(None);
        };
        self.unlink(threads, head)?;
        Ok(Some(head))
    }

    /// Removes a specific thread regardless of its position
    pub fn remove(&mut self, threads: &mut ThreadTable, thread: ThreadId) -> Result<(), CoreError> {
        if threads.get(thread)?.wait_queue != Some(self.id) {
            return Err(CoreError::NotInQueue {
                thread,
                queue: self.id,
            });
        }
        self.unlink(threads, thread)
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// The thread that would be woken next
    pub fn first(&self) -> Option<ThreadId> {
        self.head
    }

    /// Walks the queue from head to tail
    pub fn iter<'a>(&self, threads: &'a ThreadTable) -> Waiters<'a> {
        Waiters {
            threads,
            next: self.head,
        }
    }

    fn unlink(&mut self, threads: &mut ThreadTable, thread: ThreadId) -> Result<(), CoreError> {
        let record = threads.get_mut(thread)?;
        let Link { prev, next } = record.wait_link;
        record.wait_link = Link::default();
        record.wait_queue = None;

        match prev {
            Some(prev) => threads.get_mut(prev)?.wait_link.next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => threads.get_mut(next)?.wait_link.prev = prev,
            None => self.tail = prev,
        }
        self.len -= 1;

        log::trace!("{} left {} (len {})", thread, self.id, self.len);
        Ok(())
    }
}

/// Iterator over the threads of one wait queue, head first
pub struct Waiters<'a> {
    threads: &'a ThreadTable,
    next: Option<ThreadId>,
}

impl Iterator for Waiters<'_> {
    type Item = ThreadId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self
            .threads
            .get(current)
            .ok()
            .and_then(|record| record.wait_link.next);
        Some(current)
    }
}
