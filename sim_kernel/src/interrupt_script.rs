//! Deterministic interrupt scripting
//!
//! A single-threaded simulation has nobody else to run while a thread is
//! suspended. Tests instead script what "the rest of the system" does in
//! that window: timer ticks and producer-side wakes, delivered in order
//! by [`SimScheduler`](crate::scheduler::SimScheduler) as if they were
//! interrupts.
//!
//! ## Design Philosophy
//!
//! - **Deterministic**: Events fire in script order, nothing else
//! - **Interrupt semantics**: Events are only delivered while interrupts
//!   are enabled
//! - **Test-focused**: Not intended for production use
//!
//! ## Example
//!
//! ```
//! use core_types::KernelId;
//! use core_types::WaitQueueId;
//! use sim_kernel::interrupt_script::{InterruptScript, SimEvent};
//!
//! let queue = WaitQueueId::new(KernelId::new(), 0);
//! let script = InterruptScript::new()
//!     .with_event(SimEvent::Tick(3))
//!     .with_event(SimEvent::UnblockFirst(queue));
//! assert_eq!(script.pending_count(), 2);
//! ```

use core_types::WaitQueueId;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Something that happens while a thread is suspended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimEvent {
    /// The timer interrupt announces this many elapsed ticks
    Tick(u32),
    /// A producer wakes the first waiter of a queue
    UnblockFirst(WaitQueueId),
    /// A producer wakes every waiter of a queue
    UnblockAll(WaitQueueId),
}

/// Ordered list of events to deliver
#[derive(Debug, Clone, Default)]
pub struct InterruptScript {
    events: VecDeque<SimEvent>,
}

impl InterruptScript {
    /// Creates an empty script
    pub fn new() -> Self {
        Self {
            events: VecDeque::new(),
        }
    }

    /// Appends an event to the script
    pub fn with_event(mut self, event: SimEvent) -> Self {
        self.events.push_back(event);
        self
    }

    /// Appends `count` single-tick announcements
    pub fn with_ticks(mut self, count: usize) -> Self {
        self.events
            .extend(std::iter::repeat(SimEvent::Tick(1)).take(count));
        self
    }

    pub fn push(&mut self, event: SimEvent) {
        self.events.push_back(event);
    }

    /// Takes the next event to deliver
    pub fn next_event(&mut self) -> Option<SimEvent> {
        self.events.pop_front()
    }

    pub fn pending_count(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drops all undelivered events
    pub fn clear(&mut self) {
        self.events.clear();
    }
}
